//! Field names a live resource snapshot can be checked on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A comparable field of a [`crate::LiveResourceSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotField {
    Id,
    Name,
    #[serde(alias = "type")]
    ResourceType,
    ZoneRedundant,
    Location,
    Status,
    SkuName,
}

impl SnapshotField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotField::Id => "id",
            SnapshotField::Name => "name",
            SnapshotField::ResourceType => "resource_type",
            SnapshotField::ZoneRedundant => "zone_redundant",
            SnapshotField::Location => "location",
            SnapshotField::Status => "status",
            SnapshotField::SkuName => "sku_name",
        }
    }

    /// Human label used in report lines, e.g. "Zone Redundant".
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SnapshotField::Id => "ID",
            SnapshotField::Name => "Name",
            SnapshotField::ResourceType => "Type",
            SnapshotField::ZoneRedundant => "Zone Redundant",
            SnapshotField::Location => "Location",
            SnapshotField::Status => "Status",
            SnapshotField::SkuName => "SKU",
        }
    }

    /// `true` for flags compared as booleans rather than strings.
    #[must_use]
    pub fn is_flag(self) -> bool {
        matches!(self, SnapshotField::ZoneRedundant)
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
