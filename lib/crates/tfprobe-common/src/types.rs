use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields::SnapshotField;

/// A scalar value compared during verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Point-in-time read of a live cloud resource, taken from the management API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResourceSnapshot {
    pub id: String,
    pub name: String,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_redundant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_name: Option<String>,
}

impl LiveResourceSnapshot {
    /// Value of `field`, or `None` when the API did not report it.
    #[must_use]
    pub fn field(&self, field: SnapshotField) -> Option<FieldValue> {
        match field {
            SnapshotField::Id => Some(FieldValue::Str(self.id.clone())),
            SnapshotField::Name => Some(FieldValue::Str(self.name.clone())),
            SnapshotField::ResourceType => Some(FieldValue::Str(self.resource_type.clone())),
            SnapshotField::ZoneRedundant => self.zone_redundant.map(FieldValue::Bool),
            SnapshotField::Location => self.location.clone().map(FieldValue::Str),
            SnapshotField::Status => self.status.clone().map(FieldValue::Str),
            SnapshotField::SkuName => self.sku_name.clone().map(FieldValue::Str),
        }
    }
}

/// Shown in place of a value the provisioning tool marked sensitive.
pub const SENSITIVE_PLACEHOLDER: &str = "<sensitive>";

/// One (expected, actual, field) triple and its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub field: String,
    pub expected: FieldValue,
    /// `None` when the live resource does not report the field.
    pub actual: Option<FieldValue>,
    pub passed: bool,
    /// Free-form assertion message shown next to a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldCheck {
    /// Replace both values with [`SENSITIVE_PLACEHOLDER`]. The verdict is kept;
    /// an absent actual value stays absent.
    #[must_use]
    pub fn masked(mut self) -> Self {
        self.expected = FieldValue::from(SENSITIVE_PLACEHOLDER);
        if self.actual.is_some() {
            self.actual = Some(FieldValue::from(SENSITIVE_PLACEHOLDER));
        }
        self
    }
}

/// Every field check of a verification run, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub checks: Vec<FieldCheck>,
}

impl ComparisonReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &FieldCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    #[must_use]
    pub fn mismatch_count(&self) -> usize {
        self.mismatches().count()
    }

    /// Append all checks of `other`, keeping order.
    pub fn extend(&mut self, other: ComparisonReport) {
        self.checks.extend(other.checks);
    }
}

/// Lifecycle phase of a single verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Unstaged,
    Staged,
    Provisioned,
    Verified,
    Destroyed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Unstaged => "unstaged",
            RunPhase::Staged => "staged",
            RunPhase::Provisioned => "provisioned",
            RunPhase::Verified => "verified",
            RunPhase::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

/// Result of the guaranteed teardown step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeardownStatus {
    /// Run never reached a state that owns live resources.
    NotRequired,
    Destroyed,
    Failed { diagnostics: String },
}

/// Machine-readable summary of one verification run (`--json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Furthest phase reached before teardown.
    pub reached: RunPhase,
    pub outputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<LiveResourceSnapshot>,
    pub report: ComparisonReport,
    pub teardown: TeardownStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    /// `true` only when every check passed, no error occurred and teardown succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.report.passed()
            && !matches!(self.teardown, TeardownStatus::Failed { .. })
    }
}
