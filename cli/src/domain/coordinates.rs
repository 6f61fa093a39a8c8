//! Resource coordinates and subscription resolution.
//!
//! Pure functions only. The ambient environment is captured by the infra
//! layer and handed in as an [`AmbientEnv`] value.

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// Where a SQL database lives. `subscription` may be empty, meaning
/// "use the ambient default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCoordinates {
    #[serde(default)]
    pub subscription: String,
    pub resource_group: String,
    pub server: String,
    pub database: String,
}

/// Process-level configuration captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientEnv {
    /// Subscription from `ARM_SUBSCRIPTION_ID` / `AZURE_SUBSCRIPTION_ID`.
    pub subscription_id: Option<String>,
}

impl AmbientEnv {
    #[must_use]
    pub fn with_subscription(id: impl Into<String>) -> Self {
        Self {
            subscription_id: Some(id.into()),
        }
    }
}

/// Coordinates with a concrete subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCoordinates {
    pub subscription: String,
    pub resource_group: String,
    pub server: String,
    pub database: String,
}

impl ResolvedCoordinates {
    /// ARM resource path, e.g.
    /// `/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/srv/databases/db`.
    #[must_use]
    pub fn resource_path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Sql/servers/{}/databases/{}",
            self.subscription, self.resource_group, self.server, self.database
        )
    }
}

/// Pick the subscription: explicit non-empty value, else ambient, else fail.
///
/// A blank explicit value counts as "not supplied".
///
/// # Errors
///
/// Returns `ConfigError::MissingSubscription` if neither source has a value.
pub fn resolve_subscription(explicit: &str, ambient: &AmbientEnv) -> Result<String, ConfigError> {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }
    ambient
        .subscription_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::MissingSubscription)
}

/// Check that the group, server and database are all set.
///
/// # Errors
///
/// Returns `ConfigError::EmptyCoordinate` naming the first blank field.
pub fn validate_coordinates(coords: &ResourceCoordinates) -> Result<(), ConfigError> {
    for (name, value) in [
        ("resource_group", &coords.resource_group),
        ("server", &coords.server),
        ("database", &coords.database),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyCoordinate(name));
        }
    }
    Ok(())
}

/// Validate `coords` and fill in the subscription.
///
/// # Errors
///
/// Returns a `ConfigError` if a coordinate is blank or no subscription resolves.
pub fn resolve(
    coords: &ResourceCoordinates,
    ambient: &AmbientEnv,
) -> Result<ResolvedCoordinates, ConfigError> {
    validate_coordinates(coords)?;
    Ok(ResolvedCoordinates {
        subscription: resolve_subscription(&coords.subscription, ambient)?,
        resource_group: coords.resource_group.clone(),
        server: coords.server.clone(),
        database: coords.database.clone(),
    })
}
