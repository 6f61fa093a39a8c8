//! Infrastructure implementation of the `ResourceInspector` port.
//!
//! Reads SQL databases straight from Azure Resource Manager over HTTPS.

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tfprobe_common::LiveResourceSnapshot;
use tracing::debug;

use crate::application::ports::{ResourceInspector, TokenProvider};
use crate::domain::coordinates::ResolvedCoordinates;
use crate::domain::error::LiveQueryError;

/// Public-cloud Resource Manager endpoint.
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// API version for `Microsoft.Sql/servers/databases`.
pub const SQL_API_VERSION: &str = "2021-11-01";

/// `ResourceInspector` backed by the ARM REST API.
pub struct ArmSqlInspector<T: TokenProvider> {
    http: reqwest::Client,
    endpoint: String,
    tokens: T,
}

impl<T: TokenProvider> ArmSqlInspector<T> {
    /// Inspector talking to `endpoint` (no trailing slash required).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: &str, tokens: T) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tfprobe/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Full GET URL for a database.
    #[must_use]
    pub fn database_url(&self, coords: &ResolvedCoordinates) -> String {
        format!(
            "{}{}?api-version={SQL_API_VERSION}",
            self.endpoint,
            coords.resource_path()
        )
    }
}

impl<T: TokenProvider> ResourceInspector for ArmSqlInspector<T> {
    async fn sql_database(&self, coords: &ResolvedCoordinates) -> Result<LiveResourceSnapshot> {
        let token = self.tokens.access_token().await?;
        let url = self.database_url(coords);
        debug!(%url, "GET");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("requesting {}", coords.resource_path()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading response for {}", coords.resource_path()))?;

        if !status.is_success() {
            return Err(status_error(status, &coords.resource_path(), body).into());
        }
        parse_database(&body)
    }
}

/// Map a non-success status to a typed error.
#[must_use]
pub fn status_error(status: StatusCode, resource: &str, body: String) -> LiveQueryError {
    match status {
        StatusCode::NOT_FOUND => LiveQueryError::ResourceNotFound(resource.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LiveQueryError::Authorization {
            resource: resource.to_string(),
            status: status.as_u16(),
        },
        _ => LiveQueryError::Api {
            resource: resource.to_string(),
            status: status.as_u16(),
            body,
        },
    }
}

#[derive(Debug, Deserialize)]
struct ArmDatabase {
    id: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    location: Option<String>,
    #[serde(default)]
    sku: Option<ArmSku>,
    #[serde(default)]
    properties: ArmDatabaseProperties,
}

#[derive(Debug, Deserialize)]
struct ArmSku {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArmDatabaseProperties {
    zone_redundant: Option<bool>,
    status: Option<String>,
}

/// Parse an ARM database document into a snapshot.
///
/// # Errors
///
/// Returns an error if the body is not a database document.
pub fn parse_database(body: &str) -> Result<LiveResourceSnapshot> {
    let db: ArmDatabase =
        serde_json::from_str(body).context("parsing Microsoft.Sql database response")?;
    Ok(LiveResourceSnapshot {
        id: db.id,
        name: db.name,
        resource_type: db.resource_type,
        zone_redundant: db.properties.zone_redundant,
        location: db.location,
        status: db.properties.status,
        sku_name: db.sku.and_then(|s| s.name),
    })
}
