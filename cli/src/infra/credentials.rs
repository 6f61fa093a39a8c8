//! Access tokens for the management API.
//!
//! Resolution order: service principal from `ARM_*`/`AZURE_*` variables,
//! then a pre-issued `ARM_ACCESS_TOKEN`, then the Azure CLI login.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::application::ports::{CommandRunner, TokenProvider};
use crate::domain::error::LiveQueryError;
use crate::infra::command_runner::{DEFAULT_PROBE_TIMEOUT, TokioCommandRunner};

/// OAuth2 scope for Azure Resource Manager.
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Credential-related environment, read once via `envy`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CredentialEnv {
    pub arm_client_id: Option<String>,
    pub arm_client_secret: Option<String>,
    pub arm_tenant_id: Option<String>,
    pub azure_client_id: Option<String>,
    pub azure_client_secret: Option<String>,
    pub azure_tenant_id: Option<String>,
    pub azure_authority_host: Option<String>,
    pub arm_access_token: Option<String>,
}

impl CredentialEnv {
    /// Read from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is not valid unicode.
    pub fn from_env() -> Result<Self> {
        envy::from_env().context("reading credential environment")
    }

    fn client_id(&self) -> Option<&str> {
        first_set(self.arm_client_id.as_deref(), self.azure_client_id.as_deref())
    }

    fn client_secret(&self) -> Option<&str> {
        first_set(
            self.arm_client_secret.as_deref(),
            self.azure_client_secret.as_deref(),
        )
    }

    fn tenant_id(&self) -> Option<&str> {
        first_set(self.arm_tenant_id.as_deref(), self.azure_tenant_id.as_deref())
    }
}

fn first_set<'a>(primary: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    primary
        .filter(|s| !s.trim().is_empty())
        .or(fallback.filter(|s| !s.trim().is_empty()))
}

/// Service principal login via the OAuth2 client-credentials grant.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ClientSecretCredential {
    #[must_use]
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

impl TokenProvider for ClientSecretCredential {
    async fn access_token(&self) -> Result<String> {
        debug!(tenant = %self.tenant_id, client = %self.client_id, "requesting service principal token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", ARM_SCOPE),
        ];
        let resp = self
            .http
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| LiveQueryError::Credentials(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LiveQueryError::Credentials(format!(
                "token endpoint returned HTTP {}: {body}",
                status.as_u16()
            ))
            .into());
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| LiveQueryError::Credentials(e.to_string()))?;
        Ok(token.access_token)
    }
}

/// A token issued out of band.
pub struct StaticToken(String);

impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Token from an existing `az login` session.
pub struct AzCliToken<R: CommandRunner> {
    runner: R,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzToken {
    access_token: String,
}

impl<R: CommandRunner> AzCliToken<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> TokenProvider for AzCliToken<R> {
    async fn access_token(&self) -> Result<String> {
        let out = self
            .runner
            .run_with_timeout(
                "az",
                &[
                    "account",
                    "get-access-token",
                    "--resource",
                    "https://management.azure.com/",
                    "-o",
                    "json",
                ],
                DEFAULT_PROBE_TIMEOUT,
            )
            .await
            .map_err(|e| LiveQueryError::Credentials(format!("az CLI unavailable: {e:#}")))?;
        if !out.status.success() {
            return Err(LiveQueryError::Credentials(format!(
                "az account get-access-token failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            ))
            .into());
        }
        let token: AzToken = serde_json::from_slice(&out.stdout)
            .map_err(|e| LiveQueryError::Credentials(format!("unexpected az output: {e}")))?;
        Ok(token.access_token)
    }
}

/// Whichever credential the environment selects.
pub enum Credential {
    ClientSecret(ClientSecretCredential),
    Static(StaticToken),
    AzCli(AzCliToken<TokioCommandRunner>),
}

impl Credential {
    /// Pick a credential from `env`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_env(env: &CredentialEnv) -> Result<Self> {
        if let (Some(client_id), Some(client_secret), Some(tenant_id)) =
            (env.client_id(), env.client_secret(), env.tenant_id())
        {
            debug!("using service principal credentials");
            return Ok(Self::ClientSecret(ClientSecretCredential {
                http: reqwest::Client::builder()
                    .build()
                    .context("building HTTP client")?,
                authority_host: env
                    .azure_authority_host
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
                tenant_id: tenant_id.to_string(),
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            }));
        }
        if let Some(token) = first_set(env.arm_access_token.as_deref(), None) {
            debug!("using ARM_ACCESS_TOKEN");
            return Ok(Self::Static(StaticToken(token.to_string())));
        }
        debug!("falling back to az CLI token");
        Ok(Self::AzCli(AzCliToken::new(TokioCommandRunner::new(
            DEFAULT_PROBE_TIMEOUT,
        ))))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ClientSecret(_) => "service principal",
            Self::Static(_) => "access token",
            Self::AzCli(_) => "az cli",
        }
    }
}

impl TokenProvider for Credential {
    async fn access_token(&self) -> Result<String> {
        match self {
            Self::ClientSecret(c) => c.access_token().await,
            Self::Static(c) => c.access_token().await,
            Self::AzCli(c) => c.access_token().await,
        }
    }
}
