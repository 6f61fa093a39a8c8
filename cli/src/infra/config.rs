//! Config file loading and process environment capture.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::config::{DEFAULT_CONFIG_FILE, HarnessConfig};
use crate::domain::coordinates::AmbientEnv;
use crate::infra::arm::DEFAULT_ARM_ENDPOINT;

/// Process environment read once at startup via `envy`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProcessEnv {
    pub arm_subscription_id: Option<String>,
    pub azure_subscription_id: Option<String>,
    pub tfprobe_config: Option<PathBuf>,
    pub tfprobe_terraform: Option<String>,
    pub tfprobe_arm_endpoint: Option<String>,
}

impl ProcessEnv {
    /// # Errors
    ///
    /// Returns an error if a variable is not valid unicode.
    pub fn from_env() -> Result<Self> {
        envy::from_env().context("reading process environment")
    }

    /// Subscription default: `ARM_SUBSCRIPTION_ID`, then `AZURE_SUBSCRIPTION_ID`.
    #[must_use]
    pub fn ambient(&self) -> AmbientEnv {
        let pick = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        AmbientEnv {
            subscription_id: pick(&self.arm_subscription_id).or_else(|| pick(&self.azure_subscription_id)),
        }
    }

    #[must_use]
    pub fn terraform_binary(&self) -> &str {
        self.tfprobe_terraform
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("terraform")
    }

    #[must_use]
    pub fn arm_endpoint(&self) -> &str {
        self.tfprobe_arm_endpoint
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ARM_ENDPOINT)
    }
}

/// Loads `tfprobe.yaml`.
pub struct YamlConfigLoader {
    path: PathBuf,
}

impl YamlConfigLoader {
    /// `--config` wins, then `TFPROBE_CONFIG`, then `./tfprobe.yaml`.
    #[must_use]
    pub fn locate(explicit: Option<&Path>, env: &ProcessEnv) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.tfprobe_config.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the file and rebase relative paths on its directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not valid YAML.
    pub fn load(&self) -> Result<HarnessConfig> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let config: HarnessConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))?;

        let base = self
            .path
            .canonicalize()
            .with_context(|| format!("cannot resolve {}", self.path.display()))?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config.rebased(&base))
    }
}
