//! Domain types and validators for harness configuration.
//!
//! No I/O here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tfprobe_common::{FieldValue, SnapshotField};

use crate::domain::comparison::Expectation;
use crate::domain::coordinates::{ResourceCoordinates, validate_coordinates};
use crate::domain::error::{ConfigError, OutputNotFound};
use crate::domain::outputs::DeclaredOutputs;
use crate::domain::retry::RetryPolicy;

// ── Constants ────────────────────────────────────────────────────────────────

/// Version-pinning file copied next to the staged template.
pub const TOOL_VERSIONS_FILE: &str = ".tool-versions";

/// Config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "tfprobe.yaml";

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `tfprobe.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Terraform template to stage.
    pub template_dir: PathBuf,

    /// Parent of the temporary working copy. System temp dir when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Files copied verbatim into the working copy (default `.tool-versions`).
    #[serde(default = "default_aux_files")]
    pub aux_files: Vec<PathBuf>,

    /// `-var-file` arguments for apply, plan and destroy.
    #[serde(default)]
    pub var_files: Vec<PathBuf>,

    /// Where the live resource is.
    pub resource: ResourceCoordinates,

    /// Live fields to check, each against a literal or a declared output.
    #[serde(default)]
    pub expect: BTreeMap<SnapshotField, ExpectedField>,

    /// Declared outputs checked against literal values.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    /// Live fields printed for information only.
    #[serde(default)]
    pub report: Vec<SnapshotField>,

    /// Fail when a plan after apply still has changes.
    #[serde(default = "default_true")]
    pub check_idempotent: bool,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Expected value of one live field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedField {
    /// Value of a declared output, e.g. `{ output: database_id }`.
    Output { output: String },
    Literal(FieldValue),
}

/// Retry settings layered on top of the built-in transient error list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_secs: Option<u64>,
    /// Extra `regex: reason` pairs.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub patterns: BTreeMap<String, String>,
}

fn default_aux_files() -> Vec<PathBuf> {
    vec![PathBuf::from(TOOL_VERSIONS_FILE)]
}

fn default_true() -> bool {
    true
}

impl RetryConfig {
    /// Build the effective policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a pattern does not compile.
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let defaults = RetryPolicy::default();
        let max_retries = self.max_retries.unwrap_or(defaults.max_retries);
        let backoff = self
            .backoff_secs
            .map_or(defaults.backoff, Duration::from_secs);
        let mut policy = defaults.with_limits(max_retries, backoff);
        for (pattern, reason) in &self.patterns {
            policy = policy.with_pattern(pattern, reason)?;
        }
        Ok(policy)
    }
}

impl HarnessConfig {
    /// Make every relative path relative to `base` (the config file's directory).
    #[must_use]
    pub fn rebased(mut self, base: &Path) -> Self {
        let join = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        self.template_dir = join(self.template_dir);
        self.working_dir = self.working_dir.map(join);
        self.aux_files = self.aux_files.into_iter().map(join).collect();
        self.var_files = self.var_files.into_iter().map(join).collect();
        self
    }

    /// Resolve `expect` into concrete expectations using the provisioned outputs.
    ///
    /// # Errors
    ///
    /// Returns `OutputNotFound` if an expectation references an undeclared output.
    pub fn expectations(&self, outputs: &DeclaredOutputs) -> Result<Vec<Expectation>, OutputNotFound> {
        self.expect
            .iter()
            .map(|(field, expected)| match expected {
                ExpectedField::Literal(value) => Ok(Expectation::new(*field, value.clone())
                    .with_message(format!("{} should match the configured value", field.label()))),
                ExpectedField::Output { output } => {
                    let value = outputs.get(output)?;
                    Ok(Expectation::new(*field, value)
                        .with_message(format!("{} should match output '{output}'", field.label()))
                        .with_sensitive(outputs.is_sensitive(output)))
                }
            })
            .collect()
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validate a parsed config. Collects every problem before failing.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` listing all problems found.
pub fn validate_config(config: &HarnessConfig) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    if let Err(e) = validate_coordinates(&config.resource) {
        problems.push(e.to_string());
    }
    if config.template_dir.as_os_str().is_empty() {
        problems.push("template_dir must not be empty".to_string());
    }
    for (field, expected) in &config.expect {
        match expected {
            ExpectedField::Output { output } if output.trim().is_empty() => {
                problems.push(format!("expect.{field}: output name must not be empty"));
            }
            ExpectedField::Literal(FieldValue::Str(_)) if field.is_flag() => {
                problems.push(format!("expect.{field}: expected a boolean"));
            }
            ExpectedField::Literal(FieldValue::Bool(_)) if !field.is_flag() => {
                problems.push(format!("expect.{field}: expected a string"));
            }
            _ => {}
        }
    }
    for key in config.outputs.keys() {
        if key.trim().is_empty() {
            problems.push("outputs: output name must not be empty".to_string());
        }
    }
    if config.expect.is_empty() && config.outputs.is_empty() {
        problems.push("nothing to verify: set `expect` or `outputs`".to_string());
    }
    if let Err(e) = config.retry.to_policy() {
        problems.push(e.to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(
            problems
                .iter()
                .map(|p| format!("  - {p}"))
                .collect::<Vec<_>>()
                .join("\n"),
        ))
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
