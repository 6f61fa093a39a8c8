//! Declared template outputs.

use std::collections::BTreeMap;

use serde::Deserialize;
use tfprobe_common::SENSITIVE_PLACEHOLDER;

use crate::domain::error::{OutputNotFound, ProvisionError};

/// One entry of `terraform output -json`.
#[derive(Debug, Deserialize)]
struct RawOutput {
    value: serde_json::Value,
    #[serde(default)]
    sensitive: bool,
}

/// Named string outputs of a provisioned template. Keys are unique and the
/// map never changes after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredOutputs {
    values: BTreeMap<String, String>,
    sensitive: Vec<String>,
}

impl DeclaredOutputs {
    /// Parse the JSON printed by `terraform output -json`.
    ///
    /// String values are kept verbatim; anything else is stored as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::OutputParse` if the document is not an output map.
    pub fn parse_json(json: &str) -> Result<Self, ProvisionError> {
        let raw: BTreeMap<String, RawOutput> = serde_json::from_str(json.trim())
            .map_err(|e| ProvisionError::OutputParse(e.to_string()))?;
        let mut sensitive = Vec::new();
        let values = raw
            .into_iter()
            .map(|(key, out)| {
                if out.sensitive {
                    sensitive.push(key.clone());
                }
                let value = match out.value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        Ok(Self { values, sensitive })
    }

    /// Value of `key`.
    ///
    /// # Errors
    ///
    /// Returns `OutputNotFound` if the template does not declare `key`.
    pub fn get(&self, key: &str) -> Result<&str, OutputNotFound> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| OutputNotFound {
                key: key.to_string(),
                available: self.keys().collect::<Vec<_>>().join(", "),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive.iter().any(|k| k == key)
    }

    /// Copy of all outputs with sensitive values masked, for reports.
    #[must_use]
    pub fn redacted(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                let shown = if self.is_sensitive(k) {
                    SENSITIVE_PLACEHOLDER.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), shown)
            })
            .collect()
    }
}
