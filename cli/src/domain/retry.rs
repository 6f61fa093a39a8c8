//! Retry policy for transient provisioning errors.
//!
//! Pure matching logic; sleeping between attempts is the caller's job.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::domain::error::ConfigError;

/// Transient Terraform failures worth another attempt, with the reason logged
/// when one matches.
pub const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (r"read: connection reset by peer", "Failed to reach helm charts repository."),
    (r"transport is closing", "Failed to reach Kubernetes API."),
    (r"unable to verify signature", "Failed to retrieve plugin due to transient network error."),
    (r"unable to verify checksum", "Failed to retrieve plugin due to transient network error."),
    (r"no provider exists with the given name", "Failed to retrieve plugin due to transient network error."),
    (r"registry service is unreachable", "Failed to retrieve plugin due to transient network error."),
    (r"Error installing provider", "Failed to retrieve plugin due to transient network error."),
    (r"Failed to query available provider packages", "Failed to retrieve plugin due to transient network error."),
    (r"timeout while waiting for plugin to start", "Failed to retrieve plugin due to transient network error."),
    (r"timed out waiting for server handshake", "Failed to retrieve plugin due to transient network error."),
    (r"could not query provider registry for", "Failed to retrieve plugin due to transient network error."),
    (r"Provider produced inconsistent result after apply", "Provider eventual consistency error."),
];

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

static DEFAULT_PATTERNS: LazyLock<Vec<(Regex, String)>> = LazyLock::new(|| {
    DEFAULT_RETRYABLE_ERRORS
        .iter()
        .map(|(pattern, reason)| {
            // Patterns are constants.
            #[allow(clippy::expect_used)]
            let re = Regex::new(pattern).expect("valid regex");
            (re, (*reason).to_string())
        })
        .collect()
});

/// Which failures to retry, how often, and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    patterns: Vec<(Regex, String)>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            patterns: Vec::new(),
        }
    }

    /// Add a pattern on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `pattern` is not a valid regex.
    pub fn with_pattern(mut self, pattern: &str, reason: &str) -> Result<Self, ConfigError> {
        let re = Regex::new(pattern)
            .map_err(|e| ConfigError::Invalid(format!("retry pattern '{pattern}': {e}")))?;
        self.patterns.push((re, reason.to_string()));
        Ok(self)
    }

    #[must_use]
    pub fn with_limits(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Reason of the first pattern found in `diagnostics`, if any.
    #[must_use]
    pub fn retryable_reason(&self, diagnostics: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(re, _)| re.is_match(diagnostics))
            .map(|(_, reason)| reason.as_str())
    }
}
