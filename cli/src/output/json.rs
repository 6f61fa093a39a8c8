//! JSON output helpers.
//!
//! `--json` prints exactly one document on stdout: the run summary on
//! completion, or an error object when the command could not start.

use anyhow::{Context, Result};
use tfprobe_common::RunSummary;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Pretty-print a run summary.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_summary(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("JSON serialization failed")
}
