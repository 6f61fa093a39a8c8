//! Field-by-field comparison of expectations against a live snapshot.
//!
//! Every field is checked; a mismatch is recorded, never raised, so one run
//! reports all differences at once.

use tfprobe_common::{ComparisonReport, FieldCheck, FieldValue, LiveResourceSnapshot, SnapshotField};

/// One expected value for one snapshot field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub field: SnapshotField,
    pub expected: FieldValue,
    pub message: Option<String>,
    /// Mask both values in the resulting check.
    pub sensitive: bool,
}

impl Expectation {
    #[must_use]
    pub fn new(field: SnapshotField, expected: impl Into<FieldValue>) -> Self {
        Self {
            field,
            expected: expected.into(),
            message: None,
            sensitive: false,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }
}

/// Compare every expectation against `snapshot`. Exact equality only.
#[must_use]
pub fn compare(expectations: &[Expectation], snapshot: &LiveResourceSnapshot) -> ComparisonReport {
    let checks = expectations
        .iter()
        .map(|e| {
            let c = check(
                e.field.as_str(),
                e.expected.clone(),
                snapshot.field(e.field),
                e.message.clone(),
            );
            if e.sensitive { c.masked() } else { c }
        })
        .collect();
    ComparisonReport { checks }
}

/// Build a single check. An absent actual value never matches.
#[must_use]
pub fn check(
    field: &str,
    expected: FieldValue,
    actual: Option<FieldValue>,
    message: Option<String>,
) -> FieldCheck {
    let passed = actual.as_ref() == Some(&expected);
    FieldCheck {
        field: field.to_string(),
        expected,
        actual,
        passed,
        message,
    }
}
