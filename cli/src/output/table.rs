//! Field-by-field comparison table.

use std::fmt::Write as _;

use owo_colors::OwoColorize as _;
use tfprobe_common::{ComparisonReport, FieldCheck};

use crate::output::Styles;

const HEADERS: [&str; 4] = ["FIELD", "EXPECTED", "ACTUAL", "RESULT"];
const ABSENT: &str = "<absent>";

/// Render `report` as an aligned table, one row per check.
///
/// Padding is computed on the plain text so colors never skew alignment.
#[must_use]
pub fn render(report: &ComparisonReport, styles: &Styles) -> String {
    let rows: Vec<[String; 3]> = report.checks.iter().map(cells).collect();

    let mut widths = [HEADERS[0].len(), HEADERS[1].len(), HEADERS[2].len()];
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<w0$}  {:<w1$}  {:<w2$}  {}",
        HEADERS[0].style(styles.bold),
        HEADERS[1].style(styles.bold),
        HEADERS[2].style(styles.bold),
        HEADERS[3].style(styles.bold),
        w0 = widths[0],
        w1 = widths[1],
        w2 = widths[2],
    );
    for (check, row) in report.checks.iter().zip(&rows) {
        let verdict = if check.passed {
            "pass".style(styles.success).to_string()
        } else {
            "FAIL".style(styles.error).to_string()
        };
        let _ = writeln!(
            out,
            "  {:<w0$}  {:<w1$}  {:<w2$}  {verdict}",
            row[0],
            row[1],
            row[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        );
    }
    out
}

fn cells(check: &FieldCheck) -> [String; 3] {
    [
        check.field.clone(),
        check.expected.to_string(),
        check
            .actual
            .as_ref()
            .map_or_else(|| ABSENT.to_string(), ToString::to_string),
    ]
}
