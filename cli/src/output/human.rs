//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use tfprobe_common::{LiveResourceSnapshot, RunSummary, SnapshotField, TeardownStatus};

use crate::output::{OutputContext, table};

/// Renders run results as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render a finished run. `report_fields` are printed as informational
    /// lines before the comparison table.
    pub fn render_summary(&self, summary: &RunSummary, report_fields: &[SnapshotField]) {
        if let Some(snapshot) = summary.snapshot.as_ref().filter(|_| !self.ctx.quiet) {
            for line in report_lines(snapshot, report_fields) {
                println!("{line}");
            }
        }

        if !self.ctx.quiet && !summary.outputs.is_empty() {
            println!();
            self.ctx.header("Outputs:");
            for (key, value) in &summary.outputs {
                self.ctx.kv(&format!("{key}:"), value);
            }
        }

        if !summary.report.checks.is_empty() {
            println!();
            print!("{}", table::render(&summary.report, &self.ctx.styles));
        }

        if let Some(err) = &summary.error {
            println!();
            self.ctx.error(err);
        }

        match &summary.teardown {
            TeardownStatus::NotRequired => {}
            TeardownStatus::Destroyed => self.ctx.success("resources destroyed"),
            TeardownStatus::Failed { diagnostics } => {
                self.ctx
                    .error(&format!("teardown failed; resources may remain:\n{diagnostics}"));
            }
        }

        println!();
        let mismatches = summary.report.mismatch_count();
        if summary.succeeded() {
            println!(
                "  {} {} field(s) matched",
                "PASS".style(self.ctx.styles.success),
                summary.report.checks.len()
            );
        } else {
            println!(
                "  {} {mismatches} mismatch(es), reached {}",
                "FAIL".style(self.ctx.styles.error),
                summary.reached
            );
        }
    }

    /// Render a successful config validation.
    pub fn render_validated(&self, path: &str, terraform: Option<&str>) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.success(&format!("{path} is valid"));
        if let Some(version) = terraform {
            self.ctx.kv("Terraform:", version);
        }
    }
}

/// `Database <Label>: <value>` for each requested field.
#[must_use]
pub fn report_lines(snapshot: &LiveResourceSnapshot, fields: &[SnapshotField]) -> Vec<String> {
    fields
        .iter()
        .map(|field| {
            let value = snapshot
                .field(*field)
                .map_or_else(|| "<absent>".to_string(), |v| v.to_string());
            format!("Database {}: {value}", field.label())
        })
        .collect()
}
