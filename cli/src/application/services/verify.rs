//! Verify a template against the live cloud.
//!
//! Builds the standard two-case suite from a [`HarnessConfig`]:
//! declared outputs against literals, then the live resource against
//! expectations.

use std::future::Future;

use anyhow::Result;
use chrono::Utc;
use tfprobe_common::{ComparisonReport, FieldValue, RunPhase, RunSummary, TeardownStatus};
use tracing::info;

use crate::application::ports::{
    ProgressReporter, ProvisioningTool, ResourceInspector, TemplateStager,
};
use crate::application::services::harness::{EnvironmentView, ScopeOptions, VerificationHarness};
use crate::application::services::suite::{CaseOutput, SuiteFixture};
use crate::domain::comparison::check;
use crate::domain::config::HarnessConfig;

pub const OUTPUTS_CASE: &str = "declared outputs";
pub const LIVE_CASE: &str = "live resource";

/// Stage, provision, verify and tear down as described by `config`.
///
/// Never returns early without teardown once staging succeeded; every
/// failure is folded into the returned summary.
pub async fn run_verification<S, P, I, R>(
    harness: &VerificationHarness<'_, S, P, I, R>,
    config: &HarnessConfig,
    options: ScopeOptions,
    cancel: impl Future<Output = ()>,
) -> RunSummary
where
    S: TemplateStager,
    P: ProvisioningTool,
    I: ResourceInspector,
    R: ProgressReporter,
{
    let started_at = Utc::now();

    let template = match harness
        .stage(
            &config.template_dir,
            config.working_dir.as_deref(),
            &config.aux_files,
        )
        .await
    {
        Ok(t) => t,
        Err(e) => {
            return RunSummary {
                started_at,
                finished_at: Utc::now(),
                reached: RunPhase::Unstaged,
                outputs: Default::default(),
                snapshot: None,
                report: ComparisonReport::default(),
                teardown: TeardownStatus::NotRequired,
                error: Some(format!("{e:#}")),
            };
        }
    };

    let mut suite = SuiteFixture::new(options);
    if !config.outputs.is_empty() {
        suite = suite.case(OUTPUTS_CASE, |env| async move {
            check_declared_outputs(config, &env)
        });
    }
    if !config.expect.is_empty() || !config.report.is_empty() {
        suite = suite.case(LIVE_CASE, |env| async move {
            verify_live(harness, config, &env).await
        });
    }

    suite
        .run(harness, template, config.var_files.clone(), cancel)
        .await
        .into_summary(started_at)
}

/// Compare declared outputs against the literal values in `config.outputs`.
/// Checks on sensitive outputs are masked.
///
/// # Errors
///
/// Returns `OutputNotFound` if a configured output is not declared.
pub fn check_declared_outputs(config: &HarnessConfig, env: &EnvironmentView) -> Result<CaseOutput> {
    let mut report = ComparisonReport::default();
    for (key, expected) in &config.outputs {
        let actual = env.output(key)?;
        let c = check(
            &format!("output.{key}"),
            FieldValue::from(expected.as_str()),
            Some(FieldValue::from(actual)),
            Some(format!("output '{key}' should match the configured value")),
        );
        report.checks.push(if env.outputs().is_sensitive(key) {
            c.masked()
        } else {
            c
        });
    }
    Ok(report.into())
}

/// Fetch the live resource and compare it against `config.expect`.
///
/// # Errors
///
/// Returns `OutputNotFound` for an undeclared output reference, or the live
/// query error.
pub async fn verify_live<S, P, I, R>(
    harness: &VerificationHarness<'_, S, P, I, R>,
    config: &HarnessConfig,
    env: &EnvironmentView,
) -> Result<CaseOutput>
where
    S: TemplateStager,
    P: ProvisioningTool,
    I: ResourceInspector,
    R: ProgressReporter,
{
    let expectations = config.expectations(env.outputs())?;
    harness.reporter().step("querying management API...");
    let snapshot = harness.fetch_live(&config.resource).await?;

    for field in &config.report {
        let shown = snapshot
            .field(*field)
            .map_or_else(|| "<absent>".to_string(), |v| v.to_string());
        info!(field = %field, value = %shown, "live resource field");
    }

    let report = harness.assert(&expectations, &snapshot);
    Ok(CaseOutput {
        report,
        snapshot: Some(snapshot),
    })
}
