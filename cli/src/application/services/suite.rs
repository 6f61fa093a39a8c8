//! Suite fixture: one provisioned environment shared by many checks.
//!
//! A [`SuiteFixture`] is built once per group of test cases. It stages and
//! provisions a single environment, runs every registered case against it,
//! and tears down after the last case whatever the individual outcomes.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::FutureExt as _;
use futures_util::future::LocalBoxFuture;
use tfprobe_common::{ComparisonReport, LiveResourceSnapshot, RunPhase, RunSummary, TeardownStatus};
use tracing::info;

use crate::application::ports::{
    ProgressReporter, ProvisioningTool, ResourceInspector, StagedTemplate, TemplateStager,
};
use crate::application::services::harness::{
    EnvironmentView, ScopeOptions, VerificationHarness, panic_message,
};

type CaseFn<'a> = Box<dyn FnOnce(EnvironmentView) -> LocalBoxFuture<'a, Result<CaseOutput>> + 'a>;

/// What a single case produced.
#[derive(Debug, Clone, Default)]
pub struct CaseOutput {
    pub report: ComparisonReport,
    /// Live snapshot the case compared against, if it fetched one.
    pub snapshot: Option<LiveResourceSnapshot>,
}

impl From<ComparisonReport> for CaseOutput {
    fn from(report: ComparisonReport) -> Self {
        Self {
            report,
            snapshot: None,
        }
    }
}

/// Outcome of one case. Errors and panics are recorded as `Err(message)`.
#[derive(Debug)]
pub struct CaseOutcome {
    pub name: String,
    pub result: Result<CaseOutput, String>,
}

impl CaseOutcome {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(&self.result, Ok(out) if out.report.passed())
    }
}

/// Everything a suite run produced.
#[derive(Debug)]
pub struct SuiteReport {
    pub reached: RunPhase,
    pub outputs: BTreeMap<String, String>,
    pub cases: Vec<CaseOutcome>,
    pub teardown: TeardownStatus,
    /// Set when provisioning or the scope itself failed.
    pub error: Option<String>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none()
            && self.cases.iter().all(CaseOutcome::passed)
            && !matches!(self.teardown, TeardownStatus::Failed { .. })
    }

    /// Flatten into the serializable run summary.
    #[must_use]
    pub fn into_summary(self, started_at: DateTime<Utc>) -> RunSummary {
        let mut report = ComparisonReport::default();
        let mut snapshot = None;
        let mut errors: Vec<String> = self.error.into_iter().collect();

        for case in self.cases {
            match case.result {
                Ok(out) => {
                    report.extend(out.report);
                    if out.snapshot.is_some() {
                        snapshot = out.snapshot;
                    }
                }
                Err(msg) => errors.push(format!("{}: {msg}", case.name)),
            }
        }

        RunSummary {
            started_at,
            finished_at: Utc::now(),
            reached: self.reached,
            outputs: self.outputs,
            snapshot,
            report,
            teardown: self.teardown,
            error: if errors.is_empty() {
                None
            } else {
                Some(errors.join("\n"))
            },
        }
    }
}

/// A group of cases sharing one provisioned environment.
pub struct SuiteFixture<'a> {
    options: ScopeOptions,
    cases: Vec<(String, CaseFn<'a>)>,
}

impl<'a> SuiteFixture<'a> {
    #[must_use]
    pub fn new(options: ScopeOptions) -> Self {
        Self {
            options,
            cases: Vec::new(),
        }
    }

    /// Register a case. Cases run in registration order.
    #[must_use]
    pub fn case<F, Fut>(mut self, name: &str, f: F) -> Self
    where
        F: FnOnce(EnvironmentView) -> Fut + 'a,
        Fut: Future<Output = Result<CaseOutput>> + 'a,
    {
        self.cases
            .push((name.to_string(), Box::new(move |env| f(env).boxed_local())));
        self
    }

    /// Provision `template`, run every case, then tear down exactly once.
    pub async fn run<S, P, I, R>(
        self,
        harness: &VerificationHarness<'_, S, P, I, R>,
        template: StagedTemplate,
        var_files: Vec<PathBuf>,
        cancel: impl Future<Output = ()>,
    ) -> SuiteReport
    where
        S: TemplateStager,
        P: ProvisioningTool,
        I: ResourceInspector,
        R: ProgressReporter,
    {
        let Self { options, cases } = self;
        let reporter = harness.reporter();

        let outcome = harness
            .with_environment(template, var_files, &options, cancel, |env| async move {
                let mut outcomes = Vec::with_capacity(cases.len());
                for (name, case) in cases {
                    reporter.step(&format!("running case '{name}'..."));
                    let result = match AssertUnwindSafe(case(env.clone())).catch_unwind().await {
                        Ok(Ok(out)) => Ok(out),
                        Ok(Err(e)) => Err(format!("{e:#}")),
                        Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
                    };
                    let outcome = CaseOutcome { name, result };
                    info!(case = %outcome.name, passed = outcome.passed(), "case finished");
                    if outcome.passed() {
                        reporter.success(&format!("case '{}' passed", outcome.name));
                    } else {
                        reporter.warn(&format!("case '{}' failed", outcome.name));
                    }
                    outcomes.push(outcome);
                }
                Ok(outcomes)
            })
            .await;

        let (cases, error) = match outcome.result {
            Ok(cases) => (cases, None),
            Err(e) => (Vec::new(), Some(format!("{e:#}"))),
        };

        // A case that errored or panicked never finished verifying.
        let reached = match outcome.reached {
            RunPhase::Verified if cases.iter().any(|c| c.result.is_err()) => RunPhase::Provisioned,
            other => other,
        };

        SuiteReport {
            reached,
            outputs: outcome.outputs,
            cases,
            teardown: outcome.teardown,
            error,
        }
    }
}
