//! The verification harness.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Lifecycle per run: stage → provision → read outputs → fetch live state →
//! compare → tear down. [`VerificationHarness::with_environment`] registers
//! teardown the moment a [`ProvisionedEnvironment`] exists, so no exit path
//! skips it. Timeouts and cancellation wait for a running terraform step to
//! finish, so its state is on disk before destroy runs.

use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures_util::FutureExt as _;
use tfprobe_common::{ComparisonReport, LiveResourceSnapshot, TeardownStatus};
use tracing::{debug, error, info, warn};

use crate::application::ports::{
    ProgressReporter, ProvisioningTool, ResourceInspector, StagedTemplate, TemplateStager,
};
use crate::domain::comparison::{Expectation, compare};
use crate::domain::coordinates::{AmbientEnv, ResourceCoordinates, resolve};
use crate::domain::error::{Interrupted, OutputNotFound, ProvisionError};
use crate::domain::lifecycle::{PhaseTracker, RunPhase};
use crate::domain::outputs::DeclaredOutputs;

// ── Environment ───────────────────────────────────────────────────────────────

/// Live result of applying a staged template.
///
/// Outputs are read once after apply and never change. Teardown runs at most
/// once; dropping an applied environment that was never torn down keeps its
/// working directory on disk and logs where it is.
pub struct ProvisionedEnvironment {
    template: StagedTemplate,
    var_files: Vec<PathBuf>,
    outputs: Option<Arc<DeclaredOutputs>>,
    apply_attempted: bool,
    teardown: Option<TeardownStatus>,
}

impl ProvisionedEnvironment {
    /// Take ownership of a staged template. Nothing is applied yet.
    #[must_use]
    pub fn new(template: StagedTemplate, var_files: Vec<PathBuf>) -> Self {
        Self {
            template,
            var_files,
            outputs: None,
            apply_attempted: false,
            teardown: None,
        }
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.template.dir
    }

    #[must_use]
    pub fn var_files(&self) -> &[PathBuf] {
        &self.var_files
    }

    /// Declared outputs, once provisioning has succeeded.
    #[must_use]
    pub fn outputs(&self) -> Option<&DeclaredOutputs> {
        self.outputs.as_deref()
    }

    /// Cheap read-only handle passed to test bodies.
    #[must_use]
    pub fn view(&self) -> Option<EnvironmentView> {
        self.outputs.as_ref().map(|outputs| EnvironmentView {
            workdir: self.template.dir.clone(),
            outputs: Arc::clone(outputs),
        })
    }
}

impl Drop for ProvisionedEnvironment {
    fn drop(&mut self) {
        if self.apply_attempted && self.teardown.is_none() {
            let dir = self.template.persist().display().to_string();
            error!(
                workdir = %dir,
                "environment dropped before teardown; resources may still exist, run `terraform destroy` in the working directory"
            );
        }
    }
}

/// Read-only view of a provisioned environment.
#[derive(Debug, Clone)]
pub struct EnvironmentView {
    workdir: PathBuf,
    outputs: Arc<DeclaredOutputs>,
}

impl EnvironmentView {
    /// Value of a declared output. Same answer every call.
    ///
    /// # Errors
    ///
    /// Returns `OutputNotFound` if the template does not declare `key`.
    pub fn output(&self, key: &str) -> Result<String, OutputNotFound> {
        self.outputs.get(key).map(str::to_owned)
    }

    #[must_use]
    pub fn outputs(&self) -> &DeclaredOutputs {
        &self.outputs
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Options for [`VerificationHarness::with_environment`].
#[derive(Debug, Clone)]
pub struct ScopeOptions {
    /// Bound on provision + verification. Teardown is never subject to it.
    pub verify_timeout: Option<Duration>,
    /// Fail when a plan right after apply still reports changes.
    pub check_idempotent: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            verify_timeout: None,
            check_idempotent: true,
        }
    }
}

/// What happened inside one scoped run.
#[derive(Debug)]
pub struct ScopedOutcome<T> {
    /// Furthest phase reached before teardown.
    pub reached: RunPhase,
    pub result: Result<T>,
    pub teardown: TeardownStatus,
    /// Declared outputs with sensitive values masked; empty if never provisioned.
    pub outputs: BTreeMap<String, String>,
}

// ── Harness ───────────────────────────────────────────────────────────────────

/// Orchestrates staging, provisioning, live verification and teardown.
pub struct VerificationHarness<'a, S, P, I, R> {
    stager: &'a S,
    tool: &'a P,
    inspector: &'a I,
    reporter: &'a R,
    ambient: AmbientEnv,
}

impl<'a, S, P, I, R> VerificationHarness<'a, S, P, I, R>
where
    S: TemplateStager,
    P: ProvisioningTool,
    I: ResourceInspector,
    R: ProgressReporter,
{
    pub fn new(stager: &'a S, tool: &'a P, inspector: &'a I, reporter: &'a R, ambient: AmbientEnv) -> Self {
        Self {
            stager,
            tool,
            inspector,
            reporter,
            ambient,
        }
    }

    #[must_use]
    pub fn reporter(&self) -> &R {
        self.reporter
    }

    /// Copy the template and auxiliary files into an isolated working directory.
    ///
    /// # Errors
    ///
    /// Returns a `StagingError` if the source is unreadable or the working
    /// directory cannot be created.
    pub async fn stage(
        &self,
        source: &Path,
        working_dir_hint: Option<&Path>,
        aux_files: &[PathBuf],
    ) -> Result<StagedTemplate> {
        self.reporter.step("staging template...");
        let staged = self.stager.stage(source, working_dir_hint, aux_files).await?;
        info!(source = %source.display(), workdir = %staged.dir.display(), "template staged");
        self.reporter
            .success(&format!("template staged in {}", staged.dir.display()));
        Ok(staged)
    }

    /// Init, apply, check the apply is a no-op the second time, read outputs.
    ///
    /// # Errors
    ///
    /// Returns the provisioning tool's error with its diagnostics intact, or
    /// `ProvisionError::NotIdempotent` when the plan after apply has changes.
    pub async fn provision(&self, env: &mut ProvisionedEnvironment, check_idempotent: bool) -> Result<()> {
        self.provision_steps(env, check_idempotent, || Ok(())).await
    }

    /// Terraform steps always run to completion so state is written before
    /// teardown. `checkpoint` is consulted before each step and may stop the
    /// sequence there.
    async fn provision_steps(
        &self,
        env: &mut ProvisionedEnvironment,
        check_idempotent: bool,
        mut checkpoint: impl FnMut() -> Result<(), Interrupted>,
    ) -> Result<()> {
        let dir = env.template.dir.clone();

        checkpoint()?;
        self.reporter.step("initializing terraform...");
        self.tool.init(&dir).await?;

        checkpoint()?;
        self.reporter.step("applying template...");
        env.apply_attempted = true;
        self.tool.apply(&dir, &env.var_files).await?;

        if check_idempotent {
            checkpoint()?;
            self.reporter.step("checking a second apply is a no-op...");
            if let Some(plan) = self.tool.pending_changes(&dir, &env.var_files).await? {
                return Err(ProvisionError::NotIdempotent { plan }.into());
            }
        }

        checkpoint()?;
        let outputs = self.tool.outputs(&dir).await?;
        debug!(outputs = ?outputs.keys().collect::<Vec<_>>(), "outputs read");
        env.outputs = Some(Arc::new(outputs));
        self.reporter.success("template applied");
        Ok(())
    }

    /// Value of a declared output.
    ///
    /// # Errors
    ///
    /// Returns `OutputNotFound` if the key is absent, or an error if the
    /// environment has not been provisioned.
    pub fn output(&self, env: &ProvisionedEnvironment, key: &str) -> Result<String> {
        let outputs = env
            .outputs()
            .ok_or_else(|| anyhow!("environment has not been provisioned"))?;
        Ok(outputs.get(key)?.to_owned())
    }

    /// Read the database straight from the management API. Never cached.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if no subscription resolves, otherwise the
    /// inspector's `LiveQueryError`.
    pub async fn fetch_live(&self, coords: &ResourceCoordinates) -> Result<LiveResourceSnapshot> {
        let resolved = resolve(coords, &self.ambient)?;
        debug!(resource = %resolved.resource_path(), "fetching live resource");
        self.inspector.sql_database(&resolved).await
    }

    /// Compare expectations against a snapshot, recording every mismatch.
    #[must_use]
    pub fn assert(&self, expectations: &[Expectation], snapshot: &LiveResourceSnapshot) -> ComparisonReport {
        let report = compare(expectations, snapshot);
        for miss in report.mismatches() {
            warn!(field = %miss.field, expected = %miss.expected, actual = ?miss.actual, "field mismatch");
        }
        report
    }

    /// Destroy the environment. Runs at most once; later calls return the
    /// first result.
    pub async fn teardown(&self, env: &mut ProvisionedEnvironment) -> TeardownStatus {
        if let Some(done) = &env.teardown {
            return done.clone();
        }

        let status = if env.apply_attempted {
            self.reporter.step("destroying resources...");
            match self.tool.destroy(&env.template.dir, &env.var_files).await {
                Ok(()) => {
                    info!(workdir = %env.template.dir.display(), "resources destroyed");
                    self.reporter.success("resources destroyed");
                    TeardownStatus::Destroyed
                }
                Err(e) => {
                    let kept = env.template.persist().display().to_string();
                    error!(workdir = %kept, error = %format!("{e:#}"), "teardown failed");
                    self.reporter
                        .warn(&format!("teardown failed; working copy kept at {kept}"));
                    TeardownStatus::Failed {
                        diagnostics: format!("{e:#}"),
                    }
                }
            }
        } else {
            debug!("nothing was applied; skipping destroy");
            TeardownStatus::NotRequired
        };

        env.teardown = Some(status.clone());
        status
    }

    /// Provision `template`, run `body` against it, then always tear down.
    ///
    /// `opts.verify_timeout` and `cancel` bound provisioning and `body` only.
    /// A terraform step that is already running is never interrupted; the
    /// run stops before the next step. `body` itself is dropped as soon as
    /// either fires. Teardown then runs to completion.
    pub async fn with_environment<T, F, Fut>(
        &self,
        template: StagedTemplate,
        var_files: Vec<PathBuf>,
        opts: &ScopeOptions,
        cancel: impl Future<Output = ()>,
        body: F,
    ) -> ScopedOutcome<T>
    where
        F: FnOnce(EnvironmentView) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut phases = PhaseTracker::default();
        enter(&mut phases, RunPhase::Staged);
        let mut env = ProvisionedEnvironment::new(template, var_files);
        let mut stop = pin!(interruption(opts.verify_timeout, cancel).fuse());

        let result = {
            let work = AssertUnwindSafe(async {
                self.provision_steps(&mut env, opts.check_idempotent, || {
                    stop.as_mut().now_or_never().map_or(Ok(()), Err)
                })
                .await?;
                enter(&mut phases, RunPhase::Provisioned);
                let view = env
                    .view()
                    .ok_or_else(|| anyhow!("environment has no outputs after provisioning"))?;
                let value = tokio::select! {
                    value = body(view) => value?,
                    reason = stop.as_mut() => return Err(reason.into()),
                };
                enter(&mut phases, RunPhase::Verified);
                Ok::<T, anyhow::Error>(value)
            })
            .catch_unwind();

            match work.await {
                Ok(result) => result,
                Err(payload) => Err(anyhow!("test body panicked: {}", panic_message(&*payload))),
            }
        };

        if let Err(e) = &result {
            warn!(error = %format!("{e:#}"), phase = %phases.current(), "run failed; tearing down");
        }

        let reached = phases.furthest();
        let teardown = self.teardown(&mut env).await;
        enter(&mut phases, RunPhase::Destroyed);

        ScopedOutcome {
            reached,
            result,
            teardown,
            outputs: env
                .outputs()
                .map(DeclaredOutputs::redacted)
                .unwrap_or_default(),
        }
    }
}

/// Resolves with whichever comes first: `cancel` or the deadline.
async fn interruption(limit: Option<Duration>, cancel: impl Future<Output = ()>) -> Interrupted {
    let deadline = async {
        match limit {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                Interrupted::TimedOut(limit)
            }
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        reason = deadline => reason,
        () = cancel => Interrupted::Cancelled,
    }
}

fn enter(phases: &mut PhaseTracker, next: RunPhase) {
    match phases.advance(next) {
        Ok(()) => debug!(phase = %next, "phase entered"),
        Err(e) => warn!(error = %e, "unexpected phase transition"),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
