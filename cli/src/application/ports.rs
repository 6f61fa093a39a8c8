//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;
use tfprobe_common::LiveResourceSnapshot;

use crate::domain::{DeclaredOutputs, ResolvedCoordinates};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Keeps a staged working directory alive. Dropping it removes the directory.
pub trait WorkdirGuard: Send {
    /// Disarm the guard so the directory survives, returning its path.
    fn persist(self: Box<Self>) -> PathBuf;
}

/// An isolated working copy of a template, ready to provision.
pub struct StagedTemplate {
    /// Directory terraform runs in.
    pub dir: PathBuf,
    /// Auxiliary files that were copied into `dir`.
    pub aux_copied: Vec<PathBuf>,
    guard: Option<Box<dyn WorkdirGuard>>,
}

impl StagedTemplate {
    /// Wrap a directory whose lifetime is bound to `guard`.
    pub fn new(dir: PathBuf, aux_copied: Vec<PathBuf>, guard: Box<dyn WorkdirGuard>) -> Self {
        Self {
            dir,
            aux_copied,
            guard: Some(guard),
        }
    }

    /// A directory the harness does not own and will never delete.
    #[must_use]
    pub fn unmanaged(dir: PathBuf) -> Self {
        Self {
            dir,
            aux_copied: Vec::new(),
            guard: None,
        }
    }

    /// Keep the working directory on disk after this value is dropped.
    pub fn persist(&mut self) -> &Path {
        if let Some(guard) = self.guard.take() {
            self.dir = guard.persist();
        }
        &self.dir
    }
}

impl fmt::Debug for StagedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedTemplate")
            .field("dir", &self.dir)
            .field("aux_copied", &self.aux_copied)
            .field("managed", &self.guard.is_some())
            .finish()
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout, if any.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program with extra environment variables set.
    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<Output>;
}

// ── Staging Port ──────────────────────────────────────────────────────────────

/// Copies a template tree into an isolated working directory.
#[allow(async_fn_in_trait)]
pub trait TemplateStager {
    /// Copy `source` into a fresh directory under `working_dir_hint` (system
    /// temp dir when `None`), then copy each of `aux_files` next to it.
    ///
    /// # Errors
    ///
    /// Returns a `StagingError` if the source cannot be read or the working
    /// directory cannot be created. The source tree is never written to.
    async fn stage(
        &self,
        source: &Path,
        working_dir_hint: Option<&Path>,
        aux_files: &[PathBuf],
    ) -> Result<StagedTemplate>;
}

// ── Provisioning Port ─────────────────────────────────────────────────────────

/// The infrastructure-as-code tool that turns a template into live resources.
#[allow(async_fn_in_trait)]
pub trait ProvisioningTool {
    /// Download providers and modules for the template in `dir`.
    async fn init(&self, dir: &Path) -> Result<()>;
    /// Create or update every resource the template declares.
    async fn apply(&self, dir: &Path, var_files: &[PathBuf]) -> Result<()>;
    /// Plan against live state; `Some(plan)` when changes are still pending.
    async fn pending_changes(&self, dir: &Path, var_files: &[PathBuf]) -> Result<Option<String>>;
    /// Read every declared output.
    async fn outputs(&self, dir: &Path) -> Result<DeclaredOutputs>;
    /// Delete every resource the template created.
    async fn destroy(&self, dir: &Path, var_files: &[PathBuf]) -> Result<()>;
}

// ── Live Resource Port ────────────────────────────────────────────────────────

/// Reads resources straight from the cloud management API, bypassing the
/// provisioning tool's state.
#[allow(async_fn_in_trait)]
pub trait ResourceInspector {
    /// Fetch a SQL database.
    ///
    /// # Errors
    ///
    /// Returns `LiveQueryError::ResourceNotFound` when the database does not
    /// exist and `LiveQueryError::Authorization` when credentials are rejected.
    async fn sql_database(&self, coords: &ResolvedCoordinates) -> Result<LiveResourceSnapshot>;
}

/// Supplies bearer tokens for the management API.
#[allow(async_fn_in_trait)]
pub trait TokenProvider {
    async fn access_token(&self) -> Result<String>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync on purpose.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
