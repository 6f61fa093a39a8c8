//! Infrastructure implementation of the `ProvisioningTool` port.
//!
//! `TerraformCli<R>` routes every terraform invocation through a
//! `CommandRunner` and retries the transient failures listed in its
//! `RetryPolicy`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::ports::{CommandRunner, ProvisioningTool};
use crate::domain::error::ProvisionError;
use crate::domain::outputs::DeclaredOutputs;
use crate::domain::retry::RetryPolicy;
use crate::infra::command_runner::{DEFAULT_PROBE_TIMEOUT, TokioCommandRunner};

/// Environment every terraform invocation runs with.
pub const TF_ENV: &[(&str, &str)] = &[("TF_IN_AUTOMATION", "1"), ("TF_INPUT", "0")];

/// `terraform plan -detailed-exitcode` exit code for "changes pending".
const PLAN_CHANGES_EXIT: i32 = 2;

/// Infrastructure adapter that drives the terraform CLI.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct TerraformCli<R: CommandRunner> {
    runner: R,
    binary: String,
    retry: RetryPolicy,
}

impl<R: CommandRunner> TerraformCli<R> {
    pub fn new(runner: R, binary: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            runner,
            binary: binary.into(),
            retry,
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// `terraform version` first line, e.g. `Terraform v1.9.5`.
    ///
    /// # Errors
    ///
    /// Returns an error if terraform is not installed or exits non-zero.
    pub async fn version(&self) -> Result<String> {
        let out = self
            .runner
            .run_with_timeout(&self.binary, &["version"], DEFAULT_PROBE_TIMEOUT)
            .await
            .with_context(|| format!("{} version", self.binary))?;
        if !out.status.success() {
            anyhow::bail!("{} version failed: {}", self.binary, diagnostics(&out));
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    /// Run one terraform step, retrying transient failures. Exit codes in
    /// `ok_codes` count as success.
    async fn run_step(&self, step: &str, args: &[String], ok_codes: &[i32]) -> Result<Output> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            debug!(step, attempt, args = ?argv, "terraform");
            let out = self
                .runner
                .run_with_env(&self.binary, &argv, TF_ENV)
                .await
                .with_context(|| format!("running terraform {step}"))?;

            let code = out.status.code().unwrap_or(-1);
            if ok_codes.contains(&code) {
                return Ok(out);
            }

            let diagnostics = diagnostics(&out);
            match self.retry.retryable_reason(&diagnostics) {
                Some(reason) if attempt <= self.retry.max_retries => {
                    warn!(step, attempt, reason, "transient terraform error; retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Some(reason) => {
                    return Err(ProvisionError::RetriesExhausted {
                        step: step.to_string(),
                        attempts: attempt,
                        reason: reason.to_string(),
                        diagnostics,
                    }
                    .into());
                }
                None => {
                    return Err(ProvisionError::CommandFailed {
                        step: step.to_string(),
                        code,
                        diagnostics,
                    }
                    .into());
                }
            }
        }
    }
}

impl TerraformCli<TokioCommandRunner> {
    /// Convenience constructor for production use. No timeout: applies can
    /// legitimately run for a long time.
    #[must_use]
    pub fn default_runner(binary: &str, retry: RetryPolicy) -> Self {
        Self::new(TokioCommandRunner::unbounded(), binary, retry)
    }
}

impl<R: CommandRunner> ProvisioningTool for TerraformCli<R> {
    async fn init(&self, dir: &Path) -> Result<()> {
        let args = base_args(dir, "init", &["-input=false", "-no-color", "-upgrade=false"]);
        self.run_step("init", &args, &[0]).await?;
        info!(workdir = %dir.display(), "terraform init complete");
        Ok(())
    }

    async fn apply(&self, dir: &Path, var_files: &[PathBuf]) -> Result<()> {
        let mut args = base_args(
            dir,
            "apply",
            &["-input=false", "-no-color", "-auto-approve", "-lock=true"],
        );
        args.extend(var_file_args(var_files));
        self.run_step("apply", &args, &[0]).await?;
        info!(workdir = %dir.display(), "terraform apply complete");
        Ok(())
    }

    async fn pending_changes(&self, dir: &Path, var_files: &[PathBuf]) -> Result<Option<String>> {
        let mut args = base_args(
            dir,
            "plan",
            &["-input=false", "-no-color", "-lock=true", "-detailed-exitcode"],
        );
        args.extend(var_file_args(var_files));
        let out = self.run_step("plan", &args, &[0, PLAN_CHANGES_EXIT]).await?;
        if out.status.code() == Some(PLAN_CHANGES_EXIT) {
            return Ok(Some(String::from_utf8_lossy(&out.stdout).into_owned()));
        }
        Ok(None)
    }

    async fn outputs(&self, dir: &Path) -> Result<DeclaredOutputs> {
        let args = base_args(dir, "output", &["-no-color", "-json"]);
        let out = self.run_step("output", &args, &[0]).await?;
        Ok(DeclaredOutputs::parse_json(&String::from_utf8_lossy(
            &out.stdout,
        ))?)
    }

    async fn destroy(&self, dir: &Path, var_files: &[PathBuf]) -> Result<()> {
        let mut args = base_args(
            dir,
            "destroy",
            &["-input=false", "-no-color", "-auto-approve", "-lock=true"],
        );
        args.extend(var_file_args(var_files));
        self.run_step("destroy", &args, &[0]).await?;
        info!(workdir = %dir.display(), "terraform destroy complete");
        Ok(())
    }
}

/// `-chdir=<dir> <subcommand> <flags...>`
#[must_use]
pub fn base_args(dir: &Path, subcommand: &str, flags: &[&str]) -> Vec<String> {
    let mut args = vec![format!("-chdir={}", dir.display()), subcommand.to_string()];
    args.extend(flags.iter().map(|f| (*f).to_string()));
    args
}

/// One `-var-file=` per file. Paths are made absolute because `-chdir`
/// would otherwise resolve them against the working copy.
#[must_use]
pub fn var_file_args(var_files: &[PathBuf]) -> Vec<String> {
    var_files
        .iter()
        .map(|f| {
            let abs = std::path::absolute(f).unwrap_or_else(|_| f.clone());
            format!("-var-file={}", abs.display())
        })
        .collect()
}

/// stderr followed by stdout, untrimmed beyond trailing whitespace.
fn diagnostics(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    match (stderr.trim_end().is_empty(), stdout.trim_end().is_empty()) {
        (false, false) => format!("{}\n{}", stderr.trim_end(), stdout.trim_end()),
        (false, true) => stderr.trim_end().to_string(),
        _ => stdout.trim_end().to_string(),
    }
}
