//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution, with an optional timeout that kills the
//! child when it fires.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::application::ports::CommandRunner;

/// Default timeout for short diagnostic commands (`terraform version`, `az account`).
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Production `CommandRunner` backed by `tokio::process`.
///
/// With no default timeout, `run` waits as long as the child runs; resource
/// creation can take many minutes and the caller owns cancellation.
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    /// Runner whose `run` kills the child after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// Runner whose `run` never times out.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { timeout: None }
    }

    async fn execute(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<Output> {
        debug!(program, ?args, "spawning");
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .envs(env.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        let collect = async {
            let (status, stdout, stderr) = tokio::join!(
                child.wait(),
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stdout_handle {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut h) = stderr_handle {
                        let _ = h.read_to_end(&mut buf).await;
                    }
                    buf
                },
            );
            Ok::<Output, anyhow::Error>(Output {
                status: status.with_context(|| format!("waiting for {program}"))?,
                stdout,
                stderr,
            })
        };

        match timeout {
            None => collect.await,
            Some(limit) => match tokio::time::timeout(limit, collect).await {
                Ok(result) => result,
                // kill_on_drop reaps the child once `collect` is dropped here.
                Err(_) => anyhow::bail!("{program} timed out after {}s", limit.as_secs()),
            },
        }
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.execute(program, args, &[], self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        self.execute(program, args, &[], Some(timeout)).await
    }

    async fn run_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<Output> {
        self.execute(program, args, env, self.timeout).await
    }
}
