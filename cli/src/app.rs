//! Application context: state shared by every command handler.
//!
//! Built once in `Cli::run()` from the global flags and the process
//! environment, so commands never read `std::env` themselves.

use std::path::PathBuf;

use anyhow::Result;

use crate::infra::config::{ProcessEnv, YamlConfigLoader};
use crate::output::{HumanRenderer, OutputContext};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    /// `--config`, if given.
    pub config: Option<PathBuf>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Process environment captured at startup.
    pub env: ProcessEnv,
    config: Option<PathBuf>,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the process environment cannot be read.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        Ok(Self::with_env(flags, ProcessEnv::from_env()?))
    }

    /// Same as [`AppContext::new`] with an explicit environment.
    #[must_use]
    pub fn with_env(flags: &AppFlags, env: ProcessEnv) -> Self {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet, flags.output.json),
            mode,
            env,
            config: flags.config.clone(),
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Loader for the config file selected by `--config`, `TFPROBE_CONFIG`
    /// or the default name.
    #[must_use]
    pub fn config_loader(&self) -> YamlConfigLoader {
        YamlConfigLoader::locate(self.config.as_deref(), &self.env)
    }

    #[must_use]
    pub fn renderer(&self) -> HumanRenderer<'_> {
        HumanRenderer::new(&self.output)
    }
}
