//! `tfprobe run`: the full verification lifecycle.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::application::services::harness::{ScopeOptions, VerificationHarness};
use crate::application::services::verify::run_verification;
use crate::commands::validate;
use crate::domain::error::ConfigError;
use crate::infra::arm::ArmSqlInspector;
use crate::infra::credentials::{Credential, CredentialEnv};
use crate::infra::stager::FsTemplateStager;
use crate::infra::terraform::TerraformCli;
use crate::output::{TerminalReporter, json};

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Give up on provisioning and verification after SECS seconds.
    /// Teardown always runs to completion.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip the plan that checks a second apply would be a no-op
    #[arg(long)]
    pub skip_idempotency_check: bool,
}

/// Run the command. Exits 0 only when every check passed and teardown succeeded.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, fails the same checks as
/// `tfprobe validate` (subscription included), or if the adapters cannot be
/// built. Nothing is provisioned in those cases.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<ExitCode> {
    let loader = app.config_loader();
    let config = loader.load()?;
    let problems = validate::check(&config, &app.env.ambient());
    if !problems.is_empty() {
        return Err(ConfigError::Invalid(problems.join("\n")).into());
    }
    info!(config = %loader.path().display(), template = %config.template_dir.display(), "config loaded");

    let tool = TerraformCli::default_runner(app.env.terraform_binary(), config.retry.to_policy()?);
    let credential = Credential::from_env(&CredentialEnv::from_env()?)?;
    info!(credential = credential.kind(), "credential selected");
    let inspector = ArmSqlInspector::new(app.env.arm_endpoint(), credential)?;
    let stager = FsTemplateStager;

    let options = ScopeOptions {
        verify_timeout: args.timeout.map(Duration::from_secs),
        check_idempotent: config.check_idempotent && !args.skip_idempotency_check,
    };

    let summary = {
        let reporter = TerminalReporter::new(&app.output);
        let harness = VerificationHarness::new(&stager, &tool, &inspector, &reporter, app.env.ambient());
        run_verification(&harness, &config, options, interrupted()).await
    };

    if app.is_json() {
        println!("{}", json::format_summary(&summary)?);
    } else {
        app.renderer().render_summary(&summary, &config.report);
    }

    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Resolves on the first Ctrl-C. Never resolves if the handler cannot be
/// installed. Once installed, further Ctrl-C presses no longer kill the
/// process, so teardown is not interrupted.
async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => warn!("interrupt received; cancelling verification, teardown will still run"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
