//! `tfprobe validate`: check a config without provisioning.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::domain::config::{HarnessConfig, validate_config};
use crate::domain::coordinates::{AmbientEnv, resolve_subscription};
use crate::domain::error::ConfigError;
use crate::infra::terraform::TerraformCli;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Also check that the terraform binary runs
    #[arg(long)]
    pub check_tools: bool,
}

/// Run the command.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` listing every problem found.
pub async fn run(app: &AppContext, args: &ValidateArgs) -> Result<ExitCode> {
    let loader = app.config_loader();
    let config = loader.load()?;

    let problems = check(&config, &app.env.ambient());
    if !problems.is_empty() {
        return Err(ConfigError::Invalid(problems.join("\n")).into());
    }

    let terraform = if args.check_tools {
        let tool = TerraformCli::default_runner(app.env.terraform_binary(), Default::default());
        Some(tool.version().await?)
    } else {
        None
    };

    let path = loader.path().display().to_string();
    if app.is_json() {
        println!(
            "{}",
            serde_json::json!({ "valid": true, "config": path, "terraform": terraform })
        );
    } else {
        app.renderer().render_validated(&path, terraform.as_deref());
    }
    Ok(ExitCode::SUCCESS)
}

/// Every problem with `config` that can be found without provisioning.
#[must_use]
pub fn check(config: &HarnessConfig, ambient: &AmbientEnv) -> Vec<String> {
    let mut problems = Vec::new();
    match validate_config(config) {
        Ok(()) => {}
        Err(ConfigError::Invalid(list)) => problems.extend(list.lines().map(str::to_string)),
        Err(e) => problems.push(format!("  - {e}")),
    }
    if !config.template_dir.is_dir() {
        problems.push(format!(
            "  - template_dir {} is not a directory",
            config.template_dir.display()
        ));
    }
    for file in &config.var_files {
        if !file.is_file() {
            problems.push(format!("  - var file {} does not exist", file.display()));
        }
    }
    if let Err(e) = resolve_subscription(&config.resource.subscription, ambient) {
        problems.push(format!("  - {e}"));
    }
    problems
}
