//! tfprobe - verify Terraform templates against the live cloud

use std::process::ExitCode;

use clap::Parser;
use tfprobe_cli::cli::Cli;
use tfprobe_cli::domain::error::{ConfigError, StagingError};
use tfprobe_cli::output::json::format_error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, !cli.no_color && console::colors_enabled_stderr());

    let json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match format_error(&message, error_code(&e)) {
                Ok(doc) if json => println!("{doc}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// `-v` flags win over `RUST_LOG`; with neither, only warnings are logged.
/// Escape codes only reach a color-capable stderr.
fn init_tracing(verbose: u8, ansi: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .init();
}

fn error_code(e: &anyhow::Error) -> &'static str {
    if e.downcast_ref::<ConfigError>().is_some() {
        "CONFIG"
    } else if e.downcast_ref::<StagingError>().is_some() {
        "STAGING"
    } else {
        "ERROR"
    }
}
