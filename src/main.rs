//! # envzip
//!
//! Binary entry point: runtime configuration, logging, metrics registration
//! and subcommand dispatch. Any error is printed and exits with status 1.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error};

use envzip::config::RuntimeConfig;
use envzip::observability::{init_logging, register_metrics};

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    let runtime = RuntimeConfig::from_env();
    init_logging(&runtime);

    debug!(
        "envzip {} (build {} at {}, git {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    if let Err(e) = register_metrics() {
        error!("Failed to register metrics: {}", e);
    }

    let cli = cli::Cli::parse();
    match cli::run(cli, runtime).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}
