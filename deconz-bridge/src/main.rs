use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use deconz_bridge::{init_logging, run, Args, BridgeConfig, BridgeError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match setup() {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            eprintln!("deconz-bridge: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "starting deconz-bridge");
    config.log_summary();

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_for_interrupt(shutdown.clone()));

    run(config, shutdown).await.exit_code()
}

/// Parse the command line, install logging and validate the configuration.
fn setup() -> Result<BridgeConfig> {
    let args = Args::parse();

    init_logging(args.log_mode).map_err(BridgeError::from)?;

    BridgeConfig::try_from(args).context("Invalid configuration")
}

async fn watch_for_interrupt(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, shutting down");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "cannot listen for interrupts"),
    }
}
