//! quickserve binary.
//!
//! Parses flags, opens the store, runs the server until Ctrl-C/SIGTERM,
//! then stops it gracefully.

use std::process::ExitCode;

use clap::Parser;

use quickserve::cli::Cli;
use quickserve::http::option;
use quickserve::lifecycle::shutdown_signal;
use quickserve::observability::init_logging;
use quickserve::{store, ServiceConfig, Server};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = cli.debug;

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging(debug);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.debug);

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "quickserve failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        address = %config.address,
        database_type = %config.database_type,
        auto_cert = config.auto_cert.is_some(),
        "quickserve starting"
    );

    let store = store::open(&config.database_type)
        .map_err(|e| format!("open store failed: {e}"))?;

    let server = Server::new(config.address.clone(), option::from_config(&config, store.clone()));
    server.run()?;

    shutdown_signal().await;

    let stopped = server.stop().await;
    store.close();
    stopped?;
    Ok(())
}
