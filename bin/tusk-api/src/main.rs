//! tusk API server.
//!
//! Serves `POST /parse`, which compiles the grammar carried by each request, parses the request's source text with
//! the generated recognizers, and returns the resulting parse tree.

#![deny(warnings)]
#![deny(missing_docs)]
use std::path::PathBuf;

use clap::Parser as _;
use tracing::{error, info};
use tusk_app::prelude::*;
use tusk_error::GenericError;

mod api;
use self::api::ParseAPIHandler;

mod config;
use self::config::ApiConfiguration;

/// Command-line arguments.
#[derive(clap::Parser)]
#[command(about = "Compiles grammars and parses source text on request.")]
struct Cli {
    /// Path to a YAML configuration file. Environment variables prefixed with `TUSK_` take precedence over it.
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = initialize_logging(None) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    let config = match ApiConfiguration::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            std::process::exit(1);
        }
    };

    match run(config).await {
        Ok(()) => info!("tusk API stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

async fn run(config: ApiConfiguration) -> Result<(), GenericError> {
    info!(
        listen_address = %config.listen_address,
        session_root = %config.session_root.display(),
        antlr_jar = %config.antlr.antlr_jar.display(),
        "tusk API starting..."
    );

    let cors = config.cors_layer()?;
    let handler = ParseAPIHandler::new(config.build_pipeline());

    APIBuilder::new()
        .with_handler(handler)
        .map_router(|router| router.layer(cors))
        .serve(config.listen_address, shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal. Serving until the process is killed.");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Draining in-flight requests...");
}
