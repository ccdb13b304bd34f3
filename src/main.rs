//! schemadb - Main entry point.
//!
//! Runs one command against a table described by a JSON definition file.

use clap::Parser;
use schemadb::commands;
use schemadb::config::Config;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging. Logs go to stderr so that
/// command output on stdout stays clean.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration from command line and environment
    let config = Config::parse();

    init_tracing(&config);

    info!(
        definition = %config.definition.display(),
        "Starting schemadb v{}",
        env!("CARGO_PKG_VERSION")
    );

    let resource = match commands::open(&config).await {
        Ok(resource) => resource,
        Err(e) => {
            error!(error = %e, "Failed to open table");
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
            return ExitCode::FAILURE;
        }
    };

    let result = commands::execute(&resource, &config.command).await;
    resource.table().database().close().await;

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
