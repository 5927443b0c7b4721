//! DB Router - Main entry point.
//!
//! Loads a connection mapping, activates a connection (the `--connection`
//! flag or the configured autoload), runs one statement through the router
//! and prints the result as JSON.

use clap::Parser;
use db_router::config::{CliStatement, Config};
use db_router::db::{ConnectionRegistry, ConnectionRouter, SqlxConnector};
use db_router::error::RouterError;
use serde_json::json;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the JSON result.
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

async fn run(config: &Config) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let registry_config = config.load_registry_config()?;

    let connector = match config.connect_timeout_duration() {
        Some(timeout) => SqlxConnector::with_connect_timeout(timeout),
        None => SqlxConnector::new(),
    };
    let registry = Arc::new(ConnectionRegistry::from_config(connector, &registry_config).await);
    info!(
        connections = registry.len().await,
        autoload = ?registry_config.autoload,
        "Loaded connection mapping"
    );

    let router = match &config.connection {
        Some(name) => {
            let mut router = ConnectionRouter::new(registry);
            router.activate(name).await?;
            router
        }
        None => ConnectionRouter::with_autoload(registry, registry_config.autoload.as_deref()).await,
    };

    let params = config.query_params();
    let output = match config.statement() {
        Some(CliStatement::Select(sql)) => {
            let rows = router.select(&sql, &params).await?;
            let count = rows.len();
            json!({ "rows": rows, "count": count })
        }
        Some(CliStatement::Execute(sql)) => {
            let last_insert_id = router.execute(&sql, &params).await?;
            json!({ "last_insert_id": last_insert_id })
        }
        None => return Err("either --select or --execute is required".into()),
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(&config);

    info!("Starting DB Router v{}", env!("CARGO_PKG_VERSION"));

    match run(&config).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Failed to render output");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            match e.downcast_ref::<RouterError>() {
                Some(router_err) => {
                    error!(
                        code = router_err.code().as_i32(),
                        error = %router_err,
                        suggestion = router_err.suggestion(),
                        "Statement failed"
                    );
                    let body = json!({
                        "error": router_err.to_string(),
                        "code": router_err.code().as_i32(),
                        "suggestion": router_err.suggestion(),
                    });
                    eprintln!("{body}");
                }
                None => error!(error = %e, "Failed to run"),
            }
            ExitCode::FAILURE
        }
    }
}
