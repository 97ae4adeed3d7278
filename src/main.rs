use schemascope::config::Config;
use schemascope::probe::ping_all;
use schemascope::registry::AdapterRegistry;
use schemascope::schema::SchemaAggregator;

use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "usage: schemascope [tables|ping]";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment from .env file if present
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env()?;
    let _guard = init_logging(config.log_dir.as_deref());

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    let command = std::env::args().nth(1).unwrap_or_else(|| "tables".to_string());

    info!("Configured {} database(s)", config.databases.len());
    let registry = AdapterRegistry::from_config(&config)?;

    match command.as_str() {
        "tables" => {
            let snapshots = match SchemaAggregator::new().snapshot_all(&registry).await {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    error!("Snapshot failed: {}", e);
                    println!("{}", serde_json::to_string_pretty(&e.to_response())?);
                    return Ok(ExitCode::FAILURE);
                }
            };
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
            Ok(ExitCode::SUCCESS)
        }
        "ping" => {
            let results = ping_all(&registry).await;
            println!("{}", serde_json::to_string_pretty(&results)?);

            let unhealthy = results.iter().filter(|r| !r.is_healthy()).count();
            if unhealthy > 0 {
                warn!("{} of {} database(s) unreachable", unhealthy, results.len());
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
        other => {
            eprintln!("unknown command: {}\n{}", other, USAGE);
            Ok(ExitCode::from(2))
        }
    }
}

/// Console logging on stderr (stdout carries the JSON output), plus a daily
/// JSON log file when a log directory is configured.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let mut guard = None;

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Could not create log directory {}: {}", dir.display(), e);
            return None;
        }
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "schemascope.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        Some(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking),
        )
    });

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,schemascope=debug")),
        )
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
