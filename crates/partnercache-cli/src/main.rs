//! partnercache - command-line front end for the partner dashboard data layer.
//!
//! Lists cached partner resources, shows the partner profile, and runs the
//! consultation and webinar booking flows against the hosted backend.

mod args;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::Cli;
use commands::Context;
use partnercache_core::Config;

/// Directory for daily rolling log files; stderr only when unset
const LOG_DIR_ENV: &str = "PARTNERCACHE_LOG_DIR";

const LOG_FILE_PREFIX: &str = "partnercache.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file appender and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let cli = Cli::parse();
    let command = cli.command.name();

    info!(command, "partnercache starting");

    let config = Config::load()?;
    let ctx = Context::new(config)?;
    let result = commands::run(&ctx, cli.command).await;

    if let Err(e) = &result {
        tracing::error!(command, error = %e, "Command failed");
    }
    result
}
