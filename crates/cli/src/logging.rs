//! Tracing subscriber setup and console banners

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// File name prefix of rolling log files
const LOG_FILE_PREFIX: &str = "tether.log";

/// Install the global subscriber
///
/// Console output always; a daily-rolling file as well when `log_dir` is set.
/// The returned guard flushes the file writer and must be held until exit.
pub fn init(debug: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };

    let console = tracing_subscriber::fmt::layer()
        .with_target(debug)
        .without_time();

    let (file, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(level)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

/// Startup line shown once the server is listening
pub fn print_banner(name: &str, port: u16) {
    println!("\nSyncing {} on port {}\n", name.green(), port.yellow());
}

/// Line shown after a one-shot sourcemap write
pub fn print_sourcemap_written(path: &Path) {
    println!("{} {}", "Wrote".green().bold(), path.display().cyan());
}
