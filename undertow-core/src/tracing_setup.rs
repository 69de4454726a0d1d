//! Subscriber setup for Undertow
//!
//! The console follows [`LoggingConfig::console_level`]. A second layer
//! records every event, including the per-step queue traces of the
//! scheduler, into a log file that each run replaces.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::UndertowError;
use crate::config::LoggingConfig;

/// File name of the per-run trace log inside the logs directory.
pub const LOG_FILE_NAME: &str = "undertow-last-run.log";

/// Builds the console and file layers without installing them.
///
/// Returns the subscriber and the path of the trace log.
///
/// # Errors
///
/// - `UndertowError::Io` - If the logs directory or the log file cannot be created
pub fn build_subscriber(
    config: &LoggingConfig,
) -> Result<(impl Subscriber + Send + Sync + 'static, PathBuf), UndertowError> {
    let log_file_path = log_file_path(&config.logs_dir)?;
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_thread_names(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer);
    Ok((subscriber, log_file_path))
}

/// Installs the subscriber from [`build_subscriber`] as the global default.
///
/// # Errors
///
/// - `UndertowError::Io` - If the log file cannot be created
/// - `UndertowError::Configuration` - If a global subscriber is already installed
pub fn init_tracing(config: &LoggingConfig) -> Result<PathBuf, UndertowError> {
    let (subscriber, log_file_path) = build_subscriber(config)?;
    subscriber
        .try_init()
        .map_err(|e| UndertowError::Configuration {
            reason: format!("tracing already initialized: {e}"),
        })?;

    tracing::info!(
        "Tracing initialized: console={}, trace_file={}",
        config.console_level,
        log_file_path.display()
    );
    Ok(log_file_path)
}

fn log_file_path(logs_dir: &Path) -> std::io::Result<PathBuf> {
    create_dir_all(logs_dir)?;
    Ok(logs_dir.join(LOG_FILE_NAME))
}
