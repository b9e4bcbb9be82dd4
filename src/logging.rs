//! Logging
//!
//! Thin helpers over `tracing` plus subscriber setup for the binary. Logs go
//! to stderr so that reports on stdout stay machine-readable.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when neither a level nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "info,process_warden=debug";

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!("{}", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    tracing::info!("{}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}

/// Explicit directive first, then `RUST_LOG`, then [`DEFAULT_FILTER`].
fn build_filter(log_level: Option<&str>) -> Result<EnvFilter> {
    match log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter '{}'", level)),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// Install the global subscriber.
///
/// `log_level` takes a filter directive (`debug`, `process_warden=trace`, ...).
/// With `log_file`, plain-text logs are appended there as well.
///
/// ```no_run
/// use process_warden::logging::init_logger;
///
/// init_logger(Some("debug"), None).unwrap();
/// ```
pub fn init_logger(log_level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();

    let file_layer = match log_file {
        Some(path) => Some(
            fmt::layer()
                .with_writer(Arc::new(open_log_file(path)?))
                .with_ansi(false),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(log_level)?)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("a global logger is already installed")?;

    tracing::debug!(file = ?log_file, "logger initialized");
    Ok(())
}
