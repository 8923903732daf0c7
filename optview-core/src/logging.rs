//! Tracing subscriber setup shared by both binaries.
//!
//! `RUST_LOG` takes precedence; otherwise `optview=info`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

pub const DEFAULT_FILTER: &str = "optview=info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("init logging: {0}")]
    Init(#[from] TryInitError),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log to stderr (CLI).
pub fn init_stderr() -> Result<(), LoggingError> {
    let format_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(format_layer)
        .try_init()?;
    Ok(())
}

/// Append to a log file (TUI, which owns the terminal).
pub fn init_file(path: &Path) -> Result<(), LoggingError> {
    let log_file_error = |source| LoggingError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(log_file_error)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(log_file_error)?;

    let format_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(Mutex::new(file))
        .compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(format_layer)
        .try_init()?;
    Ok(())
}
