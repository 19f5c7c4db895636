//! Tracing setup for the bedrock binary
//!
//! Log lines go to stdout and, when a log file is configured, are appended
//! to that file as well.
//!
//! Environment variables:
//!   RUST_LOG    # Log filter, overrides LOG_LEVEL when set
//!   LOG_LEVEL   # debug | info | warn | error (default: info)
//!   LOG_FILE    # Log file path (default: logs.txt)

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Severity threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Unknown names fall back to `Info`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    pub level: LogLevel,
    /// Append log output here as well as stdout
    pub log_file: Option<PathBuf>,
}

/// Open (or create) the log file for appending.
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Initialize the global subscriber.
pub fn init(config: &TracingConfig) -> Result<()> {
    match config.log_file {
        Some(ref path) => {
            let file = Arc::new(open_log_file(path)?);
            tracing_subscriber::fmt()
                .with_env_filter(filter(config.level))
                .with_writer(std::io::stdout.and(file))
                .with_ansi(false)
                .compact()
                .try_init()
                .map_err(|err| anyhow!(err))
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter(config.level))
            .compact()
            .try_init()
            .map_err(|err| anyhow!(err)),
    }
}
