//! Logging setup.
//!
//! Log records go to stderr and, when a log directory is configured, to
//! `elixir.log` in that directory through a non-blocking writer. `RUST_LOG`
//! overrides the configured level.
//!
//! ```ignore
//! let _guard = elixir_tiles::logging::init(&config.logging)?;
//! // keep `_guard` alive until exit so buffered lines are flushed
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "elixir.log";

/// Default level when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `[logging]` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for the log file; stderr only when `None`.
    pub directory: Option<PathBuf>,
    /// Level filter directive (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Override the level, e.g. from a `--verbose` flag.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Path of the log file, if file logging is enabled.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|dir| dir.join(LOG_FILE_NAME))
    }
}

/// Errors from installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global `tracing` subscriber.
///
/// Returns the file writer guard when file logging is enabled; dropping it
/// flushes and closes the log file.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()?;
            Ok(None)
        }
    }
}
