//! CLI error type.

use std::fmt;

use elixir_tiles::config::ConfigError;
use elixir_tiles::film::FilmError;
use elixir_tiles::logging::LoggingError;
use elixir_tiles::render::RenderError;
use elixir_tiles::PartitionError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line or configuration input.
    Config(String),

    /// Loading or saving the configuration file failed.
    ConfigFile(ConfigError),

    /// The requested image plane is invalid.
    Plane(PartitionError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The render job failed to run.
    Render(RenderError),

    /// The output image could not be written.
    Output(FilmError),

    /// Some tiles were still failed after all retries.
    Incomplete { failed: usize, total: usize },

    /// The render was interrupted before every tile settled.
    Cancelled { done: usize, total: usize },

    /// Serializing command output failed.
    Serialize(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration file error: {}", e),
            CliError::Plane(e) => write!(f, "Invalid image plane: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Render(e) => write!(f, "Render failed: {}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
            CliError::Incomplete { failed, total } => {
                write!(f, "Render incomplete: {} of {} tiles failed", failed, total)
            }
            CliError::Cancelled { done, total } => {
                write!(f, "Render cancelled: {} of {} tiles done", done, total)
            }
            CliError::Serialize(msg) => write!(f, "Failed to serialize output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Plane(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Render(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::Config(_)
            | CliError::Incomplete { .. }
            | CliError::Cancelled { .. }
            | CliError::Serialize(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Plane(p) => CliError::Plane(p),
            other => CliError::ConfigFile(other),
        }
    }
}

impl From<PartitionError> for CliError {
    fn from(e: PartitionError) -> Self {
        CliError::Plane(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<RenderError> for CliError {
    fn from(e: RenderError) -> Self {
        CliError::Render(e)
    }
}

impl From<FilmError> for CliError {
    fn from(e: FilmError) -> Self {
        CliError::Output(e)
    }
}
