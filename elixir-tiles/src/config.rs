//! INI configuration file.
//!
//! Settings live in `~/.elixir/config.ini`:
//!
//! ```ini
//! [elixir]
//! install_path = /opt/elixir/bin
//!
//! [render]
//! resolution_x = 1920
//! resolution_y = 1080
//! resolution_percentage = 100
//! tile_size = 64
//! workers = 0
//! max_retries = 2
//! samples_per_pixel = 1
//! output = render.png
//! stamp_output = false
//!
//! [logging]
//! directory = ~/.elixir/logs
//! level = info
//! ```
//!
//! Every setting is addressed by a [`ConfigKey`] (`section.key`). Loading goes
//! through the same [`ConfigKey::set`] validation as the CLI `config set`
//! command, so a hand-edited file cannot smuggle in values the CLI would
//! reject.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::error::PartitionError;
use crate::logging::LoggingConfig;
use crate::plane::{ImagePlane, DEFAULT_TILE_SIZE};
use crate::render::{RenderSettings, DEFAULT_MAX_RETRIES, DEFAULT_SAMPLES_PER_PIXEL};

/// Name of the directory under the home directory holding Elixir state.
pub const CONFIG_DIR_NAME: &str = ".elixir";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default output file.
pub const DEFAULT_OUTPUT: &str = "render.png";

/// Default render resolution (width).
pub const DEFAULT_RESOLUTION_X: u32 = 1920;

/// Default render resolution (height).
pub const DEFAULT_RESOLUTION_Y: u32 = 1080;

/// Errors from loading, saving or editing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid INI.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A value failed validation.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key is not a known `section.key` name.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    /// The configured render dimensions do not form a valid image plane.
    #[error(transparent)]
    Plane(#[from] PartitionError),
}

/// `[elixir]` section: where the external pathtracer lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElixirSection {
    /// Directory containing the Elixir binary.
    pub install_path: Option<PathBuf>,
}

/// `[render]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSection {
    pub resolution_x: u32,
    pub resolution_y: u32,
    /// Scale applied to the resolution, in percent.
    pub resolution_percentage: u32,
    pub tile_size: u32,
    /// Worker count; 0 means one per logical CPU.
    pub workers: usize,
    pub max_retries: u32,
    /// Samples accumulated per pixel; the film is averaged on export.
    pub samples_per_pixel: u32,
    pub output: PathBuf,
    /// Append a millisecond timestamp to the output file name.
    pub stamp_output: bool,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            resolution_x: DEFAULT_RESOLUTION_X,
            resolution_y: DEFAULT_RESOLUTION_Y,
            resolution_percentage: 100,
            tile_size: DEFAULT_TILE_SIZE,
            workers: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            samples_per_pixel: DEFAULT_SAMPLES_PER_PIXEL,
            output: PathBuf::from(DEFAULT_OUTPUT),
            stamp_output: false,
        }
    }
}

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub elixir: ElixirSection,
    pub render: RenderSection,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load from the default location, or defaults if the file is missing.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(io) => ConfigError::Io(io),
            other => ConfigError::Parse {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|props| props.get(key.key_name()));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini.write_to_file(path)?;
        Ok(())
    }

    /// Image plane for the configured resolution, percentage and tile size.
    pub fn image_plane(&self) -> Result<ImagePlane, ConfigError> {
        Ok(ImagePlane::from_resolution(
            self.render.resolution_x,
            self.render.resolution_y,
            self.render.resolution_percentage,
            self.render.tile_size,
        )?)
    }

    /// Worker pool settings.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings::default()
            .with_workers(self.render.workers)
            .with_max_retries(self.render.max_retries)
            .with_samples_per_pixel(self.render.samples_per_pixel)
    }

    /// Output path, stamped if `stamp_output` is set.
    pub fn output_path(&self) -> PathBuf {
        if self.render.stamp_output {
            crate::film::stamped_path(&self.render.output)
        } else {
            self.render.output.clone()
        }
    }
}

/// Default configuration file path, `~/.elixir/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME))
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

/// A `section.key` configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    ElixirInstallPath,
    RenderResolutionX,
    RenderResolutionY,
    RenderResolutionPercentage,
    RenderTileSize,
    RenderWorkers,
    RenderMaxRetries,
    RenderSamplesPerPixel,
    RenderOutput,
    RenderStampOutput,
    LoggingDirectory,
    LoggingLevel,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::ElixirInstallPath,
    ConfigKey::RenderResolutionX,
    ConfigKey::RenderResolutionY,
    ConfigKey::RenderResolutionPercentage,
    ConfigKey::RenderTileSize,
    ConfigKey::RenderWorkers,
    ConfigKey::RenderMaxRetries,
    ConfigKey::RenderSamplesPerPixel,
    ConfigKey::RenderOutput,
    ConfigKey::RenderStampOutput,
    ConfigKey::LoggingDirectory,
    ConfigKey::LoggingLevel,
];

/// Accepted logging levels.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl ConfigKey {
    /// Every key, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    /// Section name.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::ElixirInstallPath => "elixir",
            ConfigKey::LoggingDirectory | ConfigKey::LoggingLevel => "logging",
            _ => "render",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::ElixirInstallPath => "install_path",
            ConfigKey::RenderResolutionX => "resolution_x",
            ConfigKey::RenderResolutionY => "resolution_y",
            ConfigKey::RenderResolutionPercentage => "resolution_percentage",
            ConfigKey::RenderTileSize => "tile_size",
            ConfigKey::RenderWorkers => "workers",
            ConfigKey::RenderMaxRetries => "max_retries",
            ConfigKey::RenderSamplesPerPixel => "samples_per_pixel",
            ConfigKey::RenderOutput => "output",
            ConfigKey::RenderStampOutput => "stamp_output",
            ConfigKey::LoggingDirectory => "directory",
            ConfigKey::LoggingLevel => "level",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        match self {
            ConfigKey::ElixirInstallPath => path(&config.elixir.install_path),
            ConfigKey::RenderResolutionX => config.render.resolution_x.to_string(),
            ConfigKey::RenderResolutionY => config.render.resolution_y.to_string(),
            ConfigKey::RenderResolutionPercentage => {
                config.render.resolution_percentage.to_string()
            }
            ConfigKey::RenderTileSize => config.render.tile_size.to_string(),
            ConfigKey::RenderWorkers => config.render.workers.to_string(),
            ConfigKey::RenderMaxRetries => config.render.max_retries.to_string(),
            ConfigKey::RenderSamplesPerPixel => config.render.samples_per_pixel.to_string(),
            ConfigKey::RenderOutput => config.render.output.display().to_string(),
            ConfigKey::RenderStampOutput => config.render.stamp_output.to_string(),
            ConfigKey::LoggingDirectory => path(&config.logging.directory),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
        }
    }

    /// Validate `value` and store it in `config`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match self {
            ConfigKey::ElixirInstallPath => {
                config.elixir.install_path = optional_path(value);
            }
            ConfigKey::RenderResolutionX => {
                config.render.resolution_x = self.parse_positive(value)?;
            }
            ConfigKey::RenderResolutionY => {
                config.render.resolution_y = self.parse_positive(value)?;
            }
            ConfigKey::RenderResolutionPercentage => {
                config.render.resolution_percentage = self.parse_positive(value)?;
            }
            ConfigKey::RenderTileSize => {
                config.render.tile_size = self.parse_positive(value)?;
            }
            ConfigKey::RenderWorkers => {
                config.render.workers = self.parse(value)?;
            }
            ConfigKey::RenderMaxRetries => {
                config.render.max_retries = self.parse(value)?;
            }
            ConfigKey::RenderSamplesPerPixel => {
                config.render.samples_per_pixel = self.parse_positive(value)?;
            }
            ConfigKey::RenderOutput => {
                if value.is_empty() {
                    return Err(self.invalid(value, "output path must not be empty"));
                }
                config.render.output = expand_tilde(value);
            }
            ConfigKey::RenderStampOutput => {
                config.render.stamp_output = match value.to_lowercase().as_str() {
                    "true" | "yes" | "1" | "on" => true,
                    "false" | "no" | "0" | "off" => false,
                    _ => return Err(self.invalid(value, "expected true or false")),
                };
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = optional_path(value);
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(
                        value,
                        &format!("expected one of {}", LOG_LEVELS.join(", ")),
                    ));
                }
                config.logging.level = level;
            }
        }
        Ok(())
    }

    fn parse<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }

    fn parse_positive(&self, value: &str) -> Result<u32, ConfigError> {
        match value.parse::<u32>() {
            Ok(v) if v > 0 => Ok(v),
            _ => Err(self.invalid(value, "expected a positive integer")),
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(expand_tilde(value))
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}
