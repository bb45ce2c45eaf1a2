//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path`
//! for viewing and modifying settings from the command line.

use std::path::PathBuf;

use clap::Subcommand;
use elixir_tiles::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., render.tile_size)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., render.tile_size)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against `path` (or the default file).
pub fn run(command: ConfigCommands, path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Get { key } => {
            println!("{}", run_get(&key, &path)?);
            Ok(())
        }
        ConfigCommands::Set { key, value } => run_set(&key, &value, &path),
        ConfigCommands::List => {
            print!("{}", run_list(&path)?);
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'elixir-tiles config list' to see available keys.",
            key
        ))
    })
}

/// Get a configuration value.
fn run_get(key: &str, path: &std::path::Path) -> Result<String, CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load_from(path)?;
    let value = config_key.get(&config);

    if value.is_empty() {
        Ok("(not set)".to_string())
    } else {
        Ok(value)
    }
}

/// Set a configuration value.
fn run_set(key: &str, value: &str, path: &std::path::Path) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = ConfigFile::load_from(path)?;
    config_key
        .set(&mut config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    config.save_to(path)?;

    println!("Set {} = {}", config_key.name(), value);
    Ok(())
}

/// List all configuration settings, grouped by section.
fn run_list(path: &std::path::Path) -> Result<String, CliError> {
    let config = ConfigFile::load_from(path)?;

    let mut out = String::from("Configuration Settings\n======================\n\n");
    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        // Print section header when section changes
        if section != current_section {
            if !current_section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section));
            current_section = section;
        }

        let value = key.get(&config);
        if value.is_empty() {
            out.push_str(&format!("  {} = (not set)\n", key.key_name()));
        } else {
            out.push_str(&format!("  {} = {}\n", key.key_name(), value));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");

        run_set("render.tile_size", "32", &path).unwrap();
        assert_eq!(run_get("render.tile_size", &path).unwrap(), "32");
        assert_eq!(run_get("elixir.install_path", &path).unwrap(), "(not set)");
    }

    #[test]
    fn test_set_rejects_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        let err = run_set("render.tile_size", "zero", &path).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_get("render.nope", &dir.path().join("c.ini")).unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key 'render.nope'"));
    }

    #[test]
    fn test_list_groups_sections() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_list(&dir.path().join("config.ini")).unwrap();
        let elixir = out.find("[elixir]").unwrap();
        let render = out.find("[render]").unwrap();
        let logging = out.find("[logging]").unwrap();
        assert!(elixir < render && render < logging);
        assert!(out.contains("  tile_size = 64"));
        assert!(out.contains("  install_path = (not set)"));
    }
}
