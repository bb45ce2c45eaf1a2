//! Common types and utilities shared across CLI commands.

use std::path::Path;

use clap::Args;
use elixir_tiles::config::ConfigFile;
use elixir_tiles::ImagePlane;

use crate::error::CliError;

/// Image plane overrides accepted by several commands.
#[derive(Debug, Clone, Default, Args)]
pub struct PlaneArgs {
    /// Horizontal resolution in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Vertical resolution in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Resolution scale in percent
    #[arg(long)]
    pub percentage: Option<u32>,

    /// Tile edge in pixels
    #[arg(long)]
    pub tile_size: Option<u32>,
}

/// Load the configuration from `path`, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Resolve the image plane from CLI args and config.
pub fn resolve_plane(args: &PlaneArgs, config: &ConfigFile) -> Result<ImagePlane, CliError> {
    // CLI takes precedence, then config
    let plane = ImagePlane::from_resolution(
        args.width.unwrap_or(config.render.resolution_x),
        args.height.unwrap_or(config.render.resolution_y),
        args.percentage.unwrap_or(config.render.resolution_percentage),
        args.tile_size.unwrap_or(config.render.tile_size),
    )?;
    Ok(plane)
}
