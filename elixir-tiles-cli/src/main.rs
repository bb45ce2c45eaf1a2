//! Elixir Tiles CLI - command-line interface
//!
//! Renders images tile by tile, inspects tile grids and edits the
//! configuration file.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::common::PlaneArgs;
use commands::config::ConfigCommands;
use commands::render::RenderArgs;
use commands::tiles::TilesArgs;

/// Tiled render dispatch for the Elixir pathtracer.
#[derive(Debug, Parser)]
#[command(name = "elixir-tiles", version, about)]
struct Cli {
    /// Path to the configuration file (default: ~/.elixir/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render an image tile by tile and write it as PNG
    Render {
        #[command(flatten)]
        plane: PlaneArgs,

        /// Number of render workers (0 = one per CPU)
        #[arg(long)]
        workers: Option<usize>,

        /// Retry passes for failed tiles
        #[arg(long)]
        max_retries: Option<u32>,

        /// Samples per pixel, averaged into the output
        #[arg(long)]
        samples: Option<u32>,

        /// Output PNG path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log at debug level
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show how an image plane is split into tiles
    Tiles {
        #[command(flatten)]
        plane: PlaneArgs,

        /// Print the grid as JSON
        #[arg(long)]
        json: bool,
    },

    /// View or modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command {
        Commands::Render {
            plane,
            workers,
            max_retries,
            samples,
            output,
            verbose,
        } => commands::render::run(RenderArgs {
            config_path,
            plane,
            workers,
            max_retries,
            samples,
            output,
            verbose,
        }),
        Commands::Tiles { plane, json } => commands::tiles::run(TilesArgs {
            config_path,
            plane,
            json,
        }),
        Commands::Config { command } => commands::config::run(command, config_path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
