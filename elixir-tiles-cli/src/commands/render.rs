//! Render command - render an image tile by tile and write it as PNG.

use std::path::PathBuf;
use std::time::Duration;

use elixir_tiles::film::Film;
use elixir_tiles::logging;
use elixir_tiles::render::{RenderCoordinator, RenderReport, SkyGradient, TileRenderer};
use elixir_tiles::TilePartitioner;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{load_config, resolve_plane, PlaneArgs};
use crate::error::CliError;

/// Arguments for the render command.
pub struct RenderArgs {
    pub config_path: Option<PathBuf>,
    pub plane: PlaneArgs,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
    pub samples: Option<u32>,
    pub output: Option<PathBuf>,
    pub verbose: bool,
}

/// Run the render command.
pub fn run(args: RenderArgs) -> Result<(), CliError> {
    let config = load_config(args.config_path.as_deref())?;

    let mut logging_config = config.logging.clone();
    if args.verbose {
        logging_config = logging_config.with_level("debug");
    }
    let _log_guard = logging::init(&logging_config)?;

    let plane = resolve_plane(&args.plane, &config)?;
    let mut settings = config.render_settings();
    if let Some(workers) = args.workers {
        settings = settings.with_workers(workers);
    }
    if let Some(max_retries) = args.max_retries {
        settings = settings.with_max_retries(max_retries);
    }
    if let Some(samples) = args.samples {
        settings = settings.with_samples_per_pixel(samples);
    }
    let output = args.output.unwrap_or_else(|| config.output_path());

    if let Some(install_path) = &config.elixir.install_path {
        info!(path = %install_path.display(), "Elixir install path configured");
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let partitioner = TilePartitioner::new(plane);
    let film = Film::new(plane);
    let renderer = SkyGradient;

    println!(
        "Rendering {}x{} with {} ({} tiles of {}px, {} spp, {} workers)",
        plane.width(),
        plane.height(),
        renderer.name(),
        plane.tile_count(),
        plane.tile_size(),
        settings.samples_per_pixel,
        settings.workers
    );

    let bar = progress_bar(plane.tile_count() as u64);
    let report = RenderCoordinator::new(settings).run_with_progress(
        &partitioner,
        &renderer,
        &film,
        &cancel,
        |progress| {
            bar.set_position(progress.settled() as u64);
            if progress.failed > 0 {
                bar.set_message(format!("{} failed", progress.failed));
            }
        },
    )?;
    bar.finish_and_clear();

    if report.cancelled {
        println!(
            "Cancelled after {} of {} tiles in {:.2}s; {} not written",
            report.progress.done,
            report.progress.total,
            report.progress.elapsed.as_secs_f64(),
            output.display()
        );
    } else {
        film.save_png(&output, settings.splat_scale())?;
        println!(
            "Rendered {} of {} tiles in {:.2}s ({} passes) -> {}",
            report.progress.done,
            report.progress.total,
            report.progress.elapsed.as_secs_f64(),
            report.passes,
            output.display()
        );
    }

    for (coord, reason) in &report.failures {
        eprintln!("  tile {} failed: {}", coord, reason);
    }

    outcome(&report)
}

/// Map a finished render to the command result.
fn outcome(report: &RenderReport) -> Result<(), CliError> {
    if report.cancelled {
        return Err(CliError::Cancelled {
            done: report.progress.done,
            total: report.progress.total,
        });
    }
    if report.progress.failed > 0 {
        return Err(CliError::Incomplete {
            failed: report.progress.failed,
            total: report.progress.total,
        });
    }
    Ok(())
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tiles {msg} (ETA {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(200));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use elixir_tiles::{ProgressSnapshot, TileCoord};

    fn report(done: usize, failed: usize, pending: usize, cancelled: bool) -> RenderReport {
        RenderReport {
            progress: ProgressSnapshot {
                done,
                failed,
                in_flight: 0,
                pending,
                total: done + failed + pending,
                elapsed: Duration::from_secs(1),
            },
            passes: 1,
            retried: 0,
            cancelled,
            failures: (0..failed)
                .map(|i| (TileCoord::new(i as u32, 0), "diverged".to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_outcome_success() {
        assert!(outcome(&report(12, 0, 0, false)).is_ok());
    }

    #[test]
    fn test_outcome_cancelled_is_error() {
        let err = outcome(&report(5, 0, 59, true)).unwrap_err();
        assert!(matches!(err, CliError::Cancelled { done: 5, total: 64 }));
    }

    #[test]
    fn test_outcome_cancelled_takes_precedence_over_failures() {
        let err = outcome(&report(3, 1, 4, true)).unwrap_err();
        assert!(matches!(err, CliError::Cancelled { done: 3, total: 8 }));
    }

    #[test]
    fn test_outcome_failed_tiles_are_incomplete() {
        let err = outcome(&report(10, 2, 0, false)).unwrap_err();
        assert!(matches!(err, CliError::Incomplete { failed: 2, total: 12 }));
    }
}
