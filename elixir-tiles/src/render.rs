//! Progressive tile render coordination.
//!
//! The [`RenderCoordinator`] drives a pool of workers over a
//! [`TilePartitioner`]: each worker claims a tile, asks a [`TileRenderer`] for
//! its pixels, copies them into the shared [`Film`] and reports the outcome.
//!
//! # Passes and retries
//!
//! ```text
//! pass 1: workers drain every pending tile ──► some tiles failed?
//!           │ no                                   │ yes, budget left
//!           ▼                                      ▼
//!         report                        retry_failed() ──► pass 2 ...
//! ```
//!
//! The retry budget (`max_retries`) is owned here, not by the partitioner.
//! Each claimed tile is rendered `samples_per_pixel` times; the samples are
//! summed and splatted into the film in one [`Film::add_tile`] call, so a
//! tile that fails part way leaves the film untouched.
//! Cancelling the token stops workers from claiming new tiles; tiles already
//! claimed are finished and reported before the pass ends.

use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, warn};

use crate::error::PartitionError;
use crate::film::{Film, FilmError, Rgb};
use crate::partitioner::TilePartitioner;
use crate::plane::ImagePlane;
use crate::progress::ProgressSnapshot;
use crate::tile::{Tile, TileCoord, WorkerId};

/// Default number of retry passes for failed tiles.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default number of samples rendered per pixel.
pub const DEFAULT_SAMPLES_PER_PIXEL: u32 = 1;

/// Errors from tile rendering and coordination.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer could not produce pixels for a tile.
    #[error("renderer failed on tile {coord}: {message}")]
    Renderer { coord: TileCoord, message: String },

    /// Rendered pixels could not be stored in the film.
    #[error(transparent)]
    Film(#[from] FilmError),

    /// The tile grid rejected a report from the coordinator itself.
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// Film and partitioner describe different image planes.
    #[error("film plane {film:?} does not match partitioner plane {partitioner:?}")]
    PlaneMismatch {
        film: ImagePlane,
        partitioner: ImagePlane,
    },

    /// The worker thread pool could not be created.
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

impl RenderError {
    /// Shorthand for a renderer failure on `coord`.
    pub fn renderer(coord: TileCoord, message: impl Into<String>) -> Self {
        RenderError::Renderer {
            coord,
            message: message.into(),
        }
    }
}

/// Produces pixels for one tile.
///
/// Implementations must be thread-safe; one renderer instance is shared by
/// every worker of a job.
pub trait TileRenderer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render `tile` of `plane`.
    ///
    /// Returns `tile.rect().area()` pixels in row-major order.
    fn render(&self, plane: &ImagePlane, tile: &Tile) -> Result<Vec<Rgb>, RenderError>;
}

/// Vertical white to sky-blue gradient, the pathtracer's background.
///
/// Needs no scene, which makes it useful for smoke renders and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkyGradient;

/// Zenith colour of [`SkyGradient`].
pub const SKY_BLUE: Rgb = [0.5, 0.7, 1.0];

impl SkyGradient {
    /// Radiance for pixel row `y` of a plane `height` pixels tall.
    pub fn shade_row(y: u32, height: u32) -> Rgb {
        // Vertical direction through the pixel centre, +1 at the top edge
        let dir_y = 1.0 - 2.0 * (y as f32 + 0.5) / height as f32;
        let t = 0.5 * (dir_y + 1.0);
        let mut out = [0.0; 3];
        for (c, sky) in out.iter_mut().zip(SKY_BLUE) {
            *c = (1.0 - t) + t * sky;
        }
        out
    }
}

impl TileRenderer for SkyGradient {
    fn name(&self) -> &str {
        "sky-gradient"
    }

    fn render(&self, plane: &ImagePlane, tile: &Tile) -> Result<Vec<Rgb>, RenderError> {
        let rect = tile.rect();
        let mut pixels = Vec::with_capacity(rect.area() as usize);
        for y in rect.y0..rect.y1 {
            let row = Self::shade_row(y, plane.height());
            pixels.extend(std::iter::repeat(row).take(rect.width() as usize));
        }
        Ok(pixels)
    }
}

/// Worker pool and retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Number of concurrent workers (at least 1).
    pub workers: usize,
    /// Maximum number of extra passes over failed tiles.
    pub max_retries: u32,
    /// Samples accumulated per pixel (at least 1).
    pub samples_per_pixel: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            workers: available_workers(),
            max_retries: DEFAULT_MAX_RETRIES,
            samples_per_pixel: DEFAULT_SAMPLES_PER_PIXEL,
        }
    }
}

impl RenderSettings {
    /// Set the worker count; zero selects one worker per logical CPU.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            available_workers()
        } else {
            workers
        };
        self
    }

    /// Set the number of samples per pixel; zero is treated as one.
    pub fn with_samples_per_pixel(mut self, samples: u32) -> Self {
        self.samples_per_pixel = samples.max(1);
        self
    }

    /// Film export scale that averages the accumulated samples.
    pub fn splat_scale(&self) -> f32 {
        1.0 / self.samples_per_pixel.max(1) as f32
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Outcome of a render job.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    /// Final tile counts.
    pub progress: ProgressSnapshot,
    /// Number of passes run (1 plus the retries used).
    pub passes: u32,
    /// Total tiles reset for retry across all passes.
    pub retried: usize,
    /// Whether the job stopped because of cancellation.
    pub cancelled: bool,
    /// Tiles still failed at the end, with their last failure reason.
    pub failures: Vec<(TileCoord, String)>,
}

impl RenderReport {
    /// True when every tile is done and the job was not cancelled.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.progress.done == self.progress.total
    }
}

/// Runs workers over a partitioner until the grid settles.
#[derive(Debug, Clone)]
pub struct RenderCoordinator {
    settings: RenderSettings,
}

impl RenderCoordinator {
    /// Create a coordinator with the given settings.
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings: RenderSettings {
                workers: settings.workers.max(1),
                max_retries: settings.max_retries,
                samples_per_pixel: settings.samples_per_pixel.max(1),
            },
        }
    }

    /// The effective settings.
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Render every tile of `partitioner` into `film`.
    pub fn run<R>(
        &self,
        partitioner: &TilePartitioner,
        renderer: &R,
        film: &Film,
        cancel: &CancellationToken,
    ) -> Result<RenderReport, RenderError>
    where
        R: TileRenderer + ?Sized,
    {
        self.run_with_progress(partitioner, renderer, film, cancel, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_progress` after every settled tile.
    pub fn run_with_progress<R, F>(
        &self,
        partitioner: &TilePartitioner,
        renderer: &R,
        film: &Film,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<RenderReport, RenderError>
    where
        R: TileRenderer + ?Sized,
        F: Fn(ProgressSnapshot) + Sync,
    {
        if partitioner.plane() != film.plane() {
            return Err(RenderError::PlaneMismatch {
                film: *film.plane(),
                partitioner: *partitioner.plane(),
            });
        }

        let workers = self.settings.workers;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("elixir-worker-{}", i))
            .build()
            .map_err(|e| RenderError::Pool(e.to_string()))?;

        info!(
            renderer = renderer.name(),
            workers,
            tiles = partitioner.tile_count(),
            max_retries = self.settings.max_retries,
            samples_per_pixel = self.settings.samples_per_pixel,
            "Render started"
        );

        let mut passes = 0u32;
        let mut retried = 0usize;
        loop {
            passes += 1;
            self.run_pass(&pool, partitioner, renderer, film, cancel, &on_progress)?;

            if cancel.is_cancelled() {
                break;
            }
            let failed = partitioner.progress().failed;
            if failed == 0 {
                break;
            }
            if passes > self.settings.max_retries {
                warn!(failed, passes, "Retry budget exhausted");
                break;
            }
            let reset = partitioner.retry_failed();
            retried += reset;
            info!(pass = passes + 1, tiles = reset, "Retrying failed tiles");
        }

        let report = RenderReport {
            progress: partitioner.progress(),
            passes,
            retried,
            cancelled: cancel.is_cancelled(),
            failures: partitioner.failures(),
        };

        info!(
            done = report.progress.done,
            failed = report.progress.failed,
            passes = report.passes,
            cancelled = report.cancelled,
            elapsed_ms = report.progress.elapsed.as_millis() as u64,
            "Render finished"
        );
        Ok(report)
    }

    fn run_pass<R, F>(
        &self,
        pool: &rayon::ThreadPool,
        partitioner: &TilePartitioner,
        renderer: &R,
        film: &Film,
        cancel: &CancellationToken,
        on_progress: &F,
    ) -> Result<(), RenderError>
    where
        R: TileRenderer + ?Sized,
        F: Fn(ProgressSnapshot) + Sync,
    {
        let first_error: Mutex<Option<RenderError>> = Mutex::new(None);

        pool.scope(|scope| {
            for id in 0..self.settings.workers {
                let first_error = &first_error;
                scope.spawn(move |_| {
                    let worker = WorkerId::new(id as u32);
                    let samples = self.settings.samples_per_pixel;
                    if let Err(e) =
                        work(worker, samples, partitioner, renderer, film, cancel, on_progress)
                    {
                        // Stop the other workers; the grid is in an unexpected state
                        cancel.cancel();
                        first_error.lock().get_or_insert(e);
                    }
                });
            }
        });

        match first_error.into_inner() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// One worker's claim/render/report loop for a single pass.
fn work<R, F>(
    worker: WorkerId,
    samples: u32,
    partitioner: &TilePartitioner,
    renderer: &R,
    film: &Film,
    cancel: &CancellationToken,
    on_progress: &F,
) -> Result<usize, RenderError>
where
    R: TileRenderer + ?Sized,
    F: Fn(ProgressSnapshot) + Sync,
{
    let _span = debug_span!("worker", id = %worker).entered();
    let plane = partitioner.plane();
    let mut rendered = 0;

    while !cancel.is_cancelled() {
        let Some(tile) = partitioner.claim_next(worker) else {
            break;
        };

        let outcome = render_samples(renderer, plane, &tile, samples)
            .and_then(|pixels| film.add_tile(tile.rect(), &pixels).map_err(RenderError::from));

        match outcome {
            Ok(()) => {
                partitioner.report_done(tile.tx(), tile.ty(), worker)?;
                rendered += 1;
            }
            Err(e) => {
                partitioner.report_failed(tile.tx(), tile.ty(), worker, e.to_string())?;
            }
        }
        on_progress(partitioner.progress());
    }

    debug!(rendered, "Worker finished pass");
    Ok(rendered)
}

/// Render `samples` passes over `tile` and return their per-pixel sum.
fn render_samples<R>(
    renderer: &R,
    plane: &ImagePlane,
    tile: &Tile,
    samples: u32,
) -> Result<Vec<Rgb>, RenderError>
where
    R: TileRenderer + ?Sized,
{
    let mut sum = renderer.render(plane, tile)?;
    for _ in 1..samples {
        let pixels = renderer.render(plane, tile)?;
        if pixels.len() != sum.len() {
            return Err(RenderError::renderer(
                tile.coord(),
                format!("sample has {} pixels, expected {}", pixels.len(), sum.len()),
            ));
        }
        for (acc, px) in sum.iter_mut().zip(&pixels) {
            for (a, p) in acc.iter_mut().zip(px) {
                *a += p;
            }
        }
    }
    Ok(sum)
}

fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
