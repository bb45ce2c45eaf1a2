//! Elixir Tiles - tiled render dispatch for the Elixir pathtracer
//!
//! This library splits a render target into square tiles, hands them out to
//! concurrent workers, tracks each tile through its render lifecycle and
//! reassembles the results into a single output image.
//!
//! # Architecture
//!
//! ```text
//! ConfigFile ──► ImagePlane ──► TilePartitioner ◄──claim/report── workers
//!                                     │                              │
//!                                     ▼                              ▼
//!                              ProgressSnapshot                TileRenderer
//!                                                                    │
//!                               RenderCoordinator ── pixels ──►    Film ──► PNG
//! ```
//!
//! # Example
//!
//! ```
//! use elixir_tiles::film::Film;
//! use elixir_tiles::partitioner::TilePartitioner;
//! use elixir_tiles::plane::ImagePlane;
//! use elixir_tiles::render::{RenderCoordinator, RenderSettings, SkyGradient};
//! use tokio_util::sync::CancellationToken;
//!
//! let plane = ImagePlane::new(160, 90, 32).unwrap();
//! let partitioner = TilePartitioner::new(plane);
//! let film = Film::new(plane);
//!
//! let coordinator = RenderCoordinator::new(RenderSettings::default().with_workers(2));
//! let report = coordinator
//!     .run(&partitioner, &SkyGradient, &film, &CancellationToken::new())
//!     .unwrap();
//! assert!(report.is_success());
//! ```

pub mod config;
pub mod error;
pub mod film;
pub mod logging;
pub mod partitioner;
pub mod plane;
pub mod progress;
pub mod render;
pub mod tile;

pub use error::PartitionError;
pub use partitioner::TilePartitioner;
pub use plane::ImagePlane;
pub use progress::ProgressSnapshot;
pub use tile::{Tile, TileCoord, TileRect, TileState, WorkerId};
