//! Tile partitioner for one render job.
//!
//! [`TilePartitioner`] owns the full tile grid of an [`ImagePlane`] and
//! mediates concurrent access to it. Workers claim tiles in row-major order,
//! render them, and report the outcome; the render loop polls progress and
//! decides when to retry failed tiles.
//!
//! # Concurrency
//!
//! The tile table is the only mutable state. It sits behind a single
//! `parking_lot::Mutex`, so selecting a tile and marking it in flight is one
//! indivisible step, and a report checks ownership and transitions the tile
//! under the same lock. Nothing blocks waiting for work: [`claim_next`]
//! returns `None` as soon as no tile is pending.
//!
//! The plane and derived counts are immutable and read without locking.
//!
//! # Example
//!
//! ```
//! use elixir_tiles::partitioner::TilePartitioner;
//! use elixir_tiles::plane::ImagePlane;
//! use elixir_tiles::tile::WorkerId;
//!
//! let plane = ImagePlane::new(100, 100, 64).unwrap();
//! let partitioner = TilePartitioner::new(plane);
//! let worker = WorkerId::new(0);
//!
//! while let Some(tile) = partitioner.claim_next(worker) {
//!     // render tile.rect() ...
//!     partitioner.report_done(tile.tx(), tile.ty(), worker).unwrap();
//! }
//! assert!(partitioner.is_complete());
//! ```
//!
//! [`claim_next`]: TilePartitioner::claim_next

use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::PartitionError;
use crate::plane::ImagePlane;
use crate::progress::ProgressSnapshot;
use crate::tile::{Tile, TileCoord, TileState, WorkerId};

/// Tile states plus running counters, kept in sync under one lock.
#[derive(Debug)]
struct TileTable {
    tiles: Vec<Tile>,
    done: usize,
    failed: usize,
    in_flight: usize,
    pending: usize,
    /// Lower bound on the index of the first pending tile.
    scan_from: usize,
}

impl TileTable {
    /// Check that `worker` owns the in-flight tile at `index` and take it out
    /// of the in-flight count. The caller applies the terminal state.
    fn leave_in_flight(&mut self, index: usize, worker: WorkerId) -> Result<(), PartitionError> {
        let tile = &self.tiles[index];
        if tile.state() != TileState::InFlight || tile.owner() != Some(worker) {
            return Err(PartitionError::InvalidTransition {
                tx: tile.tx(),
                ty: tile.ty(),
                state: tile.state(),
                worker,
                owner: tile.owner(),
            });
        }
        self.in_flight -= 1;
        Ok(())
    }

    fn reset_to_pending(&mut self, index: usize) {
        self.tiles[index].reset();
        self.pending += 1;
        self.scan_from = self.scan_from.min(index);
    }
}

/// Shared tile grid for one render job.
///
/// Cheap operations only: every method takes the table lock for a bounded
/// scan or a single transition and never waits for other workers. Share it
/// across threads with `Arc<TilePartitioner>` or by reference inside a scope.
#[derive(Debug)]
pub struct TilePartitioner {
    plane: ImagePlane,
    started: Instant,
    table: Mutex<TileTable>,
}

impl TilePartitioner {
    /// Build the tile grid for `plane`, all tiles pending, in row-major order.
    pub fn new(plane: ImagePlane) -> Self {
        let tiles: Vec<Tile> = plane
            .coords()
            .filter_map(|coord| {
                let rect = plane.tile_rect(coord).ok()?;
                Some(Tile::pending(coord, rect))
            })
            .collect();

        debug!(
            width = plane.width(),
            height = plane.height(),
            tile_size = plane.tile_size(),
            tiles_x = plane.tile_count_x(),
            tiles_y = plane.tile_count_y(),
            "Partitioned image plane"
        );

        let pending = tiles.len();
        Self {
            plane,
            started: Instant::now(),
            table: Mutex::new(TileTable {
                tiles,
                done: 0,
                failed: 0,
                in_flight: 0,
                pending,
                scan_from: 0,
            }),
        }
    }

    /// Validate raw dimensions and build the grid.
    ///
    /// # Errors
    ///
    /// [`PartitionError::InvalidDimension`] if any value is zero.
    pub fn with_dimensions(
        width: u32,
        height: u32,
        tile_size: u32,
    ) -> Result<Self, PartitionError> {
        Ok(Self::new(ImagePlane::new(width, height, tile_size)?))
    }

    /// The image plane this grid covers.
    pub fn plane(&self) -> &ImagePlane {
        &self.plane
    }

    /// Total number of tiles. Fixed for the lifetime of the partitioner.
    pub fn tile_count(&self) -> usize {
        self.plane.tile_count()
    }

    /// Claim the lowest-index pending tile for `worker`.
    ///
    /// The tile is marked in flight and owned by `worker` before the lock is
    /// released, so no two callers can receive the same tile. Returns `None`
    /// when no tile is pending.
    pub fn claim_next(&self, worker: WorkerId) -> Option<Tile> {
        let mut table = self.table.lock();
        if table.pending == 0 {
            return None;
        }

        let start = table.scan_from;
        let offset = table.tiles[start..]
            .iter()
            .position(|t| t.state() == TileState::Pending)?;
        let index = start + offset;

        table.tiles[index].claim(worker);
        table.pending -= 1;
        table.in_flight += 1;
        table.scan_from = index + 1;

        let tile = table.tiles[index].clone();
        drop(table);

        debug!(tx = tile.tx(), ty = tile.ty(), worker = %worker, attempt = tile.attempts(), "Tile claimed");
        Some(tile)
    }

    /// Mark the tile at `(tx, ty)` done.
    ///
    /// # Errors
    ///
    /// - [`PartitionError::OutOfRange`] if the coordinates are outside the grid
    /// - [`PartitionError::InvalidTransition`] if the tile is not in flight or
    ///   is owned by another worker
    pub fn report_done(&self, tx: u32, ty: u32, worker: WorkerId) -> Result<(), PartitionError> {
        let index = self.checked_index(tx, ty, worker)?;
        let mut table = self.table.lock();
        match table.leave_in_flight(index, worker) {
            Ok(()) => {
                table.tiles[index].finish();
                table.done += 1;
                debug!(tx, ty, worker = %worker, "Tile done");
                Ok(())
            }
            Err(e) => {
                warn!(tx, ty, worker = %worker, error = %e, "Rejected done report");
                Err(e)
            }
        }
    }

    /// Mark the tile at `(tx, ty)` failed, recording `reason`.
    ///
    /// Same ownership checks as [`report_done`](Self::report_done).
    pub fn report_failed(
        &self,
        tx: u32,
        ty: u32,
        worker: WorkerId,
        reason: impl Into<String>,
    ) -> Result<(), PartitionError> {
        let index = self.checked_index(tx, ty, worker)?;
        let reason = reason.into();
        let mut table = self.table.lock();
        match table.leave_in_flight(index, worker) {
            Ok(()) => {
                table.tiles[index].fail(reason.clone());
                table.failed += 1;
                warn!(tx, ty, worker = %worker, reason = %reason, "Tile failed");
                Ok(())
            }
            Err(e) => {
                warn!(tx, ty, worker = %worker, error = %e, "Rejected failure report");
                Err(e)
            }
        }
    }

    /// Reset every failed tile to pending and return how many were reset.
    ///
    /// The retry budget belongs to the caller; the partitioner only counts
    /// claims per tile (see [`Tile::attempts`]).
    pub fn retry_failed(&self) -> usize {
        let mut table = self.table.lock();
        let failed: Vec<usize> = table
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state() == TileState::Failed)
            .map(|(i, _)| i)
            .collect();

        for &index in &failed {
            table.reset_to_pending(index);
        }
        table.failed -= failed.len();
        drop(table);

        if !failed.is_empty() {
            debug!(count = failed.len(), "Failed tiles reset for retry");
        }
        failed.len()
    }

    /// Reset every tile held in flight by `worker` to pending.
    ///
    /// For callers shutting a worker down before it could report. Returns the
    /// number of tiles released.
    pub fn release_worker(&self, worker: WorkerId) -> usize {
        let mut table = self.table.lock();
        let owned: Vec<usize> = table
            .tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state() == TileState::InFlight && t.owner() == Some(worker))
            .map(|(i, _)| i)
            .collect();

        for &index in &owned {
            table.reset_to_pending(index);
        }
        table.in_flight -= owned.len();
        drop(table);

        if !owned.is_empty() {
            debug!(worker = %worker, count = owned.len(), "Released in-flight tiles");
        }
        owned.len()
    }

    /// Consistent snapshot of the tile counts.
    pub fn progress(&self) -> ProgressSnapshot {
        let table = self.table.lock();
        ProgressSnapshot {
            done: table.done,
            failed: table.failed,
            in_flight: table.in_flight,
            pending: table.pending,
            total: table.tiles.len(),
            elapsed: self.started.elapsed(),
        }
    }

    /// True iff no tile is pending or in flight. Failed tiles count as
    /// complete.
    pub fn is_complete(&self) -> bool {
        let table = self.table.lock();
        table.pending == 0 && table.in_flight == 0
    }

    /// Snapshot of the tile at `(tx, ty)`.
    pub fn tile(&self, tx: u32, ty: u32) -> Result<Tile, PartitionError> {
        let index = self.plane.index_of(TileCoord::new(tx, ty))?;
        Ok(self.table.lock().tiles[index].clone())
    }

    /// Snapshot of every tile in row-major order.
    pub fn tiles(&self) -> Vec<Tile> {
        self.table.lock().tiles.clone()
    }

    /// Coordinates and reasons of all currently failed tiles.
    pub fn failures(&self) -> Vec<(TileCoord, String)> {
        self.table
            .lock()
            .tiles
            .iter()
            .filter(|t| t.state() == TileState::Failed)
            .map(|t| (t.coord(), t.failure().unwrap_or_default().to_string()))
            .collect()
    }

    fn checked_index(&self, tx: u32, ty: u32, worker: WorkerId) -> Result<usize, PartitionError> {
        self.plane.index_of(TileCoord::new(tx, ty)).inspect_err(|e| {
            warn!(tx, ty, worker = %worker, error = %e, "Rejected report for unknown tile");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn partitioner(w: u32, h: u32, t: u32) -> TilePartitioner {
        TilePartitioner::with_dimensions(w, h, t).unwrap()
    }

    fn claim_all(p: &TilePartitioner, worker: WorkerId) -> Vec<Tile> {
        std::iter::from_fn(|| p.claim_next(worker)).collect()
    }

    #[test]
    fn test_construction_rejects_zero_width() {
        let err = TilePartitioner::with_dimensions(0, 10, 64).unwrap_err();
        assert!(matches!(err, PartitionError::InvalidDimension { .. }));
    }

    #[test]
    fn test_new_grid_is_all_pending() {
        let p = partitioner(100, 100, 64);
        assert_eq!(p.tile_count(), 4);
        assert_eq!(p.progress().counts(), (0, 0, 0, 4, 4));
        assert!(!p.is_complete());
        assert!(p.tiles().iter().all(|t| t.state() == TileState::Pending));
    }

    #[test]
    fn test_100x100_tile_sizes() {
        let p = partitioner(100, 100, 64);
        let sizes: Vec<_> = p
            .tiles()
            .iter()
            .map(|t| (t.rect().width(), t.rect().height()))
            .collect();
        assert_eq!(sizes, vec![(64, 64), (36, 64), (64, 36), (36, 36)]);
    }

    #[test]
    fn test_small_plane_single_tile() {
        let p = partitioner(10, 10, 64);
        let tiles = p.tiles();
        assert_eq!(tiles.len(), 1);
        assert_eq!((tiles[0].rect().width(), tiles[0].rect().height()), (10, 10));
    }

    #[test]
    fn test_claim_order_is_row_major() {
        let p = partitioner(30, 20, 10);
        let order: Vec<_> = claim_all(&p, WorkerId::new(1))
            .iter()
            .map(|t| (t.tx(), t.ty()))
            .collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
        assert!(p.claim_next(WorkerId::new(1)).is_none());
    }

    #[test]
    fn test_claim_marks_in_flight_with_owner() {
        let p = partitioner(100, 100, 64);
        let tile = p.claim_next(WorkerId::new(9)).unwrap();
        assert_eq!(tile.state(), TileState::InFlight);
        assert_eq!(tile.owner(), Some(WorkerId::new(9)));
        assert_eq!(p.tile(0, 0).unwrap().owner(), Some(WorkerId::new(9)));
        assert_eq!(p.progress().counts(), (0, 0, 1, 3, 4));
    }

    #[test]
    fn test_report_done_on_pending_tile_is_invalid() {
        let p = partitioner(100, 100, 64);
        let err = p.report_done(0, 0, WorkerId::new(1)).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::InvalidTransition {
                state: TileState::Pending,
                owner: None,
                ..
            }
        ));
        assert_eq!(p.progress().counts(), (0, 0, 0, 4, 4));
    }

    #[test]
    fn test_report_done_by_other_worker_is_invalid() {
        let p = partitioner(100, 100, 64);
        let tile = p.claim_next(WorkerId::new(1)).unwrap();
        let err = p.report_done(tile.tx(), tile.ty(), WorkerId::new(2)).unwrap_err();
        assert!(matches!(
            err,
            PartitionError::InvalidTransition {
                state: TileState::InFlight,
                owner: Some(owner),
                ..
            } if owner == WorkerId::new(1)
        ));
        // Tile still belongs to worker 1
        assert_eq!(p.progress().counts(), (0, 0, 1, 3, 4));
        p.report_done(tile.tx(), tile.ty(), WorkerId::new(1)).unwrap();
    }

    #[test]
    fn test_double_report_is_invalid() {
        let p = partitioner(10, 10, 64);
        let w = WorkerId::new(1);
        p.claim_next(w).unwrap();
        p.report_done(0, 0, w).unwrap();
        assert!(p.report_done(0, 0, w).is_err());
        assert!(p.report_failed(0, 0, w, "late").is_err());
        assert_eq!(p.progress().counts(), (1, 0, 0, 0, 1));
    }

    #[test]
    fn test_report_out_of_range() {
        let p = partitioner(100, 100, 64);
        let w = WorkerId::new(1);
        p.claim_next(w).unwrap();
        assert!(matches!(
            p.report_done(2, 0, w),
            Err(PartitionError::OutOfRange { tx: 2, ty: 0, tiles_x: 2, tiles_y: 2 })
        ));
        assert!(matches!(
            p.report_failed(0, 7, w, "x"),
            Err(PartitionError::OutOfRange { .. })
        ));
        assert!(p.tile(5, 5).is_err());
        assert_eq!(p.progress().counts(), (0, 0, 1, 3, 4));
    }

    #[test]
    fn test_failed_tile_cannot_become_done() {
        let p = partitioner(10, 10, 64);
        let w = WorkerId::new(1);
        p.claim_next(w).unwrap();
        p.report_failed(0, 0, w, "nan radiance").unwrap();
        assert!(matches!(
            p.report_done(0, 0, w),
            Err(PartitionError::InvalidTransition {
                state: TileState::Failed,
                ..
            })
        ));
        assert_eq!(p.failures(), vec![(TileCoord::new(0, 0), "nan radiance".to_string())]);
    }

    #[test]
    fn test_mixed_outcomes_then_retry() {
        let p = partitioner(40, 30, 10); // 4 x 3 = 12 tiles
        let w = WorkerId::new(1);
        let tiles = claim_all(&p, w);
        assert_eq!(tiles.len(), 12);

        let k = 7;
        for (i, tile) in tiles.iter().enumerate() {
            if i < k {
                p.report_done(tile.tx(), tile.ty(), w).unwrap();
            } else {
                p.report_failed(tile.tx(), tile.ty(), w, "timeout").unwrap();
            }
        }
        assert_eq!(p.progress().counts(), (k, 12 - k, 0, 0, 12));
        assert!(p.is_complete());

        assert_eq!(p.retry_failed(), 12 - k);
        let progress = p.progress();
        assert_eq!(progress.pending, 12 - k);
        assert_eq!(progress.failed, 0);
        assert!(!p.is_complete());
        assert!(p.failures().is_empty());

        // Retried tiles come back in row-major order
        let again = claim_all(&p, w);
        let coords: Vec<_> = again.iter().map(|t| t.coord()).collect();
        let expected: Vec<_> = tiles[k..].iter().map(|t| t.coord()).collect();
        assert_eq!(coords, expected);
        assert!(again.iter().all(|t| t.attempts() == 2));
    }

    #[test]
    fn test_retry_with_nothing_failed() {
        let p = partitioner(10, 10, 5);
        assert_eq!(p.retry_failed(), 0);
        assert_eq!(p.progress().pending, 4);
    }

    #[test]
    fn test_reset_tile_is_claimed_before_later_tiles() {
        let p = partitioner(30, 10, 10);
        let w = WorkerId::new(1);
        let first = p.claim_next(w).unwrap();
        p.report_failed(first.tx(), first.ty(), w, "oops").unwrap();
        p.retry_failed();
        assert_eq!(p.claim_next(w).unwrap().coord(), TileCoord::new(0, 0));
        assert_eq!(p.claim_next(w).unwrap().coord(), TileCoord::new(1, 0));
    }

    #[test]
    fn test_release_worker() {
        let p = partitioner(30, 10, 10);
        let a = WorkerId::new(1);
        let b = WorkerId::new(2);
        p.claim_next(a).unwrap();
        p.claim_next(b).unwrap();
        p.claim_next(a).unwrap();

        assert_eq!(p.release_worker(a), 2);
        assert_eq!(p.progress().counts(), (0, 0, 1, 2, 3));
        assert_eq!(p.release_worker(a), 0);
        assert_eq!(p.claim_next(b).unwrap().coord(), TileCoord::new(0, 0));
    }

    #[test]
    fn test_concurrent_claims_are_exclusive() {
        let p = Arc::new(partitioner(640, 480, 16)); // 40 x 30 = 1200 tiles
        let workers = 8;

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let p = Arc::clone(&p);
                thread::spawn(move || {
                    let worker = WorkerId::new(id);
                    let mut claimed = Vec::new();
                    while let Some(tile) = p.claim_next(worker) {
                        claimed.push(tile.coord());
                        p.report_done(tile.tx(), tile.ty(), worker).unwrap();
                    }
                    claimed
                })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for coord in handle.join().unwrap() {
                total += 1;
                assert!(seen.insert(coord), "tile {} claimed twice", coord);
            }
        }
        assert_eq!(total, 1200);
        assert_eq!(p.progress().counts(), (1200, 0, 0, 0, 1200));
        assert!(p.is_complete());
    }

    #[test]
    fn test_concurrent_foreign_reports_never_corrupt_counts() {
        let p = Arc::new(partitioner(64, 64, 8)); // 64 tiles
        let handles: Vec<_> = (0..4u32)
            .map(|id| {
                let p = Arc::clone(&p);
                thread::spawn(move || {
                    let worker = WorkerId::new(id);
                    let mut rejected = 0usize;
                    while let Some(tile) = p.claim_next(worker) {
                        // Try to steal a neighbour's tile first
                        let other = WorkerId::new(id + 100);
                        if p.report_done(tile.tx(), tile.ty(), other).is_err() {
                            rejected += 1;
                        }
                        p.report_done(tile.tx(), tile.ty(), worker).unwrap();
                    }
                    rejected
                })
            })
            .collect();

        let rejected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(rejected, 64);
        assert_eq!(p.progress().counts(), (64, 0, 0, 0, 64));
    }
}
