//! Render progress snapshots.

use std::time::Duration;

use serde::Serialize;

/// Point-in-time tile counts for one render job.
///
/// Taken under the partitioner lock, so the counts are always consistent:
/// `done + failed + in_flight + pending == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Tiles rendered successfully.
    pub done: usize,
    /// Tiles whose last attempt failed.
    pub failed: usize,
    /// Tiles currently claimed by a worker.
    pub in_flight: usize,
    /// Tiles waiting to be claimed.
    pub pending: usize,
    /// Total tiles in the grid.
    pub total: usize,
    /// Time since the partitioner was created.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Counts as `(done, failed, in_flight, pending, total)`.
    pub fn counts(&self) -> (usize, usize, usize, usize, usize) {
        (self.done, self.failed, self.in_flight, self.pending, self.total)
    }

    /// Tiles that reached a terminal state (done or failed).
    pub fn settled(&self) -> usize {
        self.done + self.failed
    }

    /// True when nothing is pending or in flight. Failed tiles count as
    /// complete; the caller decides whether to retry them.
    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }

    /// Settled fraction from 0.0 to 1.0.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.settled() as f64 / self.total as f64
    }

    /// Estimated time remaining, extrapolated from the average time per
    /// settled tile. `None` until at least one tile has settled.
    pub fn eta(&self) -> Option<Duration> {
        let settled = self.settled();
        if settled == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(settled) as u128;
        let nanos = self.elapsed.as_nanos().saturating_mul(remaining) / settled as u128;
        let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
        Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
    }
}
