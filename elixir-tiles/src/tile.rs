//! Tile grid types.
//!
//! A [`Tile`] is the unit of render-work assignment. It is identified by its
//! [`TileCoord`] in the grid, covers a half-open pixel [`TileRect`], and moves
//! through the [`TileState`] lifecycle:
//!
//! ```text
//! Pending ──claim──► InFlight ──done──► Done
//!    ▲                  │
//!    │                  └──failed──► Failed
//!    └────────retry─────────────────────┘
//! ```

use std::fmt;

use serde::Serialize;

/// Grid position of a tile (column `tx`, row `ty`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    /// Column index.
    pub tx: u32,
    /// Row index.
    pub ty: u32,
}

impl TileCoord {
    /// Create a new grid coordinate.
    pub fn new(tx: u32, ty: u32) -> Self {
        Self { tx, ty }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.tx, self.ty)
    }
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl TileRect {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Whether pixel `(x, y)` lies inside the rectangle.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x0..self.x1).contains(&x) && (self.y0..self.y1).contains(&y)
    }

    /// Whether two rectangles share at least one pixel.
    pub fn overlaps(&self, other: &TileRect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

/// Lifecycle state of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker and being rendered.
    InFlight,
    /// Rendered successfully.
    Done,
    /// Rendering failed; may be reset to `Pending` by a retry.
    Failed,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TileState::Pending => "pending",
            TileState::InFlight => "in_flight",
            TileState::Done => "done",
            TileState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Identifier of a render worker (thread, process or remote node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Create a worker id.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for WorkerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point-in-time view of one tile.
///
/// Returned by value from the partitioner, so holding a `Tile` never keeps
/// the tile table locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    coord: TileCoord,
    rect: TileRect,
    state: TileState,
    owner: Option<WorkerId>,
    attempts: u32,
    failure: Option<String>,
}

impl Tile {
    pub(crate) fn pending(coord: TileCoord, rect: TileRect) -> Self {
        Self {
            coord,
            rect,
            state: TileState::Pending,
            owner: None,
            attempts: 0,
            failure: None,
        }
    }

    /// Grid coordinate.
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Column index.
    pub fn tx(&self) -> u32 {
        self.coord.tx
    }

    /// Row index.
    pub fn ty(&self) -> u32 {
        self.coord.ty
    }

    /// Pixel rectangle.
    pub fn rect(&self) -> TileRect {
        self.rect
    }

    /// Current state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Owning worker; only present while in flight.
    pub fn owner(&self) -> Option<WorkerId> {
        self.owner
    }

    /// Number of times the tile has been claimed.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reason recorded by the last failure report, until the tile is retried.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub(crate) fn claim(&mut self, worker: WorkerId) {
        self.state = TileState::InFlight;
        self.owner = Some(worker);
        self.attempts += 1;
    }

    pub(crate) fn finish(&mut self) {
        self.state = TileState::Done;
        self.owner = None;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.state = TileState::Failed;
        self.owner = None;
        self.failure = Some(reason);
    }

    pub(crate) fn reset(&mut self) {
        self.state = TileState::Pending;
        self.owner = None;
        self.failure = None;
    }
}
