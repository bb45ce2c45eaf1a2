//! Error types for tile partitioning.
//!
//! Film, render and configuration errors live next to the code that raises
//! them; this module only covers misuse of the tile grid itself.

use thiserror::Error;

use crate::tile::{TileState, WorkerId};

/// Errors raised by [`ImagePlane`](crate::plane::ImagePlane) validation and
/// [`TilePartitioner`](crate::partitioner::TilePartitioner) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// Width, height or tile size is not a positive pixel count.
    #[error("invalid image plane {width}x{height} with tile size {tile_size}: all dimensions must be positive")]
    InvalidDimension {
        width: i64,
        height: i64,
        tile_size: i64,
    },

    /// A report targeted a tile that is not in flight, or is in flight for
    /// another worker.
    #[error(
        "invalid transition for tile ({tx}, {ty}): state is {state}, reported by worker {worker}, owner {}",
        owner_label(.owner)
    )]
    InvalidTransition {
        tx: u32,
        ty: u32,
        state: TileState,
        worker: WorkerId,
        owner: Option<WorkerId>,
    },

    /// Grid coordinates outside `[0, tiles_x) x [0, tiles_y)`.
    #[error("tile ({tx}, {ty}) is outside the {tiles_x}x{tiles_y} grid")]
    OutOfRange {
        tx: u32,
        ty: u32,
        tiles_x: u32,
        tiles_y: u32,
    },
}

fn owner_label(owner: &Option<WorkerId>) -> String {
    match owner {
        Some(worker) => worker.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_dimension_display() {
        let err = PartitionError::InvalidDimension {
            width: 0,
            height: 10,
            tile_size: 64,
        };
        assert!(err.to_string().contains("0x10"));
        assert!(err.to_string().contains("tile size 64"));
    }

    #[test]
    fn test_invalid_transition_display_without_owner() {
        let err = PartitionError::InvalidTransition {
            tx: 1,
            ty: 2,
            state: TileState::Pending,
            worker: WorkerId::new(7),
            owner: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("(1, 2)"));
        assert!(msg.contains("pending"));
        assert!(msg.contains("owner none"));
    }

    #[test]
    fn test_out_of_range_display() {
        let err = PartitionError::OutOfRange {
            tx: 5,
            ty: 0,
            tiles_x: 2,
            tiles_y: 2,
        };
        assert_eq!(err.to_string(), "tile (5, 0) is outside the 2x2 grid");
    }
}
