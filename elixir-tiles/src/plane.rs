//! Image plane description.
//!
//! An [`ImagePlane`] is the immutable render target of one job: pixel width,
//! pixel height and the square tile edge used to split it. Every derived
//! quantity (tile counts, pixel totals, tile rectangles) is computed on access
//! from those three values.
//!
//! # Example
//!
//! ```
//! use elixir_tiles::plane::ImagePlane;
//!
//! let plane = ImagePlane::new(100, 100, 64).unwrap();
//! assert_eq!(plane.tile_count_x(), 2);
//! assert_eq!(plane.tile_count_y(), 2);
//! assert_eq!(plane.total_pixels(), 10_000);
//! ```

use serde::Serialize;

use crate::error::PartitionError;
use crate::tile::{TileCoord, TileRect};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Render target dimensions and tiling granularity.
///
/// Construction validates that all three dimensions are positive, so the
/// accessors never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImagePlane {
    width: u32,
    height: u32,
    tile_size: u32,
}

impl ImagePlane {
    /// Create a plane of `width` x `height` pixels split into `tile_size` tiles.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::InvalidDimension`] if any value is zero.
    pub fn new(width: u32, height: u32, tile_size: u32) -> Result<Self, PartitionError> {
        if width == 0 || height == 0 || tile_size == 0 {
            return Err(PartitionError::InvalidDimension {
                width: width as i64,
                height: height as i64,
                tile_size: tile_size as i64,
            });
        }
        Ok(Self {
            width,
            height,
            tile_size,
        })
    }

    /// Create a plane from signed values, as handed over by host applications.
    ///
    /// Negative and zero values, and values that do not fit in `u32`, are
    /// rejected with [`PartitionError::InvalidDimension`].
    pub fn try_from_signed(width: i64, height: i64, tile_size: i64) -> Result<Self, PartitionError> {
        let invalid = || PartitionError::InvalidDimension {
            width,
            height,
            tile_size,
        };
        let w = u32::try_from(width).map_err(|_| invalid())?;
        let h = u32::try_from(height).map_err(|_| invalid())?;
        let t = u32::try_from(tile_size).map_err(|_| invalid())?;
        Self::new(w, h, t).map_err(|_| invalid())
    }

    /// Create a plane from a host resolution scaled by a percentage.
    ///
    /// The scaled size truncates toward zero, so `1920 x 1080 @ 50%` gives
    /// `960 x 540` and `3 x 3 @ 10%` gives an invalid `0 x 0` plane. A scaled
    /// size that does not fit in `u32` is rejected rather than clamped.
    pub fn from_resolution(
        resolution_x: u32,
        resolution_y: u32,
        percentage: u32,
        tile_size: u32,
    ) -> Result<Self, PartitionError> {
        let scale = |v: u32| v as u64 * percentage as u64 / 100;
        let (width, height) = (scale(resolution_x), scale(resolution_y));
        match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => Self::new(w, h, tile_size),
            _ => Err(PartitionError::InvalidDimension {
                width: width as i64,
                height: height as i64,
                tile_size: tile_size as i64,
            }),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tile edge in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Number of tile columns, `ceil(width / tile_size)`.
    pub fn tile_count_x(&self) -> u32 {
        self.width.div_ceil(self.tile_size)
    }

    /// Number of tile rows, `ceil(height / tile_size)`.
    pub fn tile_count_y(&self) -> u32 {
        self.height.div_ceil(self.tile_size)
    }

    /// Total number of tiles in the grid.
    pub fn tile_count(&self) -> usize {
        self.tile_count_x() as usize * self.tile_count_y() as usize
    }

    /// Total number of pixels, `width * height`.
    pub fn total_pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `coord` lies inside the tile grid.
    pub fn contains(&self, coord: TileCoord) -> bool {
        coord.tx < self.tile_count_x() && coord.ty < self.tile_count_y()
    }

    /// Pixel rectangle covered by the tile at `coord`.
    ///
    /// Edge tiles are clipped to the plane. Returns
    /// [`PartitionError::OutOfRange`] for coordinates outside the grid.
    pub fn tile_rect(&self, coord: TileCoord) -> Result<TileRect, PartitionError> {
        if !self.contains(coord) {
            return Err(self.out_of_range(coord));
        }
        let x0 = coord.tx * self.tile_size;
        let y0 = coord.ty * self.tile_size;
        Ok(TileRect {
            x0,
            y0,
            x1: x0.saturating_add(self.tile_size).min(self.width),
            y1: y0.saturating_add(self.tile_size).min(self.height),
        })
    }

    /// Row-major index of `coord` (ty outer, tx inner).
    pub(crate) fn index_of(&self, coord: TileCoord) -> Result<usize, PartitionError> {
        if !self.contains(coord) {
            return Err(self.out_of_range(coord));
        }
        Ok(coord.ty as usize * self.tile_count_x() as usize + coord.tx as usize)
    }

    /// All tile coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = TileCoord> + '_ {
        let tiles_x = self.tile_count_x();
        (0..self.tile_count_y()).flat_map(move |ty| (0..tiles_x).map(move |tx| TileCoord { tx, ty }))
    }

    fn out_of_range(&self, coord: TileCoord) -> PartitionError {
        PartitionError::OutOfRange {
            tx: coord.tx,
            ty: coord.ty,
            tiles_x: self.tile_count_x(),
            tiles_y: self.tile_count_y(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_counts_round_up() {
        let plane = ImagePlane::new(100, 100, 64).unwrap();
        assert_eq!(plane.tile_count_x(), 2);
        assert_eq!(plane.tile_count_y(), 2);
        assert_eq!(plane.tile_count(), 4);
    }

    #[test]
    fn test_exact_multiple() {
        let plane = ImagePlane::new(128, 64, 64).unwrap();
        assert_eq!(plane.tile_count_x(), 2);
        assert_eq!(plane.tile_count_y(), 1);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            ImagePlane::new(0, 10, 64),
            Err(PartitionError::InvalidDimension { width: 0, .. })
        ));
        assert!(ImagePlane::new(10, 0, 64).is_err());
        assert!(ImagePlane::new(10, 10, 0).is_err());
    }

    #[test]
    fn test_signed_negative_rejected() {
        let err = ImagePlane::try_from_signed(-5, 10, 64).unwrap_err();
        assert_eq!(
            err,
            PartitionError::InvalidDimension {
                width: -5,
                height: 10,
                tile_size: 64
            }
        );
        assert!(ImagePlane::try_from_signed(10, 10, -1).is_err());
        assert!(ImagePlane::try_from_signed(i64::MAX, 10, 1).is_err());
        assert!(ImagePlane::try_from_signed(10, 10, 4).is_ok());
    }

    #[test]
    fn test_from_resolution_scales_and_truncates() {
        let plane = ImagePlane::from_resolution(1920, 1080, 50, 64).unwrap();
        assert_eq!((plane.width(), plane.height()), (960, 540));

        let plane = ImagePlane::from_resolution(101, 33, 33, 16).unwrap();
        assert_eq!((plane.width(), plane.height()), (33, 10));

        assert!(ImagePlane::from_resolution(3, 3, 10, 64).is_err());
    }

    #[test]
    fn test_from_resolution_overflow_rejected() {
        let err = ImagePlane::from_resolution(u32::MAX, 1080, 200, 64).unwrap_err();
        assert_eq!(
            err,
            PartitionError::InvalidDimension {
                width: u32::MAX as i64 * 2,
                height: 2160,
                tile_size: 64
            }
        );
        let plane = ImagePlane::from_resolution(u32::MAX, 10, 100, 64).unwrap();
        assert_eq!(plane.width(), u32::MAX);
    }

    #[test]
    fn test_edge_tile_rect_is_clipped() {
        let plane = ImagePlane::new(100, 100, 64).unwrap();
        let rect = plane.tile_rect(TileCoord::new(1, 1)).unwrap();
        assert_eq!((rect.x0, rect.y0, rect.x1, rect.y1), (64, 64, 100, 100));
        assert_eq!((rect.width(), rect.height()), (36, 36));
    }

    #[test]
    fn test_tile_rect_out_of_range() {
        let plane = ImagePlane::new(100, 100, 64).unwrap();
        let err = plane.tile_rect(TileCoord::new(2, 0)).unwrap_err();
        assert!(matches!(err, PartitionError::OutOfRange { tx: 2, ty: 0, .. }));
    }

    #[test]
    fn test_coords_row_major() {
        let plane = ImagePlane::new(30, 20, 10).unwrap();
        let coords: Vec<_> = plane.coords().map(|c| (c.tx, c.ty)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
        assert_eq!(plane.index_of(TileCoord::new(1, 1)).unwrap(), 4);
    }

    #[test]
    fn test_total_pixels_does_not_overflow() {
        let plane = ImagePlane::new(u32::MAX, 2, u32::MAX).unwrap();
        assert_eq!(plane.total_pixels(), u32::MAX as u64 * 2);
        assert_eq!(plane.tile_count(), 1);
    }
}
