//! Output pixel buffer assembled from rendered tiles.
//!
//! The [`Film`] holds linear RGB radiance for every pixel of an
//! [`ImagePlane`]. Workers splat finished tiles into it with
//! [`Film::add_tile`], which sums samples per pixel; once the job completes
//! the buffer is scaled by `1 / samples_per_pixel`, tone mapped to 8-bit
//! output (gamma 2) and written as PNG.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

use crate::plane::ImagePlane;
use crate::tile::TileRect;

/// Linear RGB radiance of one pixel.
pub type Rgb = [f32; 3];

/// Errors from writing tiles into, or saving, a film.
#[derive(Debug, Error)]
pub enum FilmError {
    /// The pixel slice does not match the tile rectangle.
    #[error("tile {width}x{height} expects {expected} pixels, got {actual}")]
    TileSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// The rectangle reaches outside the image plane.
    #[error("tile rect [{}, {}) x [{}, {}) exceeds the {plane_width}x{plane_height} film", .rect.x0, .rect.x1, .rect.y0, .rect.y1)]
    OutOfBounds {
        rect: TileRect,
        plane_width: u32,
        plane_height: u32,
    },

    /// Encoding or writing the image failed.
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Shared output buffer for one render job.
///
/// Writes take the buffer lock only for the copy of one tile, so many workers
/// can deliver disjoint tiles without coordinating with each other.
#[derive(Debug)]
pub struct Film {
    plane: ImagePlane,
    pixels: RwLock<Vec<Rgb>>,
}

impl Film {
    /// Create a black film covering `plane`.
    pub fn new(plane: ImagePlane) -> Self {
        let len = plane.total_pixels() as usize;
        Self {
            plane,
            pixels: RwLock::new(vec![[0.0; 3]; len]),
        }
    }

    /// The plane this film covers.
    pub fn plane(&self) -> &ImagePlane {
        &self.plane
    }

    /// Copy a row-major block of pixels into `rect`, replacing what was there.
    pub fn write_tile(&self, rect: TileRect, pixels: &[Rgb]) -> Result<(), FilmError> {
        self.blit(rect, pixels, |dst, src| dst.copy_from_slice(src))
    }

    /// Add a row-major block of samples onto `rect`.
    ///
    /// Each pixel keeps the sum of every sample splatted onto it; export with
    /// a scale of `1 / samples_per_pixel` to get the average.
    pub fn add_tile(&self, rect: TileRect, pixels: &[Rgb]) -> Result<(), FilmError> {
        self.blit(rect, pixels, |dst, src| {
            for (d, s) in dst.iter_mut().zip(src) {
                for (dc, sc) in d.iter_mut().zip(s) {
                    *dc += sc;
                }
            }
        })
    }

    fn blit<F>(&self, rect: TileRect, pixels: &[Rgb], mut apply: F) -> Result<(), FilmError>
    where
        F: FnMut(&mut [Rgb], &[Rgb]),
    {
        if rect.x1 > self.plane.width()
            || rect.y1 > self.plane.height()
            || rect.x0 > rect.x1
            || rect.y0 > rect.y1
        {
            return Err(FilmError::OutOfBounds {
                rect,
                plane_width: self.plane.width(),
                plane_height: self.plane.height(),
            });
        }

        let expected = rect.area() as usize;
        if pixels.len() != expected {
            return Err(FilmError::TileSizeMismatch {
                width: rect.width(),
                height: rect.height(),
                expected,
                actual: pixels.len(),
            });
        }

        let stride = self.plane.width() as usize;
        let row_len = rect.width() as usize;
        if row_len == 0 {
            return Ok(());
        }

        let mut buffer = self.pixels.write();
        for (row, src) in pixels.chunks_exact(row_len).enumerate() {
            let start = (rect.y0 as usize + row) * stride + rect.x0 as usize;
            apply(&mut buffer[start..start + row_len], src);
        }
        Ok(())
    }

    /// Radiance at `(x, y)`, or `None` outside the film.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.plane.width() || y >= self.plane.height() {
            return None;
        }
        let index = y as usize * self.plane.width() as usize + x as usize;
        Some(self.pixels.read()[index])
    }

    /// Tone map to 8-bit RGB.
    ///
    /// Each channel is multiplied by `scale`, clamped to `[0, 1]`, gamma
    /// corrected with a square root and quantized to `0..=255`. Row 0 is the
    /// top of the image.
    pub fn to_rgb8(&self, scale: f32) -> image::RgbImage {
        let width = self.plane.width();
        let buffer = self.pixels.read();
        let mut bytes = Vec::with_capacity(buffer.len() * 3);
        for pixel in buffer.iter() {
            for channel in pixel {
                bytes.push(quantize(channel * scale));
            }
        }
        drop(buffer);

        image::RgbImage::from_raw(width, self.plane.height(), bytes)
            .unwrap_or_else(|| image::RgbImage::new(width, self.plane.height()))
    }

    /// Tone map with `scale` and write a PNG to `path`.
    pub fn save_png(&self, path: &Path, scale: f32) -> Result<(), FilmError> {
        self.to_rgb8(scale)
            .save_with_format(path, image::ImageFormat::Png)?;
        info!(path = %path.display(), width = self.plane.width(), height = self.plane.height(), "Film written");
        Ok(())
    }
}

/// Append a millisecond timestamp to the file stem: `render.png` becomes
/// `render_1700000000000.png`.
pub fn stamped_path(base: &Path) -> PathBuf {
    stamped_path_at(base, chrono::Utc::now().timestamp_millis())
}

fn stamped_path_at(base: &Path, millis: i64) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string());
    let name = format!("{}_{}.png", stem, millis);
    base.with_file_name(name)
}

fn quantize(value: f32) -> u8 {
    let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
    (v.sqrt() * 255.99) as u8
}
