//! Convenience helpers for the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use crate::image::{ImageF32, PixelLayout, Raster};
use crate::util::{CorrStereoError, CorrStereoResult};
use crate::view::MemoryImage;
use std::path::Path;

/// Creates a grayscale raster from an `image` buffer.
pub fn raster_from_gray_image(img: &image::GrayImage) -> CorrStereoResult<Raster> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    Raster::from_vec(width, height, PixelLayout::Gray, img.as_raw().clone())
}

/// Loads an image from disk as a grayscale in-memory view.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> CorrStereoResult<MemoryImage> {
    let img = image::open(path).map_err(|err| CorrStereoError::ImageIo {
        reason: err.to_string(),
    })?;
    Ok(MemoryImage::new(raster_from_gray_image(&img.to_luma8())?))
}

/// Writes a tile as an 8-bit PNG, stretching its finite range to `[0, 255]`.
///
/// Non-finite samples are written as black.
pub fn save_normalized_png<P: AsRef<Path>>(tile: &ImageF32, path: P) -> CorrStereoResult<()> {
    let (lo, hi) = tile
        .data()
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = if hi > lo { hi - lo } else { 1.0 };
    let pixels: Vec<u8> = tile
        .data()
        .iter()
        .map(|&v| {
            if v.is_finite() {
                (((v - lo) / span) * 255.0).round().clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect();
    let img = image::GrayImage::from_raw(tile.width() as u32, tile.height() as u32, pixels)
        .ok_or(CorrStereoError::BufferTooSmall {
            needed: tile.width() * tile.height(),
            got: tile.data().len(),
        })?;
    img.save(path).map_err(|err| CorrStereoError::ImageIo {
        reason: err.to_string(),
    })
}
