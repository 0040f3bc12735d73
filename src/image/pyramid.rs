//! Gaussian image pyramid over `f32` tiles.
//!
//! Each level smooths the previous one with a 5-tap binomial kernel and keeps
//! every second sample, so level `l` pixel `x` sits over pixel `2x` of level
//! `l - 1`. Odd extents round up.

use crate::image::filter::{convolve_separable, BINOMIAL5};
use crate::image::ImageF32;

/// Owned pyramid; level 0 is the input resolution.
#[derive(Clone, Debug)]
pub struct ImagePyramid {
    levels: Vec<ImageF32>,
}

impl ImagePyramid {
    /// Builds up to `max_levels` levels, stopping early at 1-pixel extents.
    ///
    /// `max_levels` is clamped to at least 1 so the base level is always present.
    pub fn build(base: &ImageF32, max_levels: usize) -> Self {
        let max_levels = max_levels.max(1);
        let mut levels = Vec::with_capacity(max_levels);
        levels.push(base.clone());
        while levels.len() < max_levels {
            let Some(prev) = levels.last() else {
                break;
            };
            if prev.width() < 2 || prev.height() < 2 {
                break;
            }
            let next = downsample_2x(prev);
            levels.push(next);
        }
        Self { levels }
    }

    /// Returns all pyramid levels (level 0 is the base resolution).
    pub fn levels(&self) -> &[ImageF32] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&ImageF32> {
        self.levels.get(index)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

/// Smooths and decimates by two in each direction.
pub fn downsample_2x(src: &ImageF32) -> ImageF32 {
    let smoothed = convolve_separable(src, &BINOMIAL5);
    let width = src.width().div_ceil(2);
    let height = src.height().div_ceil(2);
    ImageF32::from_fn(width, height, |x, y| smoothed.at(2 * x, 2 * y))
}
