//! Tile preprocessing applied to both images before scoring.
//!
//! A preprocessor is a pure `ImageF32 -> ImageF32` transform with the same
//! shape in and out. The correlator applies it to every pyramid level, so
//! filters are expressed in level pixels.

use crate::image::filter::{convolve_separable, gaussian_kernel, laplacian};
use crate::image::ImageF32;

/// Pure tile-to-tile transform run ahead of scoring.
pub trait Preprocess: Send + Sync {
    fn apply(&self, tile: &ImageF32) -> ImageF32;

    /// Short label used in summaries and debug output.
    fn name(&self) -> &'static str;
}

/// Passes tiles through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPreprocess;

impl Preprocess for NullPreprocess {
    fn apply(&self, tile: &ImageF32) -> ImageF32 {
        tile.clone()
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Gaussian smoothing.
#[derive(Clone, Copy, Debug)]
pub struct BlurPreprocess {
    pub sigma: f32,
}

impl Default for BlurPreprocess {
    fn default() -> Self {
        Self { sigma: 1.5 }
    }
}

impl Preprocess for BlurPreprocess {
    fn apply(&self, tile: &ImageF32) -> ImageF32 {
        convolve_separable(tile, &gaussian_kernel(self.sigma))
    }

    fn name(&self) -> &'static str {
        "blur"
    }
}

/// Laplacian of Gaussian, suppressing brightness offsets between the images.
#[derive(Clone, Copy, Debug)]
pub struct LogPreprocess {
    pub sigma: f32,
}

impl Default for LogPreprocess {
    fn default() -> Self {
        Self { sigma: 1.5 }
    }
}

impl Preprocess for LogPreprocess {
    fn apply(&self, tile: &ImageF32) -> ImageF32 {
        laplacian(&convolve_separable(tile, &gaussian_kernel(self.sigma)))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Sign of the Laplacian of Gaussian: `+1`, `-1`, or `0` on exact zeros.
#[derive(Clone, Copy, Debug)]
pub struct SlogPreprocess {
    pub sigma: f32,
}

impl Default for SlogPreprocess {
    fn default() -> Self {
        Self { sigma: 1.5 }
    }
}

impl Preprocess for SlogPreprocess {
    fn apply(&self, tile: &ImageF32) -> ImageF32 {
        let mut out = LogPreprocess { sigma: self.sigma }.apply(tile);
        for v in out.data_mut() {
            *v = if *v > 0.0 {
                1.0
            } else if *v < 0.0 {
                -1.0
            } else {
                0.0
            };
        }
        out
    }

    fn name(&self) -> &'static str {
        "slog"
    }
}

#[cfg(test)]
mod tests {
    use super::{BlurPreprocess, LogPreprocess, NullPreprocess, Preprocess, SlogPreprocess};
    use crate::image::ImageF32;

    fn ramp() -> ImageF32 {
        ImageF32::from_fn(12, 9, |x, y| ((x * 7 + y * 13) % 11) as f32)
    }

    #[test]
    fn filters_keep_tile_shape() {
        let tile = ramp();
        let filters: [&dyn Preprocess; 4] = [
            &NullPreprocess,
            &BlurPreprocess::default(),
            &LogPreprocess::default(),
            &SlogPreprocess::default(),
        ];
        for f in filters {
            let out = f.apply(&tile);
            assert_eq!((out.width(), out.height()), (12, 9), "{}", f.name());
        }
        assert_eq!(NullPreprocess.apply(&tile), tile);
    }

    #[test]
    fn log_of_constant_is_zero() {
        let flat = ImageF32::filled(8, 8, 42.0);
        let out = LogPreprocess { sigma: 1.0 }.apply(&flat);
        assert!(out.data().iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn slog_produces_signs() {
        let out = SlogPreprocess { sigma: 1.0 }.apply(&ramp());
        assert!(out.data().iter().all(|&v| v == 1.0 || v == -1.0 || v == 0.0));
        assert!(out.data().iter().any(|&v| v == 1.0));
        assert!(out.data().iter().any(|&v| v == -1.0));
    }
}
