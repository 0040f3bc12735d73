//! Separable smoothing and Laplacian filters on `f32` tiles.
//!
//! Borders are handled by clamping sample indices to the tile.

use crate::image::ImageF32;

/// Normalized 1D Gaussian with `radius = ceil(3 * sigma)`, minimum 1.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let sigma = if sigma.is_finite() && sigma > 0.0 {
        sigma
    } else {
        0.5
    };
    let radius = ((3.0 * sigma).ceil() as usize).max(1);
    let sigma2 = sigma * sigma;
    let mut g: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-(x * x) / (2.0 * sigma2)).exp()
        })
        .collect();
    let sum: f32 = g.iter().sum();
    for v in &mut g {
        *v /= sum;
    }
    g
}

/// Binomial `[1, 4, 6, 4, 1] / 16` kernel used ahead of 2x decimation.
pub const BINOMIAL5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Convolves rows then columns with the same odd-length symmetric kernel.
pub fn convolve_separable(src: &ImageF32, kernel: &[f32]) -> ImageF32 {
    debug_assert!(kernel.len() % 2 == 1);
    let width = src.width();
    let height = src.height();
    let radius = (kernel.len() / 2) as isize;

    let mut tmp = ImageF32::filled(width, height, 0.0);
    for y in 0..height {
        let row = src.row(y);
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &kv) in kernel.iter().enumerate() {
                acc += kv * row[clamp_index(x as isize + k as isize - radius, width)];
            }
            tmp.set(x, y, acc);
        }
    }

    let mut out = ImageF32::filled(width, height, 0.0);
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &kv) in kernel.iter().enumerate() {
                acc += kv * tmp.at(x, clamp_index(y as isize + k as isize - radius, height));
            }
            out.set(x, y, acc);
        }
    }
    out
}

/// Five-point Laplacian.
pub fn laplacian(src: &ImageF32) -> ImageF32 {
    let width = src.width();
    let height = src.height();
    ImageF32::from_fn(width, height, |x, y| {
        let xi = x as isize;
        let yi = y as isize;
        let c = src.at(x, y);
        let l = src.at(clamp_index(xi - 1, width), y);
        let r = src.at(clamp_index(xi + 1, width), y);
        let u = src.at(x, clamp_index(yi - 1, height));
        let d = src.at(x, clamp_index(yi + 1, height));
        l + r + u + d - 4.0 * c
    })
}
