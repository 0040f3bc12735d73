//! SIMD kernel using the `wide` crate.
//!
//! Rows of the window pair are multiplied eight samples at a time in `f32x8`
//! lanes; each row is reduced and accumulated in `f64`.

use crate::image::ImageF32;
use crate::kernel::{Kernel, Overlap};
use wide::f32x8;

const LANES: usize = 8;

#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

#[inline]
fn hsum(v: f32x8) -> f32 {
    let arr = v.to_array();
    arr[0] + arr[1] + arr[2] + arr[3] + arr[4] + arr[5] + arr[6] + arr[7]
}

/// SIMD ZNCC kernel.
pub struct ZnccSimd;

impl Kernel for ZnccSimd {
    fn dot(left: &ImageF32, right: &ImageF32, overlap: &Overlap) -> f64 {
        let w = overlap.width;
        let simd_end = w / LANES * LANES;
        let mut dot = 0.0f64;
        for j in 0..overlap.height {
            let l = &left.row(overlap.left_y + j)[overlap.left_x..overlap.left_x + w];
            let r = &right.row(overlap.right_y + j)[overlap.right_x..overlap.right_x + w];

            let mut acc = f32x8::ZERO;
            let mut i = 0;
            while i < simd_end {
                acc += load_f32x8(&l[i..]) * load_f32x8(&r[i..]);
                i += LANES;
            }
            let mut tail = 0.0f32;
            while i < w {
                tail += l[i] * r[i];
                i += 1;
            }
            dot += (hsum(acc) + tail) as f64;
        }
        dot
    }
}

#[cfg(test)]
mod tests {
    use super::ZnccSimd;
    use crate::image::ImageF32;
    use crate::kernel::scalar::ZnccScalar;
    use crate::kernel::{Kernel, ScorePlan};

    #[test]
    fn simd_matches_scalar() {
        let left = ImageF32::from_fn(40, 30, |x, y| ((x * 31 + y * 17 + x * y) % 97) as f32);
        let right = ImageF32::from_fn(40, 30, |x, y| ((x * 29 + y * 19 + x * y) % 89) as f32);
        let plan = ScorePlan::new(&left, &right, (13, 11), 1e-4);
        for (x, y, dx, dy) in [(10, 10, 0, 0), (20, 15, 3, -2), (2, 3, 1, 1), (38, 28, -5, 0)] {
            let a = ZnccScalar::score(&plan, x, y, dx, dy);
            let b = ZnccSimd::score(&plan, x, y, dx, dy);
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }
}
