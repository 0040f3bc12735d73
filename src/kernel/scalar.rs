//! Scalar reference kernel.

use crate::image::ImageF32;
use crate::kernel::{Kernel, Overlap};

/// Scalar ZNCC kernel.
pub struct ZnccScalar;

impl Kernel for ZnccScalar {
    fn dot(left: &ImageF32, right: &ImageF32, overlap: &Overlap) -> f64 {
        let w = overlap.width;
        let mut dot = 0.0f64;
        for j in 0..overlap.height {
            let l = &left.row(overlap.left_y + j)[overlap.left_x..overlap.left_x + w];
            let r = &right.row(overlap.right_y + j)[overlap.right_x..overlap.right_x + w];
            let mut row = 0.0f32;
            for (&a, &b) in l.iter().zip(r) {
                row += a * b;
            }
            dot += row as f64;
        }
        dot
    }
}
