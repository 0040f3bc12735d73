//! Area-correlation scoring kernels.
//!
//! Scores are zero-mean normalized cross-correlation (ZNCC) between the kernel
//! window around a left-tile pixel and the window displaced by `(dx, dy)` in
//! the right tile. Window sums come from `f64` integral images in a
//! per-level `ScorePlan`; only the cross term is accumulated per placement,
//! which is what the scalar and SIMD kernels implement.
//!
//! Windows that run past the tile are clipped to the part where both windows
//! are inside. Placements keeping less than half of the kernel area, or whose
//! windows are flatter than the variance floor, score `NEG_INFINITY`.

use crate::image::ImageF32;

/// Summed-area tables of values and squared values.
#[derive(Clone, Debug)]
pub struct IntegralImage {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImage {
    pub fn new(image: &ImageF32) -> Self {
        let width = image.width();
        let height = image.height();
        let stride = width + 1;
        let mut sum = vec![0.0f64; stride * (height + 1)];
        let mut sum_sq = vec![0.0f64; stride * (height + 1)];
        for y in 0..height {
            let row = image.row(y);
            let mut acc = 0.0f64;
            let mut acc_sq = 0.0f64;
            for (x, &v) in row.iter().enumerate() {
                let v = v as f64;
                acc += v;
                acc_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + acc;
                sum_sq[idx] = sum_sq[idx - stride] + acc_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    /// Sum and sum of squares over `[x, x + w) x [y, y + h)`.
    #[inline]
    pub fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let a = y * s + x;
        let b = y * s + x + w;
        let c = (y + h) * s + x;
        let d = (y + h) * s + x + w;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }
}

/// Clipped pair of windows: top-left corners in each tile plus shared size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlap {
    pub left_x: usize,
    pub left_y: usize,
    pub right_x: usize,
    pub right_y: usize,
    pub width: usize,
    pub height: usize,
}

impl Overlap {
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Per-level scoring state for a pair of equally sized tiles.
pub struct ScorePlan<'a> {
    left: &'a ImageF32,
    right: &'a ImageF32,
    left_sums: IntegralImage,
    right_sums: IntegralImage,
    kernel: (usize, usize),
    min_area: usize,
    min_variance: f64,
}

impl<'a> ScorePlan<'a> {
    /// Builds the plan; both tiles must share the same extent.
    pub fn new(
        left: &'a ImageF32,
        right: &'a ImageF32,
        kernel: (usize, usize),
        min_variance: f32,
    ) -> Self {
        debug_assert_eq!(
            (left.width(), left.height()),
            (right.width(), right.height())
        );
        Self {
            left,
            right,
            left_sums: IntegralImage::new(left),
            right_sums: IntegralImage::new(right),
            kernel,
            min_area: ((kernel.0 * kernel.1) / 2).max(1),
            min_variance: min_variance.max(0.0) as f64,
        }
    }

    pub fn left(&self) -> &ImageF32 {
        self.left
    }

    pub fn right(&self) -> &ImageF32 {
        self.right
    }

    pub fn width(&self) -> usize {
        self.left.width()
    }

    pub fn height(&self) -> usize {
        self.left.height()
    }

    /// Clipped windows for left pixel `(x, y)` displaced by `(dx, dy)`.
    pub fn overlap(&self, x: i32, y: i32, dx: i32, dy: i32) -> Option<Overlap> {
        let (lx, rx, width) = clip_axis(x, dx, self.kernel.0, self.width())?;
        let (ly, ry, height) = clip_axis(y, dy, self.kernel.1, self.height())?;
        let overlap = Overlap {
            left_x: lx,
            left_y: ly,
            right_x: rx,
            right_y: ry,
            width,
            height,
        };
        (overlap.area() >= self.min_area).then_some(overlap)
    }

    /// ZNCC from the cross term `dot` of `overlap`.
    pub fn zncc(&self, overlap: &Overlap, dot: f64) -> f32 {
        let n = overlap.area() as f64;
        let (sl, sl2) = self.left_sums.window(
            overlap.left_x,
            overlap.left_y,
            overlap.width,
            overlap.height,
        );
        let (sr, sr2) = self.right_sums.window(
            overlap.right_x,
            overlap.right_y,
            overlap.width,
            overlap.height,
        );
        let var_l = sl2 - sl * sl / n;
        let var_r = sr2 - sr * sr / n;
        let floor = self.min_variance * n;
        if var_l <= floor || var_r <= floor {
            return f32::NEG_INFINITY;
        }
        let score = (dot - sl * sr / n) / (var_l * var_r).sqrt();
        if score.is_finite() {
            score.clamp(-1.0, 1.0) as f32
        } else {
            f32::NEG_INFINITY
        }
    }
}

/// Clips one axis of the window pair. Returns `(left_start, right_start, len)`.
fn clip_axis(p: i32, d: i32, kernel: usize, extent: usize) -> Option<(usize, usize, usize)> {
    let half = (kernel / 2) as i32;
    let k = kernel as i32;
    let n = extent as i32;
    let l0 = p - half;
    let r0 = p + d - half;
    let lo = 0.max(-l0).max(-r0);
    let hi = k.min(n - l0).min(n - r0);
    if hi <= lo {
        return None;
    }
    Some(((l0 + lo) as usize, (r0 + lo) as usize, (hi - lo) as usize))
}

/// Kernel computing the cross term of a window pair.
pub trait Kernel {
    /// Sum of `left * right` over the overlapping windows.
    fn dot(left: &ImageF32, right: &ImageF32, overlap: &Overlap) -> f64;

    /// ZNCC score at left pixel `(x, y)` for displacement `(dx, dy)`.
    #[inline]
    fn score(plan: &ScorePlan<'_>, x: i32, y: i32, dx: i32, dy: i32) -> f32 {
        match plan.overlap(x, y, dx, dy) {
            Some(overlap) => plan.zncc(&overlap, Self::dot(plan.left, plan.right, &overlap)),
            None => f32::NEG_INFINITY,
        }
    }
}

pub mod scalar;

#[cfg(feature = "simd")]
pub mod simd;
