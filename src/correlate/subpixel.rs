//! Sub-pixel refinement of integer matches.
//!
//! With both axes enabled, a full quadric (including the cross term) is fit
//! to the 3x3 score neighborhood of the integer optimum; a single enabled
//! axis uses a parabola through the optimum and its two neighbors. The affine
//! refinement fits a local warp of the kernel window with the least-squares
//! solver, starting at the integer match.

use crate::correlate::search::score_at;
use crate::image::ImageF32;
use crate::kernel::ScorePlan;
use crate::optimize::{levenberg_marquardt, LeastSquaresModel, LmConfig};
use crate::util::{CorrStereoError, CorrStereoResult};
use nalgebra::{DMatrix, DVector};

/// Estimates the sub-sample peak offset for a quadratic fit.
///
/// Given samples at `x = -1, 0, +1` (`fm`, `f0`, `fp`), this returns the peak
/// offset `dx` in `[-1, 1]` when the fitted parabola is concave and stable.
pub fn quad_peak_offset_1d(fm: f32, f0: f32, fp: f32) -> Option<f32> {
    if !fm.is_finite() || !f0.is_finite() || !fp.is_finite() {
        return None;
    }

    let denom = fm - 2.0 * f0 + fp;
    if denom.abs() < 1e-6 || denom >= 0.0 {
        return None;
    }

    let dx = 0.5 * (fm - fp) / denom;
    if dx.is_finite() && dx.abs() <= 1.0 {
        Some(dx)
    } else {
        None
    }
}

/// Peak offset of the least-squares quadric through a 3x3 score patch.
///
/// `s[row][col]` holds the score at offset `(col - 1, row - 1)`. Unlike two
/// separable parabolas, the fit keeps the `xy` term, so peaks of elongated,
/// rotated score surfaces are not biased toward the integer row or column.
/// Returns `None` unless the quadric has a maximum within one sample of the
/// center.
pub fn quad_peak_offset_2d(s: [[f32; 3]; 3]) -> Option<(f32, f32)> {
    let (mut gx, mut gy, mut cross) = (0.0f64, 0.0f64, 0.0f64);
    let (mut side_x, mut mid_x, mut side_y, mut mid_y) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for (row, values) in s.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return None;
            }
            let (u, v, f) = (col as f64 - 1.0, row as f64 - 1.0, value as f64);
            gx += u * f;
            gy += v * f;
            cross += u * v * f;
            if col == 1 {
                mid_x += f;
            } else {
                side_x += f;
            }
            if row == 1 {
                mid_y += f;
            } else {
                side_y += f;
            }
        }
    }
    // f = c + bx u + by v + axx u^2 + axy u v + ayy v^2
    let (bx, by, axy) = (gx / 6.0, gy / 6.0, cross / 4.0);
    let axx = side_x / 6.0 - mid_x / 3.0;
    let ayy = side_y / 6.0 - mid_y / 3.0;

    let (hxx, hyy) = (2.0 * axx, 2.0 * ayy);
    let det = hxx * hyy - axy * axy;
    if hxx >= 0.0 || det <= 1e-12 {
        return None;
    }
    let dx = (axy * by - hyy * bx) / det;
    let dy = (axy * bx - hxx * by) / det;
    if dx.is_finite() && dy.is_finite() && dx.abs() <= 1.0 && dy.abs() <= 1.0 {
        Some((dx as f32, dy as f32))
    } else {
        None
    }
}

/// Score-surface refinement of the integer match `(dx, dy)` at pixel `(x, y)`.
///
/// Both axes enabled: 2D quadric fit, falling back to per-axis parabolas
/// when the patch is incomplete or not a clear maximum. Axes whose fit is
/// rejected keep their integer value.
pub(crate) fn parabola_refine(
    plan: &ScorePlan<'_>,
    x: i32,
    y: i32,
    (dx, dy): (i32, i32),
    horizontal: bool,
    vertical: bool,
) -> (f32, f32) {
    let mut out = (dx as f32, dy as f32);
    if horizontal && vertical {
        let mut patch = [[0.0f32; 3]; 3];
        for (j, row) in patch.iter_mut().enumerate() {
            for (i, score) in row.iter_mut().enumerate() {
                *score = score_at(plan, x, y, dx + i as i32 - 1, dy + j as i32 - 1);
            }
        }
        if let Some((ox, oy)) = quad_peak_offset_2d(patch) {
            return (out.0 + ox, out.1 + oy);
        }
    }
    let f0 = score_at(plan, x, y, dx, dy);
    if horizontal {
        let fm = score_at(plan, x, y, dx - 1, dy);
        let fp = score_at(plan, x, y, dx + 1, dy);
        if let Some(off) = quad_peak_offset_1d(fm, f0, fp) {
            out.0 += off;
        }
    }
    if vertical {
        let fm = score_at(plan, x, y, dx, dy - 1);
        let fp = score_at(plan, x, y, dx, dy + 1);
        if let Some(off) = quad_peak_offset_1d(fm, f0, fp) {
            out.1 += off;
        }
    }
    out
}

/// Kernel window of the right tile under a six-parameter affine warp.
///
/// Parameters are `(dx, dy, a, b, c, d)`: window offset `(u, v)` around the
/// pixel maps to `(x + u + dx + a u + b v, y + v + dy + c u + d v)`. Predicted
/// samples are normalized to zero mean and unit variance, matching the
/// normalized left window used as the observation. Sampling and the Jacobian
/// are evaluated in `f64` from the bilinear interpolant.
struct AffineWindow<'a> {
    right: &'a ImageF32,
    center: (f64, f64),
    taps: Vec<(f64, f64)>,
}

impl AffineWindow<'_> {
    /// Value and image gradient at every warped tap.
    fn warped(&self, p: &DVector<f64>) -> CorrStereoResult<Vec<(f64, f64, f64)>> {
        let (cx, cy) = self.center;
        self.taps
            .iter()
            .map(|&(u, v)| {
                let sx = cx + u + p[0] + p[2] * u + p[3] * v;
                let sy = cy + v + p[1] + p[4] * u + p[5] * v;
                bilinear_with_gradient(self.right, sx, sy).ok_or(CorrStereoError::Unsupported {
                    capability: "affine window sampling outside the tile",
                })
            })
            .collect()
    }
}

impl LeastSquaresModel for AffineWindow<'_> {
    fn evaluate(&self, p: &DVector<f64>) -> CorrStereoResult<DVector<f64>> {
        let mut samples: Vec<f64> = self.warped(p)?.iter().map(|s| s.0).collect();
        normalize(&mut samples).ok_or(CorrStereoError::Unsupported {
            capability: "affine window without texture",
        })?;
        Ok(DVector::from_vec(samples))
    }

    /// Chain rule through the warp and the normalization:
    /// `dz_i = (ds_i - mean(ds) - z_i mean(z ds)) / sigma`.
    fn jacobian(&self, p: &DVector<f64>) -> CorrStereoResult<DMatrix<f64>> {
        let warped = self.warped(p)?;
        let mut z: Vec<f64> = warped.iter().map(|s| s.0).collect();
        let sigma = normalize(&mut z).ok_or(CorrStereoError::Unsupported {
            capability: "affine window without texture",
        })?;

        let raw: Vec<[f64; 6]> = warped
            .iter()
            .zip(&self.taps)
            .map(|(&(_, gx, gy), &(u, v))| [gx, gy, gx * u, gx * v, gy * u, gy * v])
            .collect();
        let n = raw.len() as f64;
        let mut jac = DMatrix::zeros(raw.len(), 6);
        for k in 0..6 {
            let mean = raw.iter().map(|r| r[k]).sum::<f64>() / n;
            let spread = raw.iter().zip(&z).map(|(r, zi)| r[k] * zi).sum::<f64>() / n;
            for (i, (r, zi)) in raw.iter().zip(&z).enumerate() {
                jac[(i, k)] = (r[k] - mean - zi * spread) / sigma;
            }
        }
        Ok(jac)
    }
}

/// Bilinear value and its `(d/dx, d/dy)` at `(x, y)`, `None` outside the tile.
///
/// On cell borders the gradient is taken from the cell to the lower right.
fn bilinear_with_gradient(img: &ImageF32, x: f64, y: f64) -> Option<(f64, f64, f64)> {
    let (w, h) = (img.width(), img.height());
    if w < 2 || h < 2 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }
    let x0 = (x.floor() as usize).min(w - 2);
    let y0 = (y.floor() as usize).min(h - 2);
    let (fx, fy) = (x - x0 as f64, y - y0 as f64);
    let p00 = img.at(x0, y0) as f64;
    let p10 = img.at(x0 + 1, y0) as f64;
    let p01 = img.at(x0, y0 + 1) as f64;
    let p11 = img.at(x0 + 1, y0 + 1) as f64;

    let top = p00 + (p10 - p00) * fx;
    let bottom = p01 + (p11 - p01) * fx;
    let value = top + (bottom - top) * fy;
    let gx = (p10 - p00) * (1.0 - fy) + (p11 - p01) * fy;
    let gy = bottom - top;
    Some((value, gx, gy))
}

/// Zero-mean, unit-variance normalization returning the standard deviation;
/// `None` for flat windows.
fn normalize(values: &mut [f64]) -> Option<f64> {
    let n = values.len() as f64;
    if n == 0.0 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    if var <= 1e-12 {
        return None;
    }
    let sigma = var.sqrt();
    for v in values.iter_mut() {
        *v = (*v - mean) / sigma;
    }
    Some(sigma)
}

/// Affine refinement of the match at `(x, y)` starting from integer `init`.
///
/// The left kernel window must lie inside the tile. Fails with
/// `ConvergenceFailure` when the solver gives up, and with `Unsupported` when
/// the window cannot be evaluated; callers fall back to the parabola estimate.
pub(crate) fn affine_refine(
    left: &ImageF32,
    right: &ImageF32,
    (x, y): (usize, usize),
    init: (i32, i32),
    kernel: (usize, usize),
    lm: &LmConfig,
) -> CorrStereoResult<(f32, f32)> {
    let (hx, hy) = (kernel.0 / 2, kernel.1 / 2);
    if x < hx || y < hy || x - hx + kernel.0 > left.width() || y - hy + kernel.1 > left.height() {
        return Err(CorrStereoError::Unsupported {
            capability: "affine window outside the tile",
        });
    }

    let mut observed = Vec::with_capacity(kernel.0 * kernel.1);
    let mut taps = Vec::with_capacity(kernel.0 * kernel.1);
    for v in 0..kernel.1 {
        for u in 0..kernel.0 {
            observed.push(left.at(x - hx + u, y - hy + v) as f64);
            taps.push((u as f64 - hx as f64, v as f64 - hy as f64));
        }
    }
    normalize(&mut observed).ok_or(CorrStereoError::Unsupported {
        capability: "affine window without texture",
    })?;

    let model = AffineWindow {
        right,
        center: (x as f64, y as f64),
        taps,
    };
    let initial = DVector::from_vec(vec![init.0 as f64, init.1 as f64, 0.0, 0.0, 0.0, 0.0]);
    let solution = levenberg_marquardt(&model, &initial, &DVector::from_vec(observed), lm)?;
    Ok((solution.params[0] as f32, solution.params[1] as f32))
}
