//! Coarse-to-fine offset search over a tile pyramid.
//!
//! The coarsest level is searched exhaustively over the level-scaled range.
//! Every finer pixel then searches only the bounding box of its parents'
//! doubled offsets (3x3 parent neighborhood), grown by the refine radius and
//! clipped to the level range. Pixels without a valid parent stay empty.

use crate::correlate::{CorrelatorConfig, Disparity, DisparityMap};
use crate::image::{ImageF32, Rect};
use crate::kernel::{Kernel, ScorePlan};
use crate::trace::trace_span;
use crate::util::math::{ceil_div_pow2, floor_div_pow2};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(not(feature = "simd"))]
use crate::kernel::scalar::ZnccScalar as Zncc;
#[cfg(feature = "simd")]
use crate::kernel::simd::ZnccSimd as Zncc;

/// Best integer offset per pixel of one pyramid level.
#[derive(Clone, Debug)]
pub(crate) struct OffsetField {
    width: usize,
    height: usize,
    offsets: Vec<Option<(i32, i32)>>,
    scores: Vec<f32>,
}

impl OffsetField {
    pub(crate) fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            offsets: vec![None; width * height],
            scores: vec![f32::NEG_INFINITY; width * height],
        }
    }

    pub(crate) fn set(&mut self, x: usize, y: usize, offset: (i32, i32), score: f32) {
        let idx = y * self.width + x;
        self.offsets[idx] = Some(offset);
        self.scores[idx] = score;
    }

    /// Offset at `(x, y)`; `None` outside the field or where no match was found.
    pub(crate) fn offset(&self, x: i32, y: i32) -> Option<(i32, i32)> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        self.offsets[y as usize * self.width + x as usize]
    }

    pub(crate) fn score(&self, x: usize, y: usize) -> f32 {
        self.scores[y * self.width + x]
    }

    /// Copies `region` out as a disparity map.
    pub(crate) fn to_disparity(&self, region: Rect) -> DisparityMap {
        let width = region.width().max(0) as usize;
        let height = region.height().max(0) as usize;
        let mut data = Vec::with_capacity(width * height);
        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                data.push(match self.offset(x, y) {
                    Some((dx, dy)) => Disparity::new(dx as f32, dy as f32),
                    None => Disparity::MISSING,
                });
            }
        }
        DisparityMap::from_parts(width, height, data)
    }
}

/// Offset range scaled to pyramid `level`, rounding outward.
pub(crate) fn level_range(range: Rect, level: usize) -> Rect {
    Rect::from_corners(
        floor_div_pow2(range.min_x, level),
        floor_div_pow2(range.min_y, level),
        ceil_div_pow2(range.max_x - 1, level) + 1,
        ceil_div_pow2(range.max_y - 1, level) + 1,
    )
}

/// Pixel region scaled to pyramid `level` and clipped to its extent.
fn level_region(region: Rect, level: usize, width: usize, height: usize) -> Rect {
    Rect::from_corners(
        floor_div_pow2(region.min_x, level),
        floor_div_pow2(region.min_y, level),
        ceil_div_pow2(region.max_x, level),
        ceil_div_pow2(region.max_y, level),
    )
    .intersect(&Rect::of_size(width, height))
}

/// Searches `left` against `right` through all levels, coarsest first.
///
/// `region` lists the level-0 pixels to match; `on_level` sees each finished
/// level. Returns the level-0 field.
pub(crate) fn pyramid_search(
    left: &[ImageF32],
    right: &[ImageF32],
    range: Rect,
    region: Rect,
    config: &CorrelatorConfig,
    on_level: &mut dyn FnMut(usize, &OffsetField, Rect),
) -> OffsetField {
    let mut parent: Option<OffsetField> = None;
    for level in (0..left.len()).rev() {
        let l = &left[level];
        let r = &right[level];
        let lrange = level_range(range, level);
        let lregion = level_region(region, level, l.width(), l.height());
        let _span = trace_span!("level_search", level = level, pixels = lregion.area()).entered();

        let plan = ScorePlan::new(l, r, config.kernel_size, config.min_variance);
        let field = search_level(&plan, lregion, lrange, parent.as_ref(), config.refine_radius);
        on_level(level, &field, lregion);
        parent = Some(field);
    }
    parent.unwrap_or_else(|| OffsetField::empty(0, 0))
}

fn search_level(
    plan: &ScorePlan<'_>,
    region: Rect,
    range: Rect,
    parent: Option<&OffsetField>,
    refine_radius: i32,
) -> OffsetField {
    let mut field = OffsetField::empty(plan.width(), plan.height());
    if region.is_empty() {
        return field;
    }

    let search_row = |y: i32| -> Vec<Option<(i32, i32, f32)>> {
        (region.min_x..region.max_x)
            .map(|x| {
                let window = match parent {
                    None => range,
                    Some(p) => candidate_window(p, x, y, refine_radius)?.intersect(&range),
                };
                best_offset(plan, x, y, window)
            })
            .collect()
    };

    #[cfg(feature = "rayon")]
    let rows: Vec<Vec<Option<(i32, i32, f32)>>> = (region.min_y..region.max_y)
        .into_par_iter()
        .map(search_row)
        .collect();
    #[cfg(not(feature = "rayon"))]
    let rows: Vec<Vec<Option<(i32, i32, f32)>>> =
        (region.min_y..region.max_y).map(search_row).collect();

    for (row, y) in rows.into_iter().zip(region.min_y..) {
        for (best, x) in row.into_iter().zip(region.min_x..) {
            if let Some((dx, dy, score)) = best {
                field.set(x as usize, y as usize, (dx, dy), score);
            }
        }
    }
    field
}

/// Doubled parent offsets around `(x, y)`, as an offset box grown by `radius`.
fn candidate_window(parent: &OffsetField, x: i32, y: i32, radius: i32) -> Option<Rect> {
    let (px, py) = (x >> 1, y >> 1);
    let mut bounds: Option<Rect> = None;
    for j in -1..=1 {
        for i in -1..=1 {
            let Some((dx, dy)) = parent.offset(px + i, py + j) else {
                continue;
            };
            let (dx, dy) = (2 * dx, 2 * dy);
            bounds = Some(match bounds {
                None => Rect::from_corners(dx, dy, dx + 1, dy + 1),
                Some(b) => Rect::from_corners(
                    b.min_x.min(dx),
                    b.min_y.min(dy),
                    b.max_x.max(dx + 1),
                    b.max_y.max(dy + 1),
                ),
            });
        }
    }
    bounds.map(|b| b.grow(radius, radius))
}

/// Highest-scoring offset in `window`; ties keep the first in row-major order.
fn best_offset(plan: &ScorePlan<'_>, x: i32, y: i32, window: Rect) -> Option<(i32, i32, f32)> {
    let mut best: Option<(i32, i32, f32)> = None;
    for dy in window.min_y..window.max_y {
        for dx in window.min_x..window.max_x {
            let score = Zncc::score(plan, x, y, dx, dy);
            if score == f32::NEG_INFINITY {
                continue;
            }
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((dx, dy, score));
            }
        }
    }
    best
}

/// Score of a single placement with the active kernel.
pub(crate) fn score_at(plan: &ScorePlan<'_>, x: i32, y: i32, dx: i32, dy: i32) -> f32 {
    Zncc::score(plan, x, y, dx, dy)
}

#[cfg(test)]
mod tests {
    use super::{candidate_window, level_range, OffsetField};
    use crate::image::Rect;

    #[test]
    fn level_range_rounds_outward() {
        let range = Rect::new(-5, -3, 11, 4);
        assert_eq!(level_range(range, 0), range);
        assert_eq!(level_range(range, 1), Rect::from_corners(-3, -2, 4, 1));
        assert_eq!(level_range(range, 2), Rect::from_corners(-2, -1, 3, 1));
    }

    #[test]
    fn candidates_span_doubled_parent_offsets() {
        let mut parent = OffsetField::empty(4, 4);
        parent.set(1, 1, (2, -1), 0.8);
        parent.set(2, 2, (3, 0), 0.8);
        let window = candidate_window(&parent, 3, 3, 1).unwrap();
        assert_eq!(window, Rect::from_corners(3, -3, 8, 2));
        assert!(candidate_window(&parent, 7, 0, 1).is_none());
    }
}
