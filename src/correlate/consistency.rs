//! Left/right consistency check.

use crate::correlate::search::OffsetField;
use crate::image::Rect;

/// Drops forward matches whose reverse match disagrees by more than `threshold`.
///
/// `matches` holds one forward offset per pixel of `region` (row-major, in
/// field coordinates). A match at `p` with offset `d` is kept only if the
/// reverse field has an offset `r` at `p + d` with `|d + r| <= threshold` on
/// both axes. Returns the number of dropped matches.
pub(crate) fn reject_inconsistent(
    matches: &mut [Option<(i32, i32)>],
    region: Rect,
    reverse: &OffsetField,
    threshold: f32,
) -> usize {
    let width = region.width().max(0) as usize;
    if width == 0 {
        return 0;
    }
    let mut rejected = 0;
    for (idx, slot) in matches.iter_mut().enumerate() {
        let Some((dx, dy)) = *slot else {
            continue;
        };
        let x = region.min_x + (idx % width) as i32;
        let y = region.min_y + (idx / width) as i32;
        let agrees = reverse
            .offset(x + dx, y + dy)
            .is_some_and(|(rx, ry)| {
                ((dx + rx).abs() as f32) <= threshold && ((dy + ry).abs() as f32) <= threshold
            });
        if !agrees {
            *slot = None;
            rejected += 1;
        }
    }
    rejected
}
