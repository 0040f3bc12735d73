//! Integer helpers for pyramid-level coordinate scaling.

/// Divides by `2^level`, rounding toward negative infinity.
pub(crate) fn floor_div_pow2(value: i32, level: usize) -> i32 {
    value >> level
}

/// Divides by `2^level`, rounding toward positive infinity.
pub(crate) fn ceil_div_pow2(value: i32, level: usize) -> i32 {
    -((-value) >> level)
}

/// Size of a dimension after `level` halvings, rounding up.
pub(crate) fn level_extent(extent: usize, level: usize) -> usize {
    let mut out = extent;
    for _ in 0..level {
        out = out.div_ceil(2);
    }
    out
}
