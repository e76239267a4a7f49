//! Position → transmit-domain count lookup.
//!
//! The position is clamped to the grid bounds and snapped to the nearest
//! grid line on each axis independently. No second interpolation pass.

use surfmap_common::consts::COUNT_SCALE;

use crate::map::InterpolatedGrid;

/// Count for tool position (x, y).
pub fn sample(grid: &InterpolatedGrid, x: f64, y: f64) -> i32 {
    let b = grid.bounds();
    // f64::clamp passes NaN through; nearest_index maps it to 0.
    let x = x.clamp(b.x_min as f64, b.x_max as f64);
    let y = y.clamp(b.y_min as f64, b.y_max as f64);
    let i = nearest_index(grid.x_axis(), x);
    let j = nearest_index(grid.y_axis(), y);
    to_counts(grid.offset(i, j))
}

/// Physical offset to counts, rounded and saturated.
#[inline]
pub fn to_counts(offset: f64) -> i32 {
    // `as` saturates and maps NaN to 0.
    (offset / COUNT_SCALE).round() as i32
}

/// Index of the axis value closest to `v`. Ties go to the lower index; a
/// NaN position maps to 0. `axis` must be ascending and non-empty.
pub fn nearest_index(axis: &[f64], v: f64) -> usize {
    if v.is_nan() {
        return 0;
    }
    let hi = axis.partition_point(|&a| a < v);
    if hi == 0 {
        return 0;
    }
    if hi == axis.len() {
        return axis.len() - 1;
    }
    let lo = hi - 1;
    if v - axis[lo] <= axis[hi] - v { lo } else { hi }
}
