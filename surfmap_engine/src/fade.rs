//! Height-based attenuation of the compensation output.

/// Fade factor in [0, 1] for tool height `z` and fade threshold `fade`.
///
/// `fade == 0` disables fading. Below the threshold the factor falls off
/// linearly from 1 at `z = 0` to 0 at `z = fade`; at or above it, 0.
#[inline]
pub fn factor(z: f64, fade: f64) -> f64 {
    if fade == 0.0 {
        return 1.0;
    }
    if z < fade {
        ((fade - z) / fade).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Apply the fade factor to a count, rounding to nearest.
#[inline]
pub fn apply(counts: i32, factor: f64) -> i32 {
    (factor * counts as f64).round() as i32
}
