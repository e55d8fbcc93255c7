//! Second-moment beam width estimates (ISO 11146 style D4σ).
//!
//! The D4σ width along an axis is four times the standard deviation of the
//! intensity distribution about its centroid. For a fundamental Gaussian
//! $I \propto e^{-2x^2/w^2}$ this equals $2w$, so half the D4σ width is the
//! $1/e^2$ radius.

use ndarray::Array2;
use num_complex::Complex64;

use crate::grid::SamplingGrid;

/// Intensity centroid `(x, y)` in pixel units (column, row).
///
/// Returns `None` if the total intensity is not positive.
pub fn centroid(intensity: &Array2<f64>) -> Option<(f64, f64)> {
    let total: f64 = intensity.sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let mut sx = 0.0;
    let mut sy = 0.0;
    for ((j, i), &v) in intensity.indexed_iter() {
        sx += i as f64 * v;
        sy += j as f64 * v;
    }
    Some((sx / total, sy / total))
}

/// D4σ widths `(x, y)` of an intensity map, in pixels.
///
/// Returns `(0.0, 0.0)` for an empty or all-zero map.
pub fn find_d4sigma(intensity: &Array2<f64>) -> (f64, f64) {
    let Some((cx, cy)) = centroid(intensity) else {
        return (0.0, 0.0);
    };
    let total: f64 = intensity.sum();
    let mut vx = 0.0;
    let mut vy = 0.0;
    for ((j, i), &v) in intensity.indexed_iter() {
        vx += (i as f64 - cx).powi(2) * v;
        vy += (j as f64 - cy).powi(2) * v;
    }
    (4.0 * (vx / total).sqrt(), 4.0 * (vy / total).sqrt())
}

/// Estimate the $1/e^2$ waist (m) of a sampled field from its D4σ widths.
///
/// Uses the mean of the x and y widths, halved and converted with the grid
/// pitch. Returns `None` for a field with no energy.
pub fn estimate_waist(grid: &SamplingGrid, field: &Array2<Complex64>) -> Option<f64> {
    let intensity = field.mapv(|v| v.norm_sqr());
    centroid(&intensity)?;
    let (d4x, d4y) = find_d4sigma(&intensity);
    let (dx, dy) = grid.spacing();
    let waist = 0.25 * (d4x * dx + d4y * dy);
    (waist.is_finite() && waist > 0.0).then_some(waist)
}
