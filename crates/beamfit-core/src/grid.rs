//! Uniform Cartesian sampling grid used for numerical integration.
//!
//! The grid is centred on the domain centre and has pitch exactly equal to
//! the requested resolution. Each axis has an even number of points,
//! $N = 2\lfloor L / 2h \rfloor + 2$, placed symmetrically about the centre,
//! so the sampled window always covers the whole domain.
//!
//! Integrals are evaluated with the rectangle rule,
//! $\int f \, dA \approx \sum_{ij} f_{ij}\, \Delta x\, \Delta y$, which is
//! spectrally accurate for the rapidly decaying Hermite-Gauss modes.

use ndarray::{Array1, Array2, Zip};
use num_complex::Complex64;

use crate::decomposition::DecompositionError;
use crate::profile::TransverseProfile;
use crate::types::Bounds;

/// Upper limit on the number of grid cells, to catch unit mistakes
/// (e.g. a resolution given in microns against bounds in metres).
pub const MAX_GRID_POINTS: usize = 64_000_000;

/// A uniform grid in the transverse plane.
#[derive(Debug, Clone)]
pub struct SamplingGrid {
    x: Array1<f64>,
    y: Array1<f64>,
    dx: f64,
    dy: f64,
}

impl SamplingGrid {
    /// Build the grid covering `bounds` at pitch `resolution` (m).
    pub fn from_bounds(bounds: &Bounds, resolution: f64) -> Result<Self, DecompositionError> {
        bounds.validate()?;
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(DecompositionError::InvalidParameter(format!(
                "Grid resolution must be positive and finite, got {resolution}"
            )));
        }

        let [ex, ey] = bounds.extent();
        let nx = Self::points_for(ex, resolution);
        let ny = Self::points_for(ey, resolution);
        if nx.saturating_mul(ny) > MAX_GRID_POINTS {
            return Err(DecompositionError::InvalidParameter(format!(
                "Grid of {}x{} points at resolution {:.3e} exceeds the limit of {} points",
                nx, ny, resolution, MAX_GRID_POINTS
            )));
        }

        let [cx, cy] = bounds.centre();
        Ok(Self {
            x: Self::axis(cx, nx, resolution),
            y: Self::axis(cy, ny, resolution),
            dx: resolution,
            dy: resolution,
        })
    }

    fn points_for(extent: f64, resolution: f64) -> usize {
        let half_steps = (extent / (2.0 * resolution)).floor();
        if half_steps >= (MAX_GRID_POINTS / 2) as f64 {
            return MAX_GRID_POINTS;
        }
        half_steps as usize * 2 + 2
    }

    fn axis(centre: f64, n: usize, step: f64) -> Array1<f64> {
        let half = 0.5 * (n - 1) as f64 * step;
        Array1::from_shape_fn(n, |i| centre - half + i as f64 * step)
    }

    pub fn axis_x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn axis_y(&self) -> &Array1<f64> {
        &self.y
    }

    /// `(ny, nx)`, the shape of sampled arrays.
    pub fn dim(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    pub fn spacing(&self) -> (f64, f64) {
        (self.dx, self.dy)
    }

    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    /// Sample a profile on the grid. Row index = y, column index = x.
    pub fn sample(&self, profile: &dyn TransverseProfile) -> Array2<Complex64> {
        let mut out = Array2::<Complex64>::zeros(self.dim());
        for (j, &y) in self.y.iter().enumerate() {
            for (i, &x) in self.x.iter().enumerate() {
                out[[j, i]] = profile.evaluate(x, y);
            }
        }
        out
    }

    /// Discrete energy $\sum |f|^2 \Delta x \Delta y$.
    pub fn energy(&self, field: &Array2<Complex64>) -> f64 {
        field.iter().map(|v| v.norm_sqr()).sum::<f64>() * self.cell_area()
    }

    /// Discrete inner product $\sum \bar{a}\, b\, \Delta x \Delta y$.
    pub fn inner_product(&self, a: &Array2<Complex64>, b: &Array2<Complex64>) -> Complex64 {
        let mut acc = Complex64::new(0.0, 0.0);
        Zip::from(a).and(b).for_each(|&ai, &bi| acc += ai.conj() * bi);
        acc * self.cell_area()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::GaussianProfile;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_grid_is_centred_with_exact_pitch() {
        let bounds = Bounds::new([-1.0, 2.0], [3.0, 4.0]);
        let grid = SamplingGrid::from_bounds(&bounds, 0.25).unwrap();
        let x = grid.axis_x();
        let y = grid.axis_y();

        // 4 / 0.5 = 8 half steps -> 18 points; 2 / 0.5 = 4 -> 10 points
        assert_eq!(grid.dim(), (10, 18));
        assert_abs_diff_eq!(x[1] - x[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(0.5 * (x[0] + x[x.len() - 1]), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(0.5 * (y[0] + y[y.len() - 1]), 3.0, epsilon = 1e-12);
        // Window covers the domain.
        assert!(x[0] <= -1.0 && x[x.len() - 1] >= 3.0);
        assert!(y[0] <= 2.0 && y[y.len() - 1] >= 4.0);
    }

    #[test]
    fn test_coarse_resolution_still_two_points() {
        let grid = SamplingGrid::from_bounds(&Bounds::symmetric(1.0), 10.0).unwrap();
        assert_eq!(grid.dim(), (2, 2));
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let b = Bounds::symmetric(1.0);
        assert!(SamplingGrid::from_bounds(&b, 0.0).is_err());
        assert!(SamplingGrid::from_bounds(&b, -1.0).is_err());
        assert!(SamplingGrid::from_bounds(&b, f64::INFINITY).is_err());
        assert!(SamplingGrid::from_bounds(&b, 1e-9).is_err());
    }

    #[test]
    fn test_rejects_bad_domain() {
        let flat = Bounds::new([0.0, 0.0], [1.0, -1.0]);
        assert!(matches!(
            SamplingGrid::from_bounds(&flat, 0.1),
            Err(DecompositionError::InvalidDomain(_))
        ));
    }

    #[test]
    fn test_gaussian_energy() {
        // |A exp(-r^2/w^2)|^2 integrates to A^2 * pi * w^2 / 2
        let w = 1.0;
        let grid = SamplingGrid::from_bounds(&Bounds::symmetric(6.0), 0.05).unwrap();
        let field = grid.sample(&GaussianProfile::new(w, 2.0).unwrap());
        let expected = 4.0 * std::f64::consts::PI * w * w / 2.0;
        assert_abs_diff_eq!(grid.energy(&field), expected, epsilon = 1e-9);
        assert_abs_diff_eq!(grid.inner_product(&field, &field).re, expected, epsilon = 1e-9);
    }
}
