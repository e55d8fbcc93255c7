//! Orthogonal projection onto the Hermite-Gauss basis at a fixed waist.
//!
//! Because the 2D modes are separable, the coefficient matrix is
//!
//! $$
//! c_{mn} = \operatorname{Re} \sum_{j,i} f(x_i, y_j)\, u_m(x_i)\, u_n(y_j)\, \Delta x \Delta y
//!        = \bigl[U_y\, F\, U_x^{\mathsf T}\bigr]_{nm} \Delta x \Delta y .
//! $$
//!
//! The partial product $G = F U_x^{\mathsf T}$ is formed once per waist;
//! each `(m, n)` entry is then an independent dot product of length $N_y$,
//! dispatched through the [`ComputeBackend`].

use beamfit_compute::ComputeBackend;
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::basis::mode_table;
use crate::decomposition::DecompositionError;
use crate::grid::SamplingGrid;
use crate::types::{CoefficientMap, ModeIndex};

/// Unit-energy sampled field plus everything needed to project it.
pub struct Projector<'a> {
    x: Array1<f64>,
    y: Array1<f64>,
    cell_area: f64,
    /// Real part of the normalised field, shape `(ny, nx)`.
    field: Array2<f64>,
    m_max: usize,
    n_max: usize,
    backend: &'a dyn ComputeBackend,
}

impl<'a> Projector<'a> {
    /// # Arguments
    /// * `grid` - Grid on which `sampled` was evaluated.
    /// * `sampled` - Complex field samples, shape `(ny, nx)`.
    /// * `norm` - $\sqrt{\sum |f|^2 \Delta A}$; the field is divided by it.
    /// * `m_max`, `n_max` - Inclusive mode orders.
    /// * `backend` - Backend evaluating the per-mode dot products.
    pub fn new(
        grid: &SamplingGrid,
        sampled: &Array2<Complex64>,
        norm: f64,
        m_max: usize,
        n_max: usize,
        backend: &'a dyn ComputeBackend,
    ) -> Self {
        Self {
            x: grid.axis_x().clone(),
            y: grid.axis_y().clone(),
            cell_area: grid.cell_area(),
            field: sampled.mapv(|v| v.re / norm),
            m_max,
            n_max,
            backend,
        }
    }

    /// Largest of `m_max` and `n_max`.
    pub fn max_order(&self) -> usize {
        self.m_max.max(self.n_max)
    }

    /// Coefficient matrix of shape `(m_max + 1, n_max + 1)` at `waist`.
    ///
    /// NaN entries (from degenerate tables) are reported as zero.
    pub fn coefficients(&self, waist: f64) -> Result<Array2<f64>, DecompositionError> {
        let ux = mode_table(self.m_max, &self.x, waist);
        let uy = mode_table(self.n_max, &self.y, waist);

        // G[j, m] = sum_i F[j, i] * u_m(x_i)
        let g = self.field.dot(&ux.t());
        let area = self.cell_area;

        let fill = |m: usize, n: usize| -> f64 {
            let c = uy.row(n).dot(&g.column(m)) * area;
            if c.is_nan() {
                0.0
            } else {
                c
            }
        };

        Ok(self
            .backend
            .parallel_matrix_fill(self.m_max + 1, self.n_max + 1, &fill)?)
    }

    /// Coefficients as an ordered map (`m` outer, `n` inner).
    pub fn coefficient_map(&self, waist: f64) -> Result<CoefficientMap, DecompositionError> {
        let c = self.coefficients(waist)?;
        let mut map = CoefficientMap::with_capacity(c.len());
        for m in 0..=self.m_max {
            for n in 0..=self.n_max {
                map.push_unique(ModeIndex::new(m, n), c[[m, n]]);
            }
        }
        Ok(map)
    }

    /// Residual energy $1 - \sum c_{mn}^2$ at `waist`.
    pub fn residual(&self, waist: f64) -> Result<f64, DecompositionError> {
        let c = self.coefficients(waist)?;
        Ok(1.0 - c.iter().map(|v| v * v).sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::HermiteGaussianProfile;
    use crate::profile::GaussianProfile;
    use crate::types::Bounds;
    use approx::assert_abs_diff_eq;
    use beamfit_compute::SerialBackend;

    fn setup(m0: usize, n0: usize, w: f64) -> (SamplingGrid, Array2<Complex64>) {
        let grid = SamplingGrid::from_bounds(&Bounds::symmetric(6.0 * w), w / 20.0).unwrap();
        let mode = HermiteGaussianProfile::isotropic(w, m0, n0, 1e-6).unwrap();
        let sampled = grid.sample(&mode);
        (grid, sampled)
    }

    #[test]
    fn test_projection_picks_out_single_mode() {
        let (grid, sampled) = setup(1, 2, 1e-3);
        let norm = grid.energy(&sampled).sqrt();
        let p = Projector::new(&grid, &sampled, norm, 3, 3, &SerialBackend);
        let c = p.coefficients(1e-3).unwrap();
        assert_eq!(c.dim(), (4, 4));
        for m in 0..4 {
            for n in 0..4 {
                let expected = if (m, n) == (1, 2) { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(c[[m, n]], expected, epsilon = 1e-8);
            }
        }
        assert_abs_diff_eq!(p.residual(1e-3).unwrap(), 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_wrong_waist_leaves_residual() {
        let (grid, sampled) = setup(0, 0, 1e-3);
        let norm = grid.energy(&sampled).sqrt();
        let p = Projector::new(&grid, &sampled, norm, 0, 0, &SerialBackend);
        let exact = p.residual(1e-3).unwrap();
        let off = p.residual(1.3e-3).unwrap();
        assert!(off > exact + 1e-3);
    }

    #[test]
    fn test_map_order_is_m_then_n() {
        let (grid, sampled) = setup(0, 0, 1e-3);
        let norm = grid.energy(&sampled).sqrt();
        let p = Projector::new(&grid, &sampled, norm, 1, 2, &SerialBackend);
        let keys: Vec<(usize, usize)> = p
            .coefficient_map(1e-3)
            .unwrap()
            .keys()
            .map(|k| (k.m, k.n))
            .collect();
        assert_eq!(keys, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn test_coefficient_map_matches_table() {
        let grid = SamplingGrid::from_bounds(&Bounds::symmetric(3e-3), 3e-5).unwrap();
        let sampled = grid.sample(&GaussianProfile::new(6e-4, 1.0).unwrap());
        let norm = grid.energy(&sampled).sqrt();
        let p = Projector::new(&grid, &sampled, norm, 6, 5, &SerialBackend);
        let table = p.coefficients(7e-4).unwrap();
        let map = p.coefficient_map(7e-4).unwrap();

        assert_eq!(map.len(), 7 * 6);
        for (idx, value) in map.iter() {
            assert_eq!(value, table[[idx.m, idx.n]]);
        }
    }
}
