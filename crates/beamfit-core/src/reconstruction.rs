//! Field reconstruction from a coefficient map.
//!
//! $$
//! E(x, y) \approx \sum_{(m,n)} c_{mn}\, u_m(x; w)\, u_n(y; w)
//! $$
//!
//! Dropping terms from the map trades fidelity for noise rejection; the
//! energy given up is $1 - \sum c_{mn}^2$.

use num_complex::Complex64;

use crate::basis::HermiteGaussianProfile;
use crate::decomposition::DecompositionError;
use crate::grid::SamplingGrid;
use crate::profile::TransverseProfile;
use crate::types::{Bounds, CoefficientMap, Decomposition};

/// Weighted sum of Hermite-Gauss modes.
#[derive(Debug, Clone, Default)]
pub struct CombinedProfile {
    terms: Vec<(f64, HermiteGaussianProfile)>,
    bounds: Option<Bounds>,
}

impl CombinedProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `weight * mode`.
    pub fn add(mut self, weight: f64, mode: HermiteGaussianProfile) -> Self {
        self.terms.push((weight, mode));
        self
    }

    /// Declare the spatial domain of the reconstruction.
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Multiply every weight by `factor`.
    pub fn scaled(mut self, factor: f64) -> Self {
        for (weight, _) in &mut self.terms {
            *weight *= factor;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[(f64, HermiteGaussianProfile)] {
        &self.terms
    }

    /// Sum of the paraxial modes at distance `z` from focus.
    pub fn evaluate_at(&self, x: f64, y: f64, z: f64) -> Complex64 {
        self.terms
            .iter()
            .map(|(weight, mode)| *weight * mode.evaluate_at(x, y, z))
            .sum()
    }
}

impl TransverseProfile for CombinedProfile {
    fn evaluate(&self, x: f64, y: f64) -> Complex64 {
        self.terms
            .iter()
            .map(|(weight, mode)| *weight * mode.evaluate(x, y))
            .sum()
    }

    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }
}

/// Build $\sum c_{mn}\, u_{mn}$ at a shared waist.
///
/// # Arguments
/// * `coefficients` - Mode weights (any subset of modes, in any order).
/// * `waist` - Waist of every basis mode (m).
/// * `wavelength` - Wavelength of the basis (m).
pub fn reconstruct(
    coefficients: &CoefficientMap,
    waist: f64,
    wavelength: f64,
) -> Result<CombinedProfile, DecompositionError> {
    coefficients
        .iter()
        .try_fold(CombinedProfile::new(), |acc, (idx, c)| {
            let mode = HermiteGaussianProfile::isotropic(waist, idx.m, idx.n, wavelength)?;
            Ok(acc.add(c, mode))
        })
}

/// Energy not captured by the retained modes, $\max(0, 1 - \sum c^2)$.
pub fn energy_loss(coefficients: &CoefficientMap) -> f64 {
    (1.0 - coefficients.energy()).max(0.0)
}

/// Normalised overlap $|\langle f, g \rangle|^2 / (\|f\|^2 \|g\|^2)$ on `grid`.
///
/// 1 for fields equal up to a constant factor, 0 for orthogonal fields or if
/// either field vanishes on the grid.
pub fn fidelity(grid: &SamplingGrid, original: &dyn TransverseProfile, reconstructed: &dyn TransverseProfile) -> f64 {
    let f = grid.sample(original);
    let g = grid.sample(reconstructed);
    let ef = grid.energy(&f);
    let eg = grid.energy(&g);
    if ef <= 0.0 || eg <= 0.0 {
        return 0.0;
    }
    grid.inner_product(&f, &g).norm_sqr() / (ef * eg)
}

impl Decomposition {
    /// Unit-energy reconstruction from all coefficients.
    pub fn reconstruction(&self) -> Result<CombinedProfile, DecompositionError> {
        reconstruct(&self.coefficients, self.waist, self.wavelength)
    }

    /// Reconstruction rescaled to the amplitude of the measured field.
    pub fn reconstruction_in_field_units(&self) -> Result<CombinedProfile, DecompositionError> {
        Ok(self.reconstruction()?.scaled(self.field_norm))
    }
}
