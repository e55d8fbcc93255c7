//! Hermite-Gauss modal decomposition.
//!
//! The [`ModalDecomposition`] trait defines the interface of a decomposer;
//! [`ModeDecomposer`] is the Hermite-Gauss implementation. Given a transverse
//! profile with declared bounds it:
//!
//! 1. resamples the field on a uniform grid ([`SamplingGrid`]) and normalises
//!    it to unit discrete energy,
//! 2. for a trial waist $w$, projects the field onto every mode
//!    $u_m(x; w)\,u_n(y; w)$ with $m \le m_{\max}$, $n \le n_{\max}$
//!    ([`projection`]),
//! 3. minimises the residual energy $1 - \sum c_{mn}^2$ over $w$
//!    ([`waist`]),
//! 4. recomputes the coefficients at the optimal waist.
//!
//! For a fixed waist the coefficients are a closed-form orthogonal
//! projection; only the waist is searched numerically.

pub mod projection;
pub mod waist;

use std::sync::Arc;

use beamfit_compute::{ComputeBackend, ComputeError};
use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::SamplingGrid;
use crate::moments::estimate_waist;
use crate::profile::TransverseProfile;
use crate::types::{CoefficientMap, Decomposition};

use projection::Projector;
use waist::{optimise_waist, WaistBracket};

/// Errors that can occur during a decomposition.
#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid mode order: {0}")]
    InvalidOrder(String),

    #[error("Waist search failed to converge after {max_iter} iterations (bracket width: {width:.2e} m)")]
    NumericalConvergence { max_iter: usize, width: f64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Field has no energy on the sampling grid")]
    EmptyField,

    #[error("Compute backend error: {0}")]
    Compute(#[from] ComputeError),
}

/// Numerical settings for the waist search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposerSettings {
    /// Number of waists sampled by the coarse scan before refinement.
    #[serde(default = "default_scan_points")]
    pub scan_points: usize,
    /// Iteration budget of the golden-section refinement.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Refinement stops when the bracket is narrower than this fraction of the waist.
    #[serde(default = "default_waist_tolerance")]
    pub waist_tolerance: f64,
}

fn default_scan_points() -> usize {
    30
}
fn default_max_iterations() -> usize {
    200
}
fn default_waist_tolerance() -> f64 {
    1e-6
}

impl Default for DecomposerSettings {
    fn default() -> Self {
        Self {
            scan_points: default_scan_points(),
            max_iterations: default_max_iterations(),
            waist_tolerance: default_waist_tolerance(),
        }
    }
}

impl DecomposerSettings {
    pub fn validate(&self) -> Result<(), DecompositionError> {
        if self.scan_points < 3 {
            return Err(DecompositionError::InvalidParameter(format!(
                "scan_points must be at least 3, got {}",
                self.scan_points
            )));
        }
        if self.max_iterations == 0 {
            return Err(DecompositionError::InvalidParameter(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(self.waist_tolerance > 0.0 && self.waist_tolerance < 1.0) {
            return Err(DecompositionError::InvalidParameter(format!(
                "waist_tolerance must lie in (0, 1), got {}",
                self.waist_tolerance
            )));
        }
        Ok(())
    }
}

/// The interface every modal decomposer implements.
pub trait ModalDecomposition {
    /// Decompose `field` into modes up to `(m_max, n_max)` inclusive, fitting the waist.
    ///
    /// # Arguments
    /// * `field` - Profile to decompose. Must declare its bounds.
    /// * `wavelength` - Wavelength at which the basis is defined (m).
    /// * `m_max`, `n_max` - Inclusive upper mode orders along x and y.
    /// * `resolution` - Pitch of the integration grid (m).
    fn decompose(
        &self,
        field: &dyn TransverseProfile,
        wavelength: f64,
        m_max: i32,
        n_max: i32,
        resolution: f64,
    ) -> Result<Decomposition, DecompositionError>;

    /// Project `field` onto the basis at a fixed, caller-chosen waist.
    fn project(
        &self,
        field: &dyn TransverseProfile,
        waist: f64,
        wavelength: f64,
        m_max: i32,
        n_max: i32,
        resolution: f64,
    ) -> Result<Decomposition, DecompositionError>;

    /// Human-readable name of the decomposition method.
    fn method_name(&self) -> &str;
}

/// Sampled input of a decomposition.
struct Prepared<'a> {
    grid: SamplingGrid,
    sampled: Array2<Complex64>,
    projector: Projector<'a>,
    norm: f64,
}

/// Hermite-Gauss decomposer.
pub struct ModeDecomposer {
    /// Backend evaluating the per-mode inner products.
    pub backend: Arc<dyn ComputeBackend>,
    pub settings: DecomposerSettings,
}

impl Default for ModeDecomposer {
    fn default() -> Self {
        Self {
            backend: beamfit_compute::default_backend(),
            settings: DecomposerSettings::default(),
        }
    }
}

impl ModeDecomposer {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            settings: DecomposerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DecomposerSettings) -> Self {
        self.settings = settings;
        self
    }

    fn order(name: &str, value: i32) -> Result<usize, DecompositionError> {
        usize::try_from(value).map_err(|_| {
            DecompositionError::InvalidOrder(format!("{name} must be non-negative, got {value}"))
        })
    }

    fn positive(name: &str, value: f64) -> Result<f64, DecompositionError> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(DecompositionError::InvalidParameter(format!(
                "{name} must be positive and finite, got {value}"
            )))
        }
    }

    /// Validate inputs, sample the field and build the projector.
    fn prepare(
        &self,
        field: &dyn TransverseProfile,
        wavelength: f64,
        m_max: i32,
        n_max: i32,
        resolution: f64,
    ) -> Result<Prepared<'_>, DecompositionError> {
        let m_max = Self::order("m_max", m_max)?;
        let n_max = Self::order("n_max", n_max)?;
        Self::positive("wavelength", wavelength)?;
        Self::positive("resolution", resolution)?;
        self.settings.validate()?;

        let bounds = field.bounds().ok_or_else(|| {
            DecompositionError::InvalidDomain("profile does not declare spatial bounds".into())
        })?;
        let grid = SamplingGrid::from_bounds(&bounds, resolution)?;
        let sampled = grid.sample(field);

        let energy = grid.energy(&sampled);
        if !(energy.is_finite() && energy > 0.0) {
            return Err(DecompositionError::EmptyField);
        }
        let norm = energy.sqrt();
        let projector = Projector::new(&grid, &sampled, norm, m_max, n_max, self.backend.as_ref());
        Ok(Prepared {
            grid,
            sampled,
            projector,
            norm,
        })
    }
}

impl ModalDecomposition for ModeDecomposer {
    fn decompose(
        &self,
        field: &dyn TransverseProfile,
        wavelength: f64,
        m_max: i32,
        n_max: i32,
        resolution: f64,
    ) -> Result<Decomposition, DecompositionError> {
        let Prepared {
            grid,
            sampled,
            projector,
            norm,
        } = self.prepare(field, wavelength, m_max, n_max, resolution)?;

        let estimate = estimate_waist(&grid, &sampled).ok_or(DecompositionError::EmptyField)?;
        log::info!("Estimated w0 = {:.2} microns (1/e^2 width)", estimate * 1e6);

        let bracket = WaistBracket::around(estimate, projector.max_order());
        let search = optimise_waist(|w| projector.residual(w), bracket, &self.settings)?;
        log::info!(
            "Best-fit waist = {:.3} microns (residual energy {:.3e}, {} evaluations)",
            search.waist * 1e6,
            search.residual,
            search.evaluations
        );

        Ok(Decomposition {
            coefficients: projector.coefficient_map(search.waist)?,
            waist: search.waist,
            wavelength,
            field_norm: norm,
        })
    }

    fn project(
        &self,
        field: &dyn TransverseProfile,
        waist: f64,
        wavelength: f64,
        m_max: i32,
        n_max: i32,
        resolution: f64,
    ) -> Result<Decomposition, DecompositionError> {
        Self::positive("waist", waist)?;
        let prepared = self.prepare(field, wavelength, m_max, n_max, resolution)?;
        Ok(Decomposition {
            coefficients: prepared.projector.coefficient_map(waist)?,
            waist,
            wavelength,
            field_norm: prepared.norm,
        })
    }

    fn method_name(&self) -> &str {
        "Hermite-Gauss projection"
    }
}

/// Decompose a profile with the default backend and settings.
///
/// Returns the coefficient map and the best-fit waist.
pub fn hermite_gauss_decomposition(
    field: &dyn TransverseProfile,
    wavelength: f64,
    m_max: i32,
    n_max: i32,
    resolution: f64,
) -> Result<(CoefficientMap, f64), DecompositionError> {
    ModeDecomposer::default()
        .decompose(field, wavelength, m_max, n_max, resolution)
        .map(Decomposition::into_parts)
}
