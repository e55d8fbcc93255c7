//! # Beamfit Core
//!
//! The numerical backbone of Beamfit. This crate decomposes measured
//! transverse laser profiles into Hermite-Gauss modes, fits the basis waist,
//! and rebuilds denoised fields from truncated coefficient sets.
//!
//! ## Architecture
//!
//! Profiles implement [`profile::TransverseProfile`], a single "sample the
//! field at (x, y)" capability. Decomposers implement
//! [`decomposition::ModalDecomposition`]; the Hermite-Gauss implementation
//! is [`decomposition::ModeDecomposer`], which evaluates its per-mode inner
//! products through a `beamfit_compute::ComputeBackend`.
//!
//! ## Modules
//!
//! - [`types`] — Bounds, mode indices, coefficient maps, results.
//! - [`profile`] — Profile trait, measured-data and Gaussian profiles.
//! - [`basis`] — Orthonormal Hermite-Gauss modes.
//! - [`grid`] — Uniform sampling grid and discrete integrals.
//! - [`moments`] — Centroid and D4σ width estimates.
//! - [`decomposition`] — Projection and waist search.
//! - [`reconstruction`] — Weighted mode sums and fidelity measures.

pub mod basis;
pub mod decomposition;
pub mod grid;
pub mod moments;
pub mod profile;
pub mod reconstruction;
pub mod types;

pub use basis::{basis_function, HermiteGaussianProfile};
pub use decomposition::{
    hermite_gauss_decomposition, DecomposerSettings, DecompositionError, ModalDecomposition,
    ModeDecomposer,
};
pub use profile::{DataProfile, GaussianProfile, TransverseProfile};
pub use reconstruction::{energy_loss, fidelity, reconstruct, CombinedProfile};
pub use types::{Bounds, CoefficientMap, Decomposition, ModeIndex};
