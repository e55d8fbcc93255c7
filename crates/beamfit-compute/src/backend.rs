//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution strategies so that
//! the decomposition code in `beamfit-core` never touches threads directly.

use ndarray::Array2;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Device error: {0}")]
    DeviceError(String),
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub compute_units: Option<usize>,
}

/// The type of compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Serial,
    Cpu,
}

/// Abstraction over compute backends.
///
/// Physics code in `beamfit-core` operates against this trait. The hot path
/// of a decomposition is one independent reduction per mode pair `(m, n)`,
/// which maps directly onto [`parallel_matrix_fill`](Self::parallel_matrix_fill).
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// Fill a `rows x cols` matrix where every entry is computed independently.
    ///
    /// Entry `(i, j)` of the result must equal `fill_fn(i, j)` regardless of
    /// the order in which entries were evaluated.
    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> f64 + Send + Sync),
    ) -> Result<Array2<f64>, ComputeError>;
}

/// Single-threaded backend. Evaluates entries in row-major order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialBackend;

impl ComputeBackend for SerialBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Serial (1 thread)".into(),
            backend_type: BackendType::Serial,
            compute_units: Some(1),
        }
    }

    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> f64 + Send + Sync),
    ) -> Result<Array2<f64>, ComputeError> {
        Ok(Array2::from_shape_fn((rows, cols), |(i, j)| fill_fn(i, j)))
    }
}
