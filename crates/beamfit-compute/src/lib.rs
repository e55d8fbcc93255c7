//! # Beamfit Compute
//!
//! Compute backend abstraction for Beamfit. This crate provides a
//! [`ComputeBackend`](backend::ComputeBackend) trait that isolates the
//! numerical code from the execution strategy.
//!
//! ## Available backends
//!
//! | Backend | Feature flag | Status |
//! |---------|-------------|--------|
//! | Serial | always | Implemented |
//! | CPU (Rayon) | `cpu` (default) | Implemented |

pub mod backend;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo, SerialBackend};

#[cfg(feature = "cpu")]
pub use cpu::CpuBackend;

use std::sync::Arc;

/// The backend used when the caller does not pick one.
pub fn default_backend() -> Arc<dyn ComputeBackend> {
    #[cfg(feature = "cpu")]
    {
        Arc::new(CpuBackend::new())
    }
    #[cfg(not(feature = "cpu"))]
    {
        Arc::new(SerialBackend)
    }
}
