//! CPU compute backend using Rayon for shared-memory parallelism.

use ndarray::Array2;

use crate::backend::{BackendType, ComputeBackend, ComputeError, DeviceInfo};

/// CPU backend that parallelises work across threads via Rayon.
pub struct CpuBackend {
    num_threads: usize,
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    /// Create a new CPU backend on the global Rayon pool.
    pub fn new() -> Self {
        Self {
            num_threads: rayon::current_num_threads(),
            pool: None,
        }
    }

    /// Create a CPU backend with a dedicated pool of `num_threads` workers.
    pub fn with_threads(num_threads: usize) -> Result<Self, ComputeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ComputeError::Unavailable(e.to_string()))?;
        Ok(Self {
            num_threads: pool.current_num_threads(),
            pool: Some(pool),
        })
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            backend_type: BackendType::Cpu,
            compute_units: Some(self.num_threads),
        }
    }

    fn parallel_matrix_fill(
        &self,
        rows: usize,
        cols: usize,
        fill_fn: &(dyn Fn(usize, usize) -> f64 + Send + Sync),
    ) -> Result<Array2<f64>, ComputeError> {
        use rayon::prelude::*;

        // Indexed collect keeps row-major order, so results do not depend on scheduling.
        let fill = || -> Vec<f64> {
            (0..rows * cols)
                .into_par_iter()
                .map(|idx| fill_fn(idx / cols, idx % cols))
                .collect()
        };
        let data = match &self.pool {
            Some(pool) => pool.install(fill),
            None => fill(),
        };

        Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| ComputeError::DeviceError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SerialBackend;

    #[test]
    fn test_cpu_fill_matches_serial() {
        let f = |i: usize, j: usize| ((i * 7 + j * 3) as f64).sin();
        let serial = SerialBackend.parallel_matrix_fill(13, 9, &f).unwrap();
        let cpu = CpuBackend::new().parallel_matrix_fill(13, 9, &f).unwrap();
        assert_eq!(serial, cpu);
    }

    #[test]
    fn test_dedicated_pool() {
        let backend = CpuBackend::with_threads(2).unwrap();
        assert_eq!(backend.device_info().compute_units, Some(2));
        let m = backend.parallel_matrix_fill(2, 2, &|i, j| (i + j) as f64).unwrap();
        assert_eq!(m[[1, 1]], 2.0);
    }

    #[test]
    fn test_empty_fill() {
        let m = CpuBackend::new().parallel_matrix_fill(0, 5, &|_, _| 1.0).unwrap();
        assert_eq!(m.dim(), (0, 5));
    }
}
