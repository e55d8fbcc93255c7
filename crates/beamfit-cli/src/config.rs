//! TOML configuration deserialisation for decomposition jobs.

use anyhow::{bail, Context};
use beamfit_core::{Bounds, DecomposerSettings};
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub input: InputConfig,
    pub decomposition: DecompositionConfig,
    #[serde(default)]
    pub truncation: Option<TruncationConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Measured intensity map and its physical extent.
#[derive(Debug, Deserialize)]
pub struct InputConfig {
    /// Intensity file (`.csv`, `.txt`, `.dat` or `.pgm`), relative to the job file.
    pub file: String,
    /// Pixel pitch `[px, py]` in metres; the image is centred on the origin.
    #[serde(default)]
    pub pixel_size: Option<[f64; 2]>,
    /// Explicit positions of the first and last samples along each axis.
    #[serde(default)]
    pub bounds: Option<BoundsConfig>,
    /// Reverse the row order so the first file row becomes the largest y.
    #[serde(default)]
    pub flip_rows: bool,
    /// Shift the image so its intensity centroid sits on the origin.
    #[serde(default)]
    pub centre: bool,
}

#[derive(Debug, Deserialize)]
pub struct BoundsConfig {
    pub lo: [f64; 2],
    pub hi: [f64; 2],
}

impl From<&BoundsConfig> for Bounds {
    fn from(b: &BoundsConfig) -> Self {
        Bounds::new(b.lo, b.hi)
    }
}

/// Decomposition parameters from TOML.
#[derive(Debug, Deserialize)]
pub struct DecompositionConfig {
    /// Wavelength in metres.
    pub wavelength: f64,
    pub m_max: i32,
    pub n_max: i32,
    /// Integration grid pitch in metres.
    pub resolution: f64,
    /// Compute backend: "auto", "cpu", or "serial". Default: "auto".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Worker threads for the "cpu" backend (default: all cores).
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub settings: DecomposerSettings,
}

fn default_backend() -> String {
    "auto".into()
}

/// Optional post-fit truncation of the coefficient set.
#[derive(Debug, Default, Deserialize)]
pub struct TruncationConfig {
    /// Keep modes with `m <= orders[0]` and `n <= orders[1]`.
    #[serde(default)]
    pub orders: Option<[usize; 2]>,
    /// Keep modes with `m + n <= max_order`.
    #[serde(default)]
    pub max_order: Option<usize>,
    /// Keep the `strongest` largest coefficients by magnitude.
    #[serde(default)]
    pub strongest: Option<usize>,
    /// Drop coefficients with magnitude below `threshold`.
    #[serde(default)]
    pub threshold: Option<f64>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save coefficients as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_coefficients: bool,
    /// Whether to also save the full result as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Whether to save the reconstructed intensity on the input pixels (default: false).
    #[serde(default)]
    pub save_reconstruction: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_coefficients: true,
            save_json: false,
            save_reconstruction: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

impl JobConfig {
    /// Checks that need the whole configuration; numerical ranges are left
    /// to the decomposer.
    pub fn validate(&self) -> anyhow::Result<()> {
        match (&self.input.pixel_size, &self.input.bounds) {
            (Some(_), Some(_)) => bail!("[input] sets both 'pixel_size' and 'bounds'; choose one"),
            (None, None) => bail!("[input] requires either 'pixel_size' or 'bounds'"),
            (Some(p), None) if !(p[0] > 0.0 && p[1] > 0.0) => {
                bail!("[input] pixel_size must be positive, got {:?}", p)
            }
            _ => {}
        }
        if !matches!(self.decomposition.backend.as_str(), "auto" | "cpu" | "serial") {
            bail!(
                "Unknown backend '{}'. Valid values: auto, cpu, serial",
                self.decomposition.backend
            );
        }
        self.decomposition
            .settings
            .validate()
            .context("[decomposition.settings]")?;
        Ok(())
    }
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Reading {}", path.display()))?;
    let config: JobConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [input]
        file = "beam.csv"
        pixel_size = [5e-6, 5e-6]

        [decomposition]
        wavelength = 800e-9
        m_max = 2
        n_max = 2
        resolution = 2e-6
    "#;

    #[test]
    fn test_defaults() {
        let job: JobConfig = toml::from_str(MINIMAL).unwrap();
        job.validate().unwrap();
        assert_eq!(job.decomposition.backend, "auto");
        assert_eq!(job.decomposition.settings.scan_points, 30);
        assert_eq!(job.decomposition.settings.max_iterations, 200);
        assert!(job.truncation.is_none());
        assert!(job.output.save_coefficients);
        assert!(!job.output.save_json);
        assert_eq!(job.output.directory, "./output");
    }

    #[test]
    fn test_full_config() {
        let text = r#"
            [input]
            file = "beam.pgm"
            bounds = { lo = [-1e-3, -1e-3], hi = [1e-3, 1e-3] }
            flip_rows = true
            centre = true

            [decomposition]
            wavelength = 1.064e-6
            m_max = 4
            n_max = 3
            resolution = 1e-5
            backend = "cpu"
            threads = 2
            settings = { max_iterations = 50 }

            [truncation]
            orders = [3, 2]
            max_order = 3
            threshold = 0.01

            [output]
            directory = "results"
            save_json = true
            save_reconstruction = true
        "#;
        let job: JobConfig = toml::from_str(text).unwrap();
        job.validate().unwrap();
        assert_eq!(job.decomposition.threads, Some(2));
        assert_eq!(job.decomposition.settings.max_iterations, 50);
        assert_eq!(job.decomposition.settings.scan_points, 30);
        let t = job.truncation.as_ref().unwrap();
        assert_eq!(t.orders, Some([3, 2]));
        assert_eq!(t.max_order, Some(3));
        assert_eq!(t.strongest, None);
        let b = Bounds::from(job.input.bounds.as_ref().unwrap());
        assert_eq!(b.hi, [1e-3, 1e-3]);
    }

    #[test]
    fn test_rejects_ambiguous_geometry() {
        let text = MINIMAL.replace(
            "pixel_size = [5e-6, 5e-6]",
            "pixel_size = [5e-6, 5e-6]\nbounds = { lo = [0.0, 0.0], hi = [1.0, 1.0] }",
        );
        let job: JobConfig = toml::from_str(&text).unwrap();
        assert!(job.validate().is_err());

        let text = MINIMAL.replace("pixel_size = [5e-6, 5e-6]", "");
        let job: JobConfig = toml::from_str(&text).unwrap();
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let text = MINIMAL.replace("resolution = 2e-6", "resolution = 2e-6\nbackend = \"gpu\"");
        let job: JobConfig = toml::from_str(&text).unwrap();
        assert!(job.validate().is_err());
    }
}
