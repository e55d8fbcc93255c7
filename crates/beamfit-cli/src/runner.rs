//! Decomposition runner: ties together the data readers, the decomposer and
//! the output writers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Serialize;

use beamfit_compute::ComputeBackend;
use beamfit_core::reconstruction::energy_loss;
use beamfit_core::{
    basis_function, reconstruct, Bounds, CoefficientMap, DataProfile, Decomposition,
    ModalDecomposition, ModeDecomposer, TransverseProfile,
};
use beamfit_data::{flip_rows, load_intensity};

use crate::config::{JobConfig, TruncationConfig};

/// Reconstructed intensity sampled on the input pixel positions.
#[derive(Debug)]
pub struct ReconstructedMap {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    /// Shape `(ys.len(), xs.len())`, in the units of the input file.
    pub intensity: Array2<f64>,
}

/// Results from a decomposition run.
#[derive(Debug)]
pub struct DecompositionOutput {
    pub decomposition: Decomposition,
    /// Coefficients left after the optional truncation.
    pub retained: CoefficientMap,
    pub reconstruction: Option<ReconstructedMap>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    method: &'a str,
    waist: f64,
    wavelength: f64,
    field_norm: f64,
    energy: f64,
    energy_loss: f64,
    coefficients: &'a CoefficientMap,
    retained: &'a CoefficientMap,
}

/// Run a full decomposition from a parsed job configuration.
///
/// Relative input paths are resolved against `base_dir`.
pub fn run_decomposition(job: &JobConfig, base_dir: &Path) -> Result<DecompositionOutput> {
    let input_path = base_dir.join(&job.input.file);
    let mut intensity = load_intensity(&input_path)
        .with_context(|| format!("Loading intensity map {}", input_path.display()))?;
    if job.input.flip_rows {
        intensity = flip_rows(&intensity);
    }
    let (ny, nx) = intensity.dim();
    println!("  Input: {} ({}x{} pixels)", input_path.display(), nx, ny);

    let profile = match (&job.input.pixel_size, &job.input.bounds) {
        (Some(pixel_size), _) => DataProfile::with_pixel_size(intensity, *pixel_size)?,
        (None, Some(bounds)) => DataProfile::from_intensity(intensity, Bounds::from(bounds))?,
        (None, None) => anyhow::bail!("[input] requires either 'pixel_size' or 'bounds'"),
    };
    let profile = if job.input.centre {
        let centred = profile.centred();
        let [ox, oy] = centred.offset();
        println!("  Centred: shifted by ({:.3e}, {:.3e}) m", ox, oy);
        centred
    } else {
        profile
    };

    let backend = create_backend(&job.decomposition.backend, job.decomposition.threads)?;
    let decomposer = ModeDecomposer::new(backend).with_settings(job.decomposition.settings.clone());

    let params = &job.decomposition;
    let decomposition = decomposer
        .decompose(&profile, params.wavelength, params.m_max, params.n_max, params.resolution)
        .with_context(|| {
            format!(
                "{} up to ({}, {}) at λ={:.3e} m",
                decomposer.method_name(),
                params.m_max,
                params.n_max,
                params.wavelength
            )
        })?;

    println!("  Best-fit waist: {:.4e} m", decomposition.waist);
    println!(
        "  Captured energy: {:.6} ({} modes)",
        decomposition.energy(),
        decomposition.coefficients.len()
    );
    for (idx, c) in decomposition.coefficients.strongest(5).iter() {
        println!("    {}: {:+.6}", idx, c);
    }

    let retained = apply_truncation(&decomposition.coefficients, job.truncation.as_ref());
    if job.truncation.is_some() {
        println!(
            "  Truncated to {} modes, energy loss {:.3e}",
            retained.len(),
            energy_loss(&retained)
        );
    }

    let reconstruction = if job.output.save_reconstruction {
        Some(reconstruct_on_pixels(&profile, &retained, &decomposition)?)
    } else {
        None
    };

    Ok(DecompositionOutput {
        decomposition,
        retained,
        reconstruction,
    })
}

/// Apply per-axis order, combined order, magnitude and count limits, in that order.
fn apply_truncation(coefficients: &CoefficientMap, truncation: Option<&TruncationConfig>) -> CoefficientMap {
    let Some(t) = truncation else {
        return coefficients.clone();
    };
    let mut kept = match t.orders {
        Some([m_max, n_max]) => coefficients.truncated(m_max, n_max),
        None => coefficients.clone(),
    };
    if let Some(order) = t.max_order {
        kept = kept.truncated_to_order(order);
    }
    if let Some(threshold) = t.threshold {
        kept = kept.above(threshold);
    }
    if let Some(count) = t.strongest {
        kept = kept.strongest(count);
    }
    kept
}

/// Evaluate the retained modes at every input pixel, in input units.
fn reconstruct_on_pixels(
    profile: &DataProfile,
    retained: &CoefficientMap,
    decomposition: &Decomposition,
) -> Result<ReconstructedMap> {
    let bounds = profile
        .bounds()
        .context("Measured profile has no spatial bounds")?;
    let (ny, nx) = profile.dim();
    let [px, py] = profile.pixel_size();
    let xs: Vec<f64> = (0..nx).map(|i| bounds.lo[0] + i as f64 * px).collect();
    let ys: Vec<f64> = (0..ny).map(|j| bounds.lo[1] + j as f64 * py).collect();

    let field = reconstruct(retained, decomposition.waist, decomposition.wavelength)?
        .scaled(decomposition.field_norm);
    let intensity = Array2::from_shape_fn((ny, nx), |(j, i)| field.intensity(xs[i], ys[j]));

    Ok(ReconstructedMap { xs, ys, intensity })
}

/// Write coefficients to a CSV file with a metadata header.
pub fn write_coefficients_csv(result: &DecompositionOutput, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    let d = &result.decomposition;

    writeln!(file, "# Beamfit Hermite-Gauss Decomposition")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# input: {}", job.input.file)?;
    writeln!(file, "# wavelength_m: {:.6e}", d.wavelength)?;
    writeln!(file, "# waist_m: {:.6e}", d.waist)?;
    writeln!(file, "# field_norm: {:.6e}", d.field_norm)?;
    if let Some((m_max, n_max)) = d.coefficients.max_orders() {
        writeln!(file, "# orders: m_max={}, n_max={}", m_max, n_max)?;
    }
    writeln!(file, "# energy: {:.9}", d.energy())?;
    writeln!(file, "#")?;
    writeln!(file, "m,n,coefficient,retained")?;

    for (idx, c) in d.coefficients.iter() {
        let kept = result.retained.get(idx).is_some();
        writeln!(file, "{},{},{:.9e},{}", idx.m, idx.n, c, kept as u8)?;
    }

    println!("Coefficients written to: {}", path.display());
    Ok(())
}

/// Write the decomposition summary to a JSON file.
pub fn write_decomposition_json(result: &DecompositionOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let d = &result.decomposition;
    let report = JsonReport {
        method: "Hermite-Gauss",
        waist: d.waist,
        wavelength: d.wavelength,
        field_norm: d.field_norm,
        energy: d.energy(),
        energy_loss: energy_loss(&result.retained),
        coefficients: &d.coefficients,
        retained: &result.retained,
    };
    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Decomposition (JSON) written to: {}", path.display());
    Ok(())
}

/// Write a reconstructed intensity map to a CSV file.
pub fn write_reconstruction_csv(map: &ReconstructedMap, path: &Path) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# Beamfit Reconstructed Intensity Map")?;
    writeln!(file, "# Grid: {}x{}", map.xs.len(), map.ys.len())?;
    if let (Some(x0), Some(x1), Some(y0), Some(y1)) =
        (map.xs.first(), map.xs.last(), map.ys.first(), map.ys.last())
    {
        writeln!(file, "# Extent: x=[{:.4e}, {:.4e}] y=[{:.4e}, {:.4e}] m", x0, x1, y0, y1)?;
    }
    writeln!(file, "#")?;
    writeln!(file, "x_m,y_m,intensity")?;

    for (j, y) in map.ys.iter().enumerate() {
        for (i, x) in map.xs.iter().enumerate() {
            writeln!(file, "{:.6e},{:.6e},{:.6e}", x, y, map.intensity[[j, i]])?;
        }
    }

    println!("Reconstructed map written to: {}", path.display());
    Ok(())
}

/// Print a square grid of samples of one basis mode as CSV on stdout.
pub fn print_basis_samples(
    m: usize,
    n: usize,
    waist_x: f64,
    waist_y: f64,
    wavelength: f64,
    points: usize,
    z: f64,
) -> Result<()> {
    let mode = basis_function(m, n, waist_x, waist_y, wavelength)?;
    if points < 2 {
        anyhow::bail!("--points must be at least 2, got {}", points);
    }

    println!("# HG{}{} waist=({:.4e}, {:.4e}) m, λ={:.4e} m, z={:.4e} m", m, n, waist_x, waist_y, wavelength, z);
    println!(
        "# Rayleigh range: x={:.4e} m, y={:.4e} m",
        mode.rayleigh_range_x(),
        mode.rayleigh_range_y()
    );
    println!("x_m,y_m,re,im,intensity");

    let step = |w: f64, k: usize| -3.0 * w + 6.0 * w * k as f64 / (points - 1) as f64;
    for j in 0..points {
        let y = step(waist_y, j);
        for i in 0..points {
            let x = step(waist_x, i);
            let e = mode.evaluate_at(x, y, z);
            println!("{:.6e},{:.6e},{:.6e},{:.6e},{:.6e}", x, y, e.re, e.im, e.norm_sqr());
        }
    }
    Ok(())
}

/// Create a compute backend based on the user's preference string.
///
/// - `"serial"` — single-threaded reference backend.
/// - `"cpu"` — Rayon thread pool, optionally with a fixed thread count.
/// - `"auto"` (default) — the crate's default backend.
fn create_backend(preference: &str, threads: Option<usize>) -> Result<Arc<dyn ComputeBackend>> {
    let backend: Arc<dyn ComputeBackend> = match preference {
        "serial" => Arc::new(beamfit_compute::SerialBackend),
        "cpu" => {
            #[cfg(feature = "cpu")]
            {
                match threads {
                    Some(n) => Arc::new(beamfit_compute::CpuBackend::with_threads(n)?),
                    None => Arc::new(beamfit_compute::CpuBackend::new()),
                }
            }
            #[cfg(not(feature = "cpu"))]
            {
                let _ = threads;
                anyhow::bail!("CPU backend requested but binary was built without --features cpu");
            }
        }
        "auto" => beamfit_compute::default_backend(),
        other => anyhow::bail!("Unknown backend '{}'. Valid values: auto, cpu, serial", other),
    };
    println!("Backend: {}", backend.device_info().name);
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobConfig;
    use std::io::Write;

    const WAIST: f64 = 40e-6;
    const PIXEL: f64 = 4e-6;

    /// Writes a 61x61 TEM00 intensity image and a job file next to it.
    fn write_job(dir: &Path, extra: &str) -> JobConfig {
        let mut image = std::fs::File::create(dir.join("beam.csv")).unwrap();
        writeln!(image, "# synthetic TEM00").unwrap();
        for j in 0..61 {
            let y = (j as f64 - 30.0) * PIXEL;
            let row: Vec<String> = (0..61)
                .map(|i| {
                    let x = (i as f64 - 30.0) * PIXEL;
                    format!("{:.9e}", (-2.0 * (x * x + y * y) / (WAIST * WAIST)).exp())
                })
                .collect();
            writeln!(image, "{}", row.join(",")).unwrap();
        }

        let text = format!(
            r#"
            [input]
            file = "beam.csv"
            pixel_size = [{PIXEL:e}, {PIXEL:e}]

            [decomposition]
            wavelength = 800e-9
            m_max = 2
            n_max = 2
            resolution = 2e-6
            backend = "serial"

            [output]
            directory = "{}"
            save_json = true
            {extra}
            "#,
            dir.join("out").display()
        );
        let job_path = dir.join("job.toml");
        std::fs::write(&job_path, text).unwrap();
        crate::config::load_config(&job_path).unwrap()
    }

    #[test]
    fn test_run_recovers_fundamental() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), "");
        let result = run_decomposition(&job, dir.path()).unwrap();

        let d = &result.decomposition;
        assert_eq!(d.coefficients.len(), 9);
        assert!((d.coefficients.get((0, 0)).unwrap().abs() - 1.0).abs() < 1e-3);
        assert!((d.waist - WAIST).abs() / WAIST < 1e-2);
        assert!(result.reconstruction.is_none());
        assert_eq!(result.retained, d.coefficients);
    }

    #[test]
    fn test_outputs_written() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), "save_reconstruction = true");
        let result = run_decomposition(&job, dir.path()).unwrap();
        let out = dir.path().join("out");

        write_coefficients_csv(&result, &out.join("coefficients.csv"), &job).unwrap();
        write_decomposition_json(&result, &out.join("decomposition.json")).unwrap();
        let map = result.reconstruction.as_ref().unwrap();
        write_reconstruction_csv(map, &out.join("reconstruction.csv")).unwrap();

        let csv = std::fs::read_to_string(out.join("coefficients.csv")).unwrap();
        let rows: Vec<&str> = csv.lines().filter(|l| !l.starts_with('#')).collect();
        assert!(csv.contains("# orders: m_max=2, n_max=2"));
        assert_eq!(rows[0], "m,n,coefficient,retained");
        assert_eq!(rows.len(), 10);
        assert!(rows[1].starts_with("0,0,"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("decomposition.json")).unwrap()).unwrap();
        assert_eq!(json["coefficients"].as_array().unwrap().len(), 9);
        assert!(json["energy"].as_f64().unwrap() <= 1.0 + 1e-9);

        // Peak of the reconstructed TEM00 matches the unit peak of the input.
        assert_eq!(map.intensity.dim(), (61, 61));
        assert!((map.intensity[[30, 30]] - 1.0).abs() < 1e-2);
        let lines = std::fs::read_to_string(out.join("reconstruction.csv")).unwrap();
        assert_eq!(lines.lines().filter(|l| !l.starts_with('#')).count(), 1 + 61 * 61);
    }

    #[test]
    fn test_truncation_order() {
        let mut map = CoefficientMap::new();
        map.insert((0, 0), 0.9);
        map.insert((1, 0), 0.3);
        map.insert((0, 1), -0.2);
        map.insert((2, 0), 0.05);

        let t = TruncationConfig {
            orders: None,
            max_order: Some(1),
            threshold: Some(0.1),
            strongest: Some(2),
        };
        let kept = apply_truncation(&map, Some(&t));
        assert_eq!(kept.len(), 2);
        assert!(kept.get((0, 0)).is_some());
        assert!(kept.get((1, 0)).is_some());
        assert_eq!(apply_truncation(&map, None), map);

        let per_axis = TruncationConfig {
            orders: Some([1, 0]),
            ..Default::default()
        };
        let kept = apply_truncation(&map, Some(&per_axis));
        assert_eq!(kept.len(), 2);
        assert!(kept.get((0, 1)).is_none());
        assert!(kept.get((2, 0)).is_none());
    }

    #[test]
    fn test_missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let job = write_job(dir.path(), "");
        std::fs::remove_file(dir.path().join("beam.csv")).unwrap();
        let err = run_decomposition(&job, dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("beam.csv"));
    }

    #[test]
    fn test_create_backend() {
        assert!(create_backend("serial", None).is_ok());
        assert!(create_backend("auto", None).is_ok());
        assert!(create_backend("gpu", None).is_err());
    }
}
