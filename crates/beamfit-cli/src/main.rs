//! Beamfit command-line interface.
//!
//! Decompose measured beam profiles from TOML job files:
//! ```sh
//! beamfit run job.toml
//! beamfit validate job.toml
//! beamfit basis --m 1 --n 0 --waist 50e-6 --wavelength 800e-9
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beamfit")]
#[command(about = "Beamfit: Hermite-Gauss modal decomposition of laser beam profiles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose a measured profile described by a TOML job file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running the decomposition.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Print samples of a single Hermite-Gauss basis mode.
    Basis {
        /// Order along x.
        #[arg(long)]
        m: usize,
        /// Order along y.
        #[arg(long)]
        n: usize,
        /// Waist (m), used for both axes unless --waist-y is given.
        #[arg(long)]
        waist: f64,
        /// Waist along y (m).
        #[arg(long)]
        waist_y: Option<f64>,
        /// Wavelength (m).
        #[arg(long)]
        wavelength: f64,
        /// Samples along each axis, spanning three waists either side.
        #[arg(long, default_value_t = 21)]
        points: usize,
        /// Propagation distance from the waist plane (m).
        #[arg(long, default_value_t = 0.0)]
        z: f64,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Beamfit Hermite-Gauss Decomposition");
            println!("===================================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let base_dir = config.parent().map(PathBuf::from).unwrap_or_default();
            let result = runner::run_decomposition(&job, &base_dir)?;

            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_coefficients {
                let csv_path = out_dir.join("coefficients.csv");
                runner::write_coefficients_csv(&result, &csv_path, &job)?;
            }

            if job.output.save_json {
                let json_path = out_dir.join("decomposition.json");
                runner::write_decomposition_json(&result, &json_path)?;
            }

            if let Some(map) = &result.reconstruction {
                let map_path = out_dir.join("reconstruction.csv");
                runner::write_reconstruction_csv(map, &map_path)?;
            }

            println!("Decomposition complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let _job = config::load_config(&config)?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
        Commands::Basis {
            m,
            n,
            waist,
            waist_y,
            wavelength,
            points,
            z,
        } => runner::print_basis_samples(m, n, waist, waist_y.unwrap_or(waist), wavelength, points, z),
    }
}
