//! # Beamfit Data
//!
//! Readers that turn measured beam-profile files into intensity arrays for
//! `beamfit-core`. Arrays have shape `(rows, columns)` with rows in file
//! order; the caller decides how rows map onto the y axis.
//!
//! Supported formats ([`parsers`]):
//! - Plain numeric matrices (`.csv`, `.txt`, `.dat`), comma or whitespace
//!   separated.
//! - Portable greymaps (`.pgm`), ASCII (P2) and binary (P5).

pub mod parsers;

use std::path::Path;

use ndarray::Array2;

pub use parsers::ParseError;

/// Load an intensity map, choosing the parser from the file extension.
pub fn load_intensity(path: &Path) -> Result<Array2<f64>, ParseError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let map = match extension.as_str() {
        "pgm" => {
            let bytes = std::fs::read(path)?;
            parsers::pgm::parse_pgm(&bytes)?
        }
        "csv" | "txt" | "dat" => {
            let content = std::fs::read_to_string(path)?;
            parsers::matrix::parse_matrix(&content)?
        }
        other => return Err(ParseError::UnsupportedFormat(other.to_string())),
    };

    log::debug!(
        "loaded {}x{} intensity map from {}",
        map.ncols(),
        map.nrows(),
        path.display()
    );
    Ok(map)
}

/// Reverse the row order (top-to-bottom camera images to y-ascending arrays).
pub fn flip_rows(map: &Array2<f64>) -> Array2<f64> {
    map.slice(ndarray::s![..;-1, ..]).to_owned()
}
