//! File format parsers for measured intensity maps.
//!
//! Supported formats:
//! - [`matrix`] — delimited numeric text
//! - [`pgm`] — Netpbm greymaps

pub mod matrix;
pub mod pgm;

use thiserror::Error;

/// Errors during intensity file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}
