//! Parser for Netpbm greymap (`.pgm`) images.
//!
//! The header is `P2` (ASCII samples) or `P5` (binary samples), followed by
//! width, height and maximum value, separated by whitespace; `#` starts a
//! comment that runs to the end of the line. Binary samples are one byte
//! when `maxval < 256`, otherwise two bytes big-endian.
//!
//! Samples are returned scaled to `[0, 1]` by `maxval`.

use ndarray::Array2;

use super::ParseError;

/// Cursor over the header tokens, tracking line numbers for errors.
struct Header<'a> {
    bytes: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Header<'a> {
    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'#' => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                c if c.is_ascii_whitespace() => self.pos += 1,
                _ => break,
            }
        }
    }

    fn token(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        while self.pos < self.bytes.len() && !self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("Unexpected end of file"));
        }
        let bytes: &'a [u8] = self.bytes;
        std::str::from_utf8(&bytes[start..self.pos]).map_err(|_| self.error("Non-ASCII header token"))
    }

    fn number(&mut self, what: &str) -> Result<usize, ParseError> {
        let tok = self.token()?;
        tok.parse().map_err(|_| self.error(&format!("Invalid {}: {}", what, tok)))
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::FormatError {
            line: self.line,
            message: message.to_string(),
        }
    }
}

/// Parse a PGM image from raw file bytes.
pub fn parse_pgm(bytes: &[u8]) -> Result<Array2<f64>, ParseError> {
    let mut header = Header {
        bytes,
        pos: 0,
        line: 1,
    };

    let magic = header.token()?;
    let binary = match magic {
        "P2" => false,
        "P5" => true,
        other => return Err(header.error(&format!("Expected P2 or P5, found '{}'", other))),
    };

    let width = header.number("width")?;
    let height = header.number("height")?;
    let maxval = header.number("maxval")?;
    if width == 0 || height == 0 {
        return Err(header.error("Image has zero size"));
    }
    if maxval == 0 || maxval > u16::MAX as usize {
        return Err(header.error(&format!("maxval must be in 1..=65535, got {}", maxval)));
    }

    let count = width
        .checked_mul(height)
        .ok_or_else(|| header.error(&format!("Image size {}x{} overflows", width, height)))?;
    let scale = 1.0 / maxval as f64;

    let samples: Vec<f64> = if binary {
        // Exactly one whitespace byte separates the header from the raster.
        let start = header.pos + 1;
        let width_bytes = if maxval < 256 { 1 } else { 2 };
        let raster = count
            .checked_mul(width_bytes)
            .and_then(|len| start.checked_add(len))
            .and_then(|end| bytes.get(start..end))
            .ok_or_else(|| header.error(&format!("Raster truncated: expected {} samples", count)))?;
        if width_bytes == 1 {
            raster.iter().map(|&b| b as f64 * scale).collect()
        } else {
            raster
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]) as f64 * scale)
                .collect()
        }
    } else {
        // Every ASCII sample takes at least one byte, so the file length
        // bounds the allocation whatever the header claims.
        let mut out = Vec::with_capacity(count.min(bytes.len() - header.pos));
        for _ in 0..count {
            let v = header.number("sample")?;
            if v > maxval {
                return Err(header.error(&format!("Sample {} exceeds maxval {}", v, maxval)));
            }
            out.push(v as f64 * scale);
        }
        out
    };

    Array2::from_shape_vec((height, width), samples).map_err(|e| ParseError::FormatError {
        line: 1,
        message: e.to_string(),
    })
}
