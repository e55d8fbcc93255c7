//! Parser for delimited numeric matrices.
//!
//! One image row per line, values separated by commas and/or whitespace:
//! ```text
//! # optional comment
//! 0.0, 0.1, 0.0
//! 0.1, 1.0, 0.1
//! 0.0, 0.1, 0.0
//! ```
//! Blank lines and lines starting with `#` are skipped. Every row must have
//! the same number of values.

use ndarray::Array2;

use super::ParseError;

/// Parse a delimited matrix from a string.
pub fn parse_matrix(content: &str) -> Result<Array2<f64>, ParseError> {
    let mut values = Vec::new();
    let mut ncols = None;
    let mut nrows = 0;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let row = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<f64>().map_err(|_| ParseError::FormatError {
                    line: idx + 1,
                    message: format!("Invalid number: {}", tok),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        match ncols {
            None => ncols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(ParseError::FormatError {
                    line: idx + 1,
                    message: format!("Expected {} values, found {}", n, row.len()),
                });
            }
            Some(_) => {}
        }
        values.extend(row);
        nrows += 1;
    }

    let ncols = ncols.ok_or_else(|| ParseError::FormatError {
        line: 1,
        message: "File contains no data rows".into(),
    })?;

    Array2::from_shape_vec((nrows, ncols), values).map_err(|e| ParseError::FormatError {
        line: 1,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        let content = "# beam\n0.0, 0.5, 0.0\n0.5,1.0,0.5\n\n0.0 ,0.5, 0.0\n";
        let m = parse_matrix(content).unwrap();
        assert_eq!(m.dim(), (3, 3));
        assert_eq!(m[[1, 1]], 1.0);
        assert_eq!(m[[2, 1]], 0.5);
    }

    #[test]
    fn test_parse_whitespace() {
        let m = parse_matrix("1 2 3 4\n5\t6  7 8\n").unwrap();
        assert_eq!(m.dim(), (2, 4));
        assert_eq!(m[[1, 2]], 7.0);
    }

    #[test]
    fn test_ragged_rows() {
        let err = parse_matrix("1,2,3\n4,5\n").unwrap_err();
        match err {
            ParseError::FormatError { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_bad_number() {
        let err = parse_matrix("# header\n1,2\n3,x\n").unwrap_err();
        assert!(matches!(err, ParseError::FormatError { line: 3, .. }));
    }

    #[test]
    fn test_empty() {
        assert!(parse_matrix("# nothing here\n\n").is_err());
    }
}
