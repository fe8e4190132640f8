//! Whitespace-delimited numeric tables.

use std::path::Path;

use nalgebra::DMatrix;

use crate::{IoError, IoResult, read_to_string};

/// Source of numeric tables.
///
/// The default reads plain text; tests and other backends can substitute
/// their own.
pub trait TableSource: Send + Sync {
    fn read_table(&self, path: &Path) -> IoResult<DMatrix<f64>>;
}

/// Plain-text tables: one row per line, `#` starts a comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextTables;

impl TableSource for TextTables {
    fn read_table(&self, path: &Path) -> IoResult<DMatrix<f64>> {
        read_table(path)
    }
}

pub fn read_table(path: &Path) -> IoResult<DMatrix<f64>> {
    let content = read_to_string(path)?;
    parse_table(&content, path)
}

/// Parse a table. A file with no data rows yields a 0x0 matrix.
pub fn parse_table(content: &str, path: &Path) -> IoResult<DMatrix<f64>> {
    let mut data = Vec::new();
    let mut ncols: Option<usize> = None;
    let mut nrows = 0;

    for (lineno, raw) in content.lines().enumerate() {
        let line = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        if line.trim().is_empty() {
            continue;
        }

        let before = data.len();
        for token in line.split_whitespace() {
            let value: f64 = token.parse().map_err(|_| IoError::Parse {
                path: path.to_path_buf(),
                line: lineno + 1,
                message: format!("'{token}' is not a number"),
            })?;
            data.push(value);
        }
        let width = data.len() - before;

        match ncols {
            None => ncols = Some(width),
            Some(expected) if expected != width => {
                return Err(IoError::Parse {
                    path: path.to_path_buf(),
                    line: lineno + 1,
                    message: format!("expected {expected} columns, found {width}"),
                });
            }
            Some(_) => {}
        }
        nrows += 1;
    }

    Ok(DMatrix::from_row_slice(nrows, ncols.unwrap_or(0), &data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_comments() {
        let text = "# v sigma omega\n10 -0.5 3.0\n\n20 0.1 2.5 # trailing\n";
        let m = parse_table(text, Path::new("t.dat")).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(1, 0)], 20.0);
        assert_eq!(m[(1, 2)], 2.5);
    }

    #[test]
    fn single_row_is_one_by_n() {
        let m = parse_table("1.0 2.0 3.0 4.0", Path::new("t.dat")).unwrap();
        assert_eq!(m.shape(), (1, 4));
    }

    #[test]
    fn empty_file_is_empty_matrix() {
        let m = parse_table("\n# only a comment\n", Path::new("t.dat")).unwrap();
        assert_eq!(m.nrows(), 0);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = parse_table("1 2\n3\n", Path::new("t.dat")).unwrap_err();
        assert!(matches!(err, IoError::Parse { line: 2, .. }));
    }

    #[test]
    fn scientific_notation() {
        let m = parse_table("1.000000000000000000e+01 -2.5e-03", Path::new("t.dat")).unwrap();
        assert_eq!(m[(0, 0)], 10.0);
        assert_eq!(m[(0, 1)], -2.5e-3);
    }
}
