//! Plain-text numeric output in the `%.18e` layout downstream tools expect.

use std::path::Path;

use nalgebra::DMatrix;

use crate::{IoError, IoResult};

/// `%.18e` formatting: 18 mantissa decimals, signed exponent of at least
/// two digits (`1.000000000000000000e+01`).
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let raw = format!("{value:.18e}");
    let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

/// Rows separated by newlines, columns by single spaces.
pub fn format_table(table: &DMatrix<f64>) -> String {
    let mut out = String::new();
    for row in table.row_iter() {
        let line: Vec<String> = row.iter().map(|v| format_sci(*v)).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

pub fn write_table(path: &Path, table: &DMatrix<f64>) -> IoResult<()> {
    write_text(path, &format_table(table))
}

pub fn write_text(path: &Path, text: &str) -> IoResult<()> {
    std::fs::write(path, text).map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn formatted_values_parse_back_exactly(v in prop::num::f64::NORMAL) {
            let parsed: f64 = format_sci(v).parse().unwrap();
            prop_assert_eq!(parsed, v);
        }
    }
}
