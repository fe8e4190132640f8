//! Hierarchical array containers (frequency responses, state-space models).
//!
//! A container is a flat mapping of key to n-dimensional array, stored
//! row-major with an optional imaginary part. The bundled backend reads
//! JSON documents of that shape.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{IoError, IoResult, read_to_string};

/// One n-dimensional array, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerArray {
    #[serde(default)]
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imag: Option<Vec<f64>>,
}

impl ContainerArray {
    pub fn real(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            shape,
            data,
            imag: None,
        }
    }

    pub fn complex(shape: Vec<usize>, re: Vec<f64>, im: Vec<f64>) -> Self {
        Self {
            shape,
            data: re,
            imag: Some(im),
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self::real(Vec::new(), vec![value])
    }

    pub fn from_matrix(m: &DMatrix<f64>) -> Self {
        let data = m.transpose().iter().copied().collect();
        Self::real(vec![m.nrows(), m.ncols()], data)
    }

    /// Number of elements implied by the shape (1 for a scalar).
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_complex(&self) -> bool {
        self.imag.is_some()
    }

    fn check(&self, path: &Path, key: &str) -> IoResult<()> {
        let expected = self.element_count();
        if self.data.len() != expected {
            return Err(IoError::malformed(
                path,
                format!(
                    "'{key}' has shape {:?} but {} values",
                    self.shape,
                    self.data.len()
                ),
            ));
        }
        if let Some(im) = &self.imag
            && im.len() != expected
        {
            return Err(IoError::malformed(
                path,
                format!("'{key}' imaginary part has {} values", im.len()),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    path: PathBuf,
    entries: BTreeMap<String, ContainerArray>,
}

impl Container {
    pub fn new(path: impl Into<PathBuf>, entries: BTreeMap<String, ContainerArray>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, array: ContainerArray) {
        self.entries.insert(key.into(), array);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> IoResult<&ContainerArray> {
        let array = self.entries.get(key).ok_or_else(|| IoError::MissingKey {
            path: self.path.clone(),
            key: key.to_string(),
        })?;
        array.check(&self.path, key)?;
        Ok(array)
    }

    /// Real 2-D array as a matrix. A scalar becomes 1x1.
    pub fn matrix(&self, key: &str) -> IoResult<DMatrix<f64>> {
        let array = self.get(key)?;
        match array.shape.as_slice() {
            [] => Ok(DMatrix::from_element(1, 1, array.data[0])),
            [rows, cols] => Ok(DMatrix::from_row_slice(*rows, *cols, &array.data)),
            other => Err(IoError::malformed(
                &self.path,
                format!("'{key}' must be 2-D, found shape {other:?}"),
            )),
        }
    }

    /// Real array flattened in storage order.
    pub fn vector(&self, key: &str) -> IoResult<Vec<f64>> {
        Ok(self.get(key)?.data.clone())
    }

    pub fn scalar(&self, key: &str) -> IoResult<f64> {
        let array = self.get(key)?;
        match array.data.as_slice() {
            [value] => Ok(*value),
            _ => Err(IoError::malformed(
                &self.path,
                format!("'{key}' is not a scalar (shape {:?})", array.shape),
            )),
        }
    }

    /// 3-D complex array `[outputs, inputs, samples]` split into one
    /// `outputs x inputs` matrix per sample.
    pub fn complex_slices(&self, key: &str) -> IoResult<Vec<DMatrix<Complex64>>> {
        let array = self.get(key)?;
        let [p, m, n] = array.shape.as_slice() else {
            return Err(IoError::malformed(
                &self.path,
                format!("'{key}' must be 3-D, found shape {:?}", array.shape),
            ));
        };
        let (p, m, n) = (*p, *m, *n);
        let imag = array.imag.as_deref();

        let slices = (0..n)
            .map(|k| {
                DMatrix::from_fn(p, m, |i, j| {
                    let flat = (i * m + j) * n + k;
                    let im = imag.map_or(0.0, |im| im[flat]);
                    Complex64::new(array.data[flat], im)
                })
            })
            .collect();
        Ok(slices)
    }

    pub fn write_json(&self, path: &Path) -> IoResult<()> {
        let text = serde_json::to_string_pretty(&self.entries).map_err(|source| IoError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        crate::write_text(path, &text)
    }
}

/// Source of containers.
pub trait ContainerSource: Send + Sync {
    fn read_container(&self, path: &Path) -> IoResult<Container>;

    /// File extension used when building conventional artifact paths.
    fn extension(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContainers;

impl ContainerSource for JsonContainers {
    fn read_container(&self, path: &Path) -> IoResult<Container> {
        let content = read_to_string(path)?;
        let entries: BTreeMap<String, ContainerArray> =
            serde_json::from_str(&content).map_err(|source| IoError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Container::new(path, entries))
    }

    fn extension(&self) -> &str {
        "json"
    }
}
