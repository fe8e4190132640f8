//! Nodal position and orientation samples written during a time-marching run.
//!
//! Each node has its own file under the deflection directory. Only the last
//! time sample of each file is kept. Rows are stacked and sorted by the
//! spanwise coordinate, which is column 2 of the position samples.

use std::path::{Path, PathBuf};

use ap_core::argsort;
use ap_io::{TableSource, discover_in, sort_by_node_index};
use nalgebra::{DMatrix, Rotation3, Vector3};

use crate::error::{BatchError, BatchResult};

pub const POSITION_PATTERN: &str = "struct_pos_node*.dat";
pub const ORIENTATION_PATTERN: &str = "struct_crv_node*.dat";
const SPANWISE_COLUMN: usize = 2;

#[derive(Debug)]
pub struct NodalSamples {
    pub deflection: DMatrix<f64>,
    pub crv: Option<DMatrix<f64>>,
    /// Why orientation files were present but unusable. The positions are
    /// still returned in that case.
    pub crv_error: Option<BatchError>,
}

/// `Ok(None)` when the directory holds no position files.
pub fn load_nodal_samples(dir: &Path, tables: &dyn TableSource) -> BatchResult<Option<NodalSamples>> {
    let mut position_files = discover_in(dir, POSITION_PATTERN)?;
    if position_files.is_empty() {
        return Ok(None);
    }
    sort_by_node_index(&mut position_files);

    let stacked = final_rows(&position_files, tables)?;
    if stacked.ncols() <= SPANWISE_COLUMN {
        return Err(BatchError::malformed(format!(
            "position samples in {} are {}x{}, no spanwise column",
            dir.display(),
            stacked.nrows(),
            stacked.ncols()
        )));
    }
    let spanwise: Vec<f64> = stacked.column(SPANWISE_COLUMN).iter().copied().collect();
    let order = argsort(&spanwise);
    let deflection = permute_rows(&stacked, &order);

    let (crv, crv_error) = match load_orientation(dir, tables, position_files.len(), &order) {
        Ok(crv) => (crv, None),
        Err(err) => (None, Some(err)),
    };
    Ok(Some(NodalSamples {
        deflection,
        crv,
        crv_error,
    }))
}

/// Rotation vectors (last three columns) reordered like the positions.
fn load_orientation(
    dir: &Path,
    tables: &dyn TableSource,
    nodes: usize,
    order: &[usize],
) -> BatchResult<Option<DMatrix<f64>>> {
    let mut orientation_files = discover_in(dir, ORIENTATION_PATTERN)?;
    if orientation_files.is_empty() {
        return Ok(None);
    }
    sort_by_node_index(&mut orientation_files);
    if orientation_files.len() != nodes {
        return Err(BatchError::malformed(format!(
            "{} orientation files for {} position files in {}",
            orientation_files.len(),
            nodes,
            dir.display()
        )));
    }
    let rows = final_rows(&orientation_files, tables)?;
    if rows.ncols() < 3 {
        return Err(BatchError::malformed(format!(
            "orientation samples in {} have {} columns",
            dir.display(),
            rows.ncols()
        )));
    }
    let psi = rows.columns(rows.ncols() - 3, 3).into_owned();
    Ok(Some(permute_rows(&psi, order)))
}

/// Last row of every file, stacked in file order.
fn final_rows(files: &[PathBuf], tables: &dyn TableSource) -> BatchResult<DMatrix<f64>> {
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(files.len());
    for file in files {
        let table = tables.read_table(file)?;
        if table.nrows() == 0 {
            return Err(BatchError::malformed(format!(
                "no samples in {}",
                file.display()
            )));
        }
        let last: Vec<f64> = table.row(table.nrows() - 1).iter().copied().collect();
        if let Some(first) = rows.first()
            && first.len() != last.len()
        {
            return Err(BatchError::malformed(format!(
                "{} has {} columns, expected {}",
                file.display(),
                last.len(),
                first.len()
            )));
        }
        rows.push(last);
    }
    let ncols = rows.first().map_or(0, Vec::len);
    Ok(DMatrix::from_row_iterator(
        rows.len(),
        ncols,
        rows.into_iter().flatten(),
    ))
}

fn permute_rows(m: &DMatrix<f64>, order: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(order.len(), m.ncols(), |i, j| m[(order[i], j)])
}

/// Rotation for a Cartesian rotation vector.
pub fn rotation_from_crv(psi: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::new(*psi)
}

/// Adds `R(psi_i) * reference` to the last three columns of every row.
pub fn offset_along_line(
    deflection: &DMatrix<f64>,
    crv: &DMatrix<f64>,
    reference: &Vector3<f64>,
) -> BatchResult<DMatrix<f64>> {
    if crv.nrows() != deflection.nrows() || crv.ncols() != 3 || deflection.ncols() < 3 {
        return Err(BatchError::malformed(format!(
            "orientation {}x{} does not match deflection {}x{}",
            crv.nrows(),
            crv.ncols(),
            deflection.nrows(),
            deflection.ncols()
        )));
    }
    let first = deflection.ncols() - 3;
    let mut out = deflection.clone();
    for i in 0..out.nrows() {
        let psi = Vector3::new(crv[(i, 0)], crv[(i, 1)], crv[(i, 2)]);
        let offset = rotation_from_crv(&psi) * reference;
        for k in 0..3 {
            out[(i, first + k)] += offset[k];
        }
    }
    Ok(out)
}
