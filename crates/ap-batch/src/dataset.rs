//! Aggregate queries across the cases of a built dataset.
//!
//! Every query skips cases that lack the artifact it needs and fails with a
//! not-found error only when no case in the collection has it.

use std::str::FromStr;

use ap_linear::{ModeFilter, find_flutter_speed, modes};
use nalgebra::{DMatrix, DVector, Rotation3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::case::Case;
use crate::error::{BatchError, BatchResult};
use crate::parameter::ParameterValue;
use crate::set::SetOfCases;
use crate::system::System;

/// One collection per physical system.
#[derive(Debug, Clone, Default)]
pub struct SystemSets {
    pub aeroelastic: SetOfCases,
    pub aerodynamic: SetOfCases,
    pub structural: SetOfCases,
}

impl SystemSets {
    pub fn get(&self, system: System) -> &SetOfCases {
        match system {
            System::Aeroelastic => &self.aeroelastic,
            System::Aerodynamic => &self.aerodynamic,
            System::Structural => &self.structural,
        }
    }

    pub fn get_mut(&mut self, system: System) -> &mut SetOfCases {
        match system {
            System::Aeroelastic => &mut self.aeroelastic,
            System::Aerodynamic => &mut self.aerodynamic,
            System::Structural => &mut self.structural,
        }
    }
}

/// Reference frame of vector results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Body-attached frame `A`.
    Body,
    /// Inertial frame `G`.
    Global,
}

impl FromStr for Frame {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "a" | "A" | "body" => Ok(Frame::Body),
            "g" | "G" | "global" | "ground" => Ok(Frame::Global),
            other => Err(BatchError::invalid(format!(
                "frame can only be A or G, found '{other}'"
            ))),
        }
    }
}

/// Eigenvalues of every case in a system, with the case parameter repeated
/// on each eigenvalue row.
#[derive(Debug, Clone, PartialEq)]
pub struct EigsSweep {
    /// `rows x parameter count`
    pub parameters: DMatrix<f64>,
    /// `rows x 2`
    pub eigs: DMatrix<f64>,
}

/// One vector per case, sorted ascending by parameter value.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSweep {
    pub parameters: Vec<ParameterValue>,
    pub values: Vec<Vector3<f64>>,
}

impl VectorSweep {
    fn sorted(mut entries: Vec<(ParameterValue, Vector3<f64>)>) -> Self {
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (parameters, values) = entries.into_iter().unzip();
        Self { parameters, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `len x 3`
    pub fn to_table(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.len(), 3, |i, j| self.values[i][j])
    }
}

/// Eigenvalue window for [`Dataset::damping_map`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingFilter {
    /// Natural frequencies at or above this are discarded (rad/s).
    pub max_fn: f64,
    pub max_damp: f64,
}

impl Default for DampingFilter {
    fn default() -> Self {
        Self {
            max_fn: 500.0,
            max_damp: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampingPoint {
    pub x: f64,
    pub y: f64,
    pub max_damping: f64,
}

pub trait Dataset {
    fn sets(&self) -> &SystemSets;

    fn cases(&self, system: System) -> &SetOfCases {
        self.sets().get(system)
    }

    fn eigs(&self, system: System) -> BatchResult<EigsSweep> {
        eigs_sweep(self.cases(system), system)
    }

    /// Final three columns of the last deflection row of every aeroelastic
    /// case, after the reference line correction. Global results are
    /// rotated by `alpha` degrees about the pitch axis.
    fn wing_tip_deflection(
        &self,
        frame: Frame,
        alpha: f64,
        reference_line: &Vector3<f64>,
    ) -> BatchResult<VectorSweep> {
        let cga = Rotation3::from_axis_angle(&Vector3::y_axis(), alpha.to_radians());
        let mut entries = Vec::new();
        for case in with_artifact(self.cases(System::Aeroelastic), "deflection", |c| {
            c.deflection.is_some()
        }) {
            let tip = tip_of(&case.get_deflection_at_line(reference_line)?, case)?;
            let tip = match frame {
                Frame::Body => tip,
                Frame::Global => cga * tip,
            };
            entries.push((case.parameter_value.clone(), tip));
        }
        if entries.is_empty() {
            return Err(BatchError::not_found("deflection data in aeroelastic cases"));
        }
        Ok(VectorSweep::sorted(entries))
    }

    fn forces(&self, frame: Frame) -> BatchResult<VectorSweep> {
        frame_sweep(self.cases(System::Aeroelastic), frame, "forces", |c| {
            c.aero_forces.as_ref()
        })
    }

    fn moments(&self, frame: Frame) -> BatchResult<VectorSweep> {
        frame_sweep(self.cases(System::Aeroelastic), frame, "moments", |c| {
            c.aero_moments.as_ref()
        })
    }

    /// Least stable damping ratio of every aeroelastic case, keyed by two
    /// named parameters, for contouring over the parameter plane.
    fn damping_map(
        &self,
        x_param: &str,
        y_param: &str,
        filter: &DampingFilter,
    ) -> BatchResult<Vec<DampingPoint>> {
        let mut points = Vec::new();
        for case in self.cases(System::Aeroelastic) {
            let Some(eigs) = &case.eigs else { continue };
            let x = named_parameter(case, x_param)?;
            let y = named_parameter(case, y_param)?;
            let max_damping = eigs
                .row_iter()
                .filter_map(|row| {
                    let wn = row[0].hypot(row[1]);
                    let damp = row[0] / wn;
                    (wn > 0.0 && wn < filter.max_fn && damp < filter.max_damp).then_some(damp)
                })
                .reduce(f64::max);
            match max_damping {
                Some(max_damping) => points.push(DampingPoint { x, y, max_damping }),
                None => debug!(
                    parameter = %case.parameter_value,
                    "no eigenvalues inside the damping window"
                ),
            }
        }
        if points.is_empty() {
            return Err(BatchError::not_found(
                "eigenvalues inside the damping window in aeroelastic cases",
            ));
        }
        Ok(points)
    }

    /// Flutter speeds of every aeroelastic case carrying a velocity sweep,
    /// sorted by parameter value.
    fn flutter_speeds(&self, filter: &ModeFilter) -> BatchResult<Vec<(ParameterValue, Vec<f64>)>> {
        let mut out = Vec::new();
        for case in self.cases(System::Aeroelastic) {
            let Some(stability) = &case.stability else { continue };
            let filtered = modes(&stability.v, &stability.eigs, filter)?;
            let speeds = find_flutter_speed(&filtered.velocity, &filtered.damping)?;
            out.push((case.parameter_value.clone(), speeds));
        }
        if out.is_empty() {
            return Err(BatchError::not_found("velocity sweeps in aeroelastic cases"));
        }
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(out)
    }
}

impl Dataset for SystemSets {
    fn sets(&self) -> &SystemSets {
        self
    }
}

fn eigs_sweep(set: &SetOfCases, system: System) -> BatchResult<EigsSweep> {
    let cases: Vec<(&Case, &DMatrix<f64>)> = set
        .iter()
        .filter_map(|c| c.eigs.as_ref().map(|e| (c, e)))
        .collect();
    let Some((first, _)) = cases.first() else {
        return Err(BatchError::not_found(format!(
            "eigenvalue data in {system} cases"
        )));
    };

    let arity = first.parameter_value.len();
    if let Some((odd, e)) = cases.iter().find(|(_, e)| e.ncols() != 2) {
        return Err(BatchError::malformed(format!(
            "eigenvalues at {} are {}x{}, expected N x 2",
            odd.parameter_value,
            e.nrows(),
            e.ncols()
        )));
    }
    if let Some((odd, _)) = cases
        .iter()
        .find(|(c, _)| c.parameter_value.len() != arity)
    {
        return Err(BatchError::malformed(format!(
            "parameter {} has {} entries, expected {arity}",
            odd.parameter_value,
            odd.parameter_value.len()
        )));
    }

    let rows: usize = cases.iter().map(|(_, e)| e.nrows()).sum();
    let mut parameters = DMatrix::zeros(rows, arity);
    let mut eigs = DMatrix::zeros(rows, 2);
    let mut offset = 0;
    for (case, case_eigs) in cases {
        let n = case_eigs.nrows();
        let values = case.parameter_value.as_slice();
        for i in 0..n {
            for (j, &p) in values.iter().enumerate() {
                parameters[(offset + i, j)] = p;
            }
        }
        eigs.rows_mut(offset, n).copy_from(case_eigs);
        offset += n;
    }
    Ok(EigsSweep { parameters, eigs })
}

fn with_artifact<'a>(
    set: &'a SetOfCases,
    artifact: &'static str,
    has: impl Fn(&Case) -> bool + 'a,
) -> impl Iterator<Item = &'a Case> + 'a {
    set.iter().filter(move |case| {
        let present = has(case);
        if !present {
            debug!(parameter = %case.parameter_value, artifact, "case skipped, artifact not loaded");
        }
        present
    })
}

fn tip_of(deflection: &DMatrix<f64>, case: &Case) -> BatchResult<Vector3<f64>> {
    let (rows, cols) = deflection.shape();
    if rows == 0 || cols < 3 {
        return Err(BatchError::malformed(format!(
            "deflection at {} is {rows}x{cols}",
            case.parameter_value
        )));
    }
    Ok(Vector3::new(
        deflection[(rows - 1, cols - 3)],
        deflection[(rows - 1, cols - 2)],
        deflection[(rows - 1, cols - 1)],
    ))
}

fn frame_sweep(
    set: &SetOfCases,
    frame: Frame,
    what: &'static str,
    select: impl Fn(&Case) -> Option<&DVector<f64>>,
) -> BatchResult<VectorSweep> {
    // layout: time, three global components, three unused, three body components
    let start = match frame {
        Frame::Global => 1,
        Frame::Body => 7,
    };
    let mut entries = Vec::new();
    for case in set {
        let Some(values) = select(case) else {
            debug!(parameter = %case.parameter_value, artifact = what, "case skipped, artifact not loaded");
            continue;
        };
        if values.len() < start + 3 {
            return Err(BatchError::malformed(format!(
                "{what} at {} have {} entries",
                case.parameter_value,
                values.len()
            )));
        }
        entries.push((
            case.parameter_value.clone(),
            Vector3::new(values[start], values[start + 1], values[start + 2]),
        ));
    }
    if entries.is_empty() {
        return Err(BatchError::not_found(format!("{what} in aeroelastic cases")));
    }
    Ok(VectorSweep::sorted(entries))
}

fn named_parameter(case: &Case, key: &str) -> BatchResult<f64> {
    case.case_info.get(key).ok_or_else(|| {
        BatchError::not_found(format!(
            "parameter '{key}' in case {} ({})",
            case.name, case.parameter_value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParamDict;
    use ap_core::{ErrorKind, Tolerances, nearly_equal};
    use ap_linear::Stability;

    fn aeroelastic(value: impl Into<ParameterValue>) -> Case {
        Case::new(value, System::Aeroelastic, "/c")
    }

    fn insert(sets: &mut SystemSets, case: Case) {
        let value = case.parameter_value.clone();
        let dict = case.case_info.clone();
        sets.get_mut(case.system).add_case(value, case, Some(dict)).unwrap();
    }

    #[test]
    fn frame_names() {
        assert_eq!("a".parse::<Frame>().unwrap(), Frame::Body);
        assert_eq!("G".parse::<Frame>().unwrap(), Frame::Global);
        assert_eq!("x".parse::<Frame>().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn eigs_broadcast_parameters() {
        let mut sets = SystemSets::default();
        let mut a = aeroelastic(vec![1.0, 2.0]);
        a.eigs = Some(DMatrix::from_row_slice(2, 2, &[-1.0, 1.0, -2.0, 2.0]));
        let mut b = aeroelastic(vec![3.0, 4.0]);
        b.eigs = Some(DMatrix::from_row_slice(1, 2, &[-3.0, 3.0]));
        insert(&mut sets, a);
        insert(&mut sets, aeroelastic(vec![5.0, 6.0]));
        insert(&mut sets, b);

        let sweep = sets.eigs(System::Aeroelastic).unwrap();
        assert_eq!(sweep.parameters.shape(), (3, 2));
        assert_eq!(sweep.parameters.row(1).iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert_eq!(sweep.parameters[(2, 0)], 3.0);
        assert_eq!(sweep.eigs[(2, 1)], 3.0);
    }

    #[test]
    fn eigs_missing_everywhere_is_not_found() {
        let mut sets = SystemSets::default();
        insert(&mut sets, aeroelastic(1.0));
        assert_eq!(
            sets.eigs(System::Aeroelastic).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(sets.eigs(System::Structural).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn tip_deflection_sorted_and_rotated() {
        let mut sets = SystemSets::default();
        for (value, z) in [(20.0, 2.0), (10.0, 1.0)] {
            let mut case = aeroelastic(value);
            case.deflection = Some(DMatrix::from_row_slice(
                2,
                4,
                &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 5.0, z],
            ));
            insert(&mut sets, case);
        }

        let body = sets.wing_tip_deflection(Frame::Body, 0.0, &Vector3::zeros()).unwrap();
        assert_eq!(body.parameters, vec![ParameterValue::Scalar(10.0), ParameterValue::Scalar(20.0)]);
        assert_eq!(body.values[0], Vector3::new(0.0, 5.0, 1.0));

        let global = sets
            .wing_tip_deflection(Frame::Global, 90.0, &Vector3::zeros())
            .unwrap();
        // about y, z goes to x
        let tol = Tolerances::default();
        assert!(nearly_equal(global.values[0].x, 1.0, tol));
        assert!(nearly_equal(global.values[0].y, 5.0, tol));
        assert!(global.values[0].z.abs() < 1e-12);
    }

    #[test]
    fn forces_slices_by_frame() {
        let mut sets = SystemSets::default();
        let mut case = aeroelastic(1.0);
        case.aero_forces = Some(DVector::from_iterator(10, (0..10).map(f64::from)));
        insert(&mut sets, case);

        let global = sets.forces(Frame::Global).unwrap();
        assert_eq!(global.values[0], Vector3::new(1.0, 2.0, 3.0));
        let body = sets.forces(Frame::Body).unwrap();
        assert_eq!(body.values[0], Vector3::new(7.0, 8.0, 9.0));
        assert_eq!(sets.moments(Frame::Body).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn damping_map_takes_least_stable_mode() {
        let mut sets = SystemSets::default();
        let mut case = aeroelastic(vec![10.0, 2.0]);
        case.case_info = ParamDict::from_iter([("u_inf", 10.0), ("alpha", 2.0)]);
        // damping -0.6 and 0.0 pass, 0.6 exceeds max_damp, the last exceeds max_fn
        case.eigs = Some(DMatrix::from_row_slice(
            4,
            2,
            &[-0.6, 0.8, 0.0, 1.0, 0.6, 0.8, -1.0, 1000.0],
        ));
        insert(&mut sets, case);

        let points = sets
            .damping_map("alpha", "u_inf", &DampingFilter::default())
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!((points[0].x, points[0].y), (2.0, 10.0));
        assert_eq!(points[0].max_damping, 0.0);
        assert!(sets.damping_map("beta", "u_inf", &DampingFilter::default()).is_err());
    }

    #[test]
    fn flutter_speeds_per_case() {
        let mut sets = SystemSets::default();
        let mut case = aeroelastic(1.0);
        let eigs = DMatrix::from_row_slice(2, 2, &[-1.0, 10.0, 1.0, 10.0]);
        case.stability = Some(Stability::new(vec![10.0, 20.0], eigs).unwrap());
        insert(&mut sets, case);
        insert(&mut sets, aeroelastic(2.0));

        let speeds = sets.flutter_speeds(&ModeFilter::default()).unwrap();
        assert_eq!(speeds.len(), 1);
        assert_eq!(speeds[0].1.len(), 1);
        assert!((speeds[0].1[0] - 15.0).abs() < 1e-9);
    }
}
