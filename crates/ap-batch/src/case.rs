//! A single simulation output for one physical system at one parameter point.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use ap_core::CaseId;
use ap_io::{DataSources, TableSource};
use ap_linear::{Bode, Stability, StateSpace};
use nalgebra::{DMatrix, DVector, Vector3};
use tracing::{debug, warn};

use crate::deflection::{load_nodal_samples, offset_along_line};
use crate::error::{BatchError, BatchResult};
use crate::parameter::{ParamDict, ParameterValue};
use crate::system::{ArtifactKind, EigsNaming, FREQUENCIES_FILE, MOMENTS_FILE, PathLayout, System};

/// Result of a loader call that did not fail hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Already populated and no refresh was requested.
    AlreadyLoaded,
    /// Failure was logged and the artifact left unset.
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub parameter_value: ParameterValue,
    pub parameter_names: Vec<String>,
    /// Full manifest parameter mapping.
    pub case_info: ParamDict,
    pub system: System,
    /// Simulation output directory.
    pub path: PathBuf,
    pub path_to_sys: BTreeMap<ArtifactKind, PathBuf>,
    /// Fallback eigenvalue file when `path_to_sys` has no entry.
    pub path_to_eigs: Option<PathBuf>,
    pub alpha: Option<f64>,
    /// Unavailable artifacts are reported at `warn` instead of `debug`.
    pub verbose: bool,
    case_id: Option<CaseId>,

    pub eigs: Option<DMatrix<f64>>,
    pub bode: Option<Bode>,
    pub ss: Option<StateSpace>,
    /// Final nodal positions sorted by spanwise coordinate.
    pub deflection: Option<DMatrix<f64>>,
    /// Nodal rotation vectors, row-aligned with `deflection`.
    pub crv: Option<DMatrix<f64>>,
    pub beam_eigs: Option<DMatrix<f64>>,
    pub aero_forces: Option<DVector<f64>>,
    pub aero_moments: Option<DVector<f64>>,
    pub stability: Option<Stability>,
}

impl Case {
    pub fn new(
        parameter_value: impl Into<ParameterValue>,
        system: System,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: String::new(),
            parameter_value: parameter_value.into(),
            parameter_names: Vec::new(),
            case_info: ParamDict::new(),
            system,
            path: path.into(),
            path_to_sys: BTreeMap::new(),
            path_to_eigs: None,
            alpha: None,
            verbose: false,
            case_id: None,
            eigs: None,
            bode: None,
            ss: None,
            deflection: None,
            crv: None,
            beam_eigs: None,
            aero_forces: None,
            aero_moments: None,
            stability: None,
        }
    }

    pub fn case_id(&self) -> Option<CaseId> {
        self.case_id
    }

    /// Ids are assigned once, by the owning collection.
    pub fn set_case_id(&mut self, id: CaseId) -> BatchResult<()> {
        if let Some(existing) = self.case_id {
            warn!(
                system = %self.system,
                parameter = %self.parameter_value,
                existing = %existing,
                requested = %id,
                "case id already set and will not be changed"
            );
            return Err(BatchError::CaseIdAlreadySet {
                existing,
                requested: id,
            });
        }
        self.case_id = Some(id);
        Ok(())
    }

    /// Explicit path, else the registered path for `kind`, else the
    /// eigenvalue fallback, else the conventional location under `path`.
    pub fn resolve_path(
        &self,
        kind: ArtifactKind,
        explicit: Option<&Path>,
        sources: &DataSources,
    ) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(path) = self.path_to_sys.get(&kind) {
            return path.clone();
        }
        if kind == ArtifactKind::Eigs
            && let Some(path) = &self.path_to_eigs
        {
            return path.clone();
        }
        PathLayout::new(EigsNaming::default(), sources.containers.extension()).path(
            kind,
            &self.path,
            self.system,
        )
    }

    pub fn load_eigs(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> LoadOutcome {
        if self.eigs.is_some() && !refresh {
            return LoadOutcome::AlreadyLoaded;
        }
        match self.fetch(ArtifactKind::Eigs, path, sources, |p, s| {
            read_eigs(p, s.tables.as_ref())
        }) {
            Ok(eigs) => {
                self.eigs = Some(eigs);
                LoadOutcome::Loaded
            }
            Err(_) => LoadOutcome::Unavailable,
        }
    }

    pub fn load_bode(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> LoadOutcome {
        if self.bode.is_some() && !refresh {
            return LoadOutcome::AlreadyLoaded;
        }
        match self.fetch(ArtifactKind::Bode, path, sources, |p, s| {
            let container = s.containers.read_container(p)?;
            Ok(Bode::from_container(&container)?)
        }) {
            Ok(bode) => {
                self.bode = Some(bode);
                LoadOutcome::Loaded
            }
            Err(_) => LoadOutcome::Unavailable,
        }
    }

    /// Unlike the eigenvalue and frequency-response loaders, a missing
    /// state-space file is returned to the caller.
    pub fn load_ss(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> BatchResult<LoadOutcome> {
        if self.ss.is_some() && !refresh {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        let ss = self.fetch(ArtifactKind::StateSpace, path, sources, |p, s| {
            let container = s.containers.read_container(p)?;
            Ok(StateSpace::from_container(&container)?)
        })?;
        self.ss = Some(ss);
        Ok(LoadOutcome::Loaded)
    }

    /// `path` is the deflection directory holding per-node sample files.
    pub fn load_deflection(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> LoadOutcome {
        if self.deflection.is_some() && !refresh {
            return LoadOutcome::AlreadyLoaded;
        }
        let samples = self.fetch(ArtifactKind::Deflection, path, sources, |p, s| {
            load_nodal_samples(p, s.tables.as_ref())
        });
        match samples {
            Ok(Some(samples)) => {
                if let Some(err) = &samples.crv_error {
                    let dir = self.resolve_path(ArtifactKind::Deflection, path, sources);
                    warn!(
                        system = %self.system,
                        parameter = %self.parameter_value,
                        path = %dir.display(),
                        error = %err,
                        "orientation samples unusable, deflection kept without them"
                    );
                } else if samples.crv.is_none() {
                    debug!(
                        system = %self.system,
                        parameter = %self.parameter_value,
                        "no orientation samples, deflection kept without line correction"
                    );
                }
                self.deflection = Some(samples.deflection);
                self.crv = samples.crv;
                LoadOutcome::Loaded
            }
            Ok(None) => {
                let dir = self.resolve_path(ArtifactKind::Deflection, path, sources);
                self.report_unavailable(
                    ArtifactKind::Deflection,
                    &dir,
                    &"no position sample files",
                );
                LoadOutcome::Unavailable
            }
            Err(_) => LoadOutcome::Unavailable,
        }
    }

    /// `path` is the modal analysis directory containing `frequencies.dat`.
    pub fn load_beam_modal_analysis(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> BatchResult<LoadOutcome> {
        if self.beam_eigs.is_some() && !refresh {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        let beam_eigs = self.fetch(ArtifactKind::BeamModalAnalysis, path, sources, |p, s| {
            let table = s.tables.read_table(&p.join(FREQUENCIES_FILE))?;
            // row-major flattening of however the frequencies were laid out
            let frequencies: Vec<f64> = table.transpose().iter().copied().collect();
            Ok(DMatrix::from_fn(frequencies.len(), 2, |i, j| {
                if j == 1 { frequencies[i] } else { 0.0 }
            }))
        })?;
        self.beam_eigs = Some(beam_eigs);
        Ok(LoadOutcome::Loaded)
    }

    /// Last sample of the integrated aerodynamic forces. Moments are read
    /// from `aeromoments.txt` next to the forces file when it exists.
    pub fn load_forces(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> BatchResult<LoadOutcome> {
        if self.aero_forces.is_some() && !refresh {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        let forces_path = self.resolve_path(ArtifactKind::Forces, path, sources);
        let forces = self.fetch(ArtifactKind::Forces, Some(forces_path.as_path()), sources, |p, s| {
            last_sample(p, s.tables.as_ref())
        })?;
        self.aero_forces = Some(forces);

        let moments_path = forces_path.with_file_name(MOMENTS_FILE);
        self.aero_moments = match last_sample(&moments_path, sources.tables.as_ref()) {
            Ok(moments) => Some(moments),
            Err(BatchError::Io(err)) if err.is_not_found() => {
                debug!(path = %moments_path.display(), "no moments file");
                None
            }
            Err(err) => {
                self.report_unavailable(ArtifactKind::Forces, &moments_path, &err);
                None
            }
        };
        Ok(LoadOutcome::Loaded)
    }

    /// `path` is the stability directory holding `velocity*.dat` sweeps.
    pub fn load_stability(
        &mut self,
        sources: &DataSources,
        path: Option<&Path>,
        refresh: bool,
    ) -> BatchResult<LoadOutcome> {
        if self.stability.is_some() && !refresh {
            return Ok(LoadOutcome::AlreadyLoaded);
        }
        let stability = self.fetch(ArtifactKind::Stability, path, sources, |p, s| {
            Ok(Stability::from_dir(p, s.tables.as_ref())?)
        })?;
        self.stability = Some(stability);
        Ok(LoadOutcome::Loaded)
    }

    /// Deflection with each node shifted by `reference` rotated into that
    /// node's orientation. Without orientation data the raw deflection is
    /// returned.
    pub fn get_deflection_at_line(&self, reference: &Vector3<f64>) -> BatchResult<DMatrix<f64>> {
        let deflection = self.deflection.as_ref().ok_or_else(|| {
            BatchError::not_found(format!(
                "deflection for {} case at {}",
                self.system, self.parameter_value
            ))
        })?;
        match &self.crv {
            Some(crv) => offset_along_line(deflection, crv, reference),
            None => Ok(deflection.clone()),
        }
    }

    fn fetch<T>(
        &self,
        kind: ArtifactKind,
        explicit: Option<&Path>,
        sources: &DataSources,
        read: impl FnOnce(&Path, &DataSources) -> BatchResult<T>,
    ) -> BatchResult<T> {
        let path = self.resolve_path(kind, explicit, sources);
        match read(&path, sources) {
            Ok(value) => {
                debug!(
                    system = %self.system,
                    parameter = %self.parameter_value,
                    artifact = %kind,
                    path = %path.display(),
                    "loaded artifact"
                );
                Ok(value)
            }
            Err(err) => {
                self.report_unavailable(kind, &path, &err);
                Err(err)
            }
        }
    }

    fn report_unavailable(&self, kind: ArtifactKind, path: &Path, reason: &dyn fmt::Display) {
        if self.verbose {
            warn!(
                system = %self.system,
                parameter = %self.parameter_value,
                artifact = %kind,
                path = %path.display(),
                reason = %reason,
                "artifact unavailable"
            );
        } else {
            debug!(
                system = %self.system,
                parameter = %self.parameter_value,
                artifact = %kind,
                path = %path.display(),
                reason = %reason,
                "artifact unavailable"
            );
        }
    }
}

fn read_eigs(path: &Path, tables: &dyn TableSource) -> BatchResult<DMatrix<f64>> {
    let eigs = tables.read_table(path)?;
    if eigs.ncols() != 2 {
        return Err(BatchError::malformed(format!(
            "eigenvalues in {} are {}x{}, expected N x 2",
            path.display(),
            eigs.nrows(),
            eigs.ncols()
        )));
    }
    Ok(eigs)
}

fn last_sample(path: &Path, tables: &dyn TableSource) -> BatchResult<DVector<f64>> {
    let table = tables.read_table(path)?;
    if table.nrows() == 0 {
        return Err(BatchError::malformed(format!("no samples in {}", path.display())));
    }
    Ok(table.row(table.nrows() - 1).transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ap_core::ErrorKind;
    use std::sync::Arc;

    use ap_io::{Container, ContainerArray, ContainerSource, JsonContainers, IoError, IoResult};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        dir.push(format!("{}_{}", prefix, nanos));
        std::fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn write_container(path: &Path, entries: Vec<(&str, ContainerArray)>) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        let entries = entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Container::new(path, entries)
            .write_json(path)
            .expect("failed to write container");
    }

    /// Serves tables from memory keyed by path.
    struct MemoryTables(BTreeMap<PathBuf, DMatrix<f64>>);

    impl TableSource for MemoryTables {
        fn read_table(&self, path: &Path) -> IoResult<DMatrix<f64>> {
            self.0.get(path).cloned().ok_or_else(|| IoError::NotFound {
                path: path.to_path_buf(),
            })
        }
    }

    fn sources(tables: Vec<(&str, DMatrix<f64>)>) -> DataSources {
        let map = tables
            .into_iter()
            .map(|(p, m)| (PathBuf::from(p), m))
            .collect();
        let containers: Arc<dyn ContainerSource> = Arc::new(JsonContainers);
        DataSources::new(Arc::new(MemoryTables(map)), containers)
    }

    #[test]
    fn case_id_assigned_once() {
        let mut case = Case::new(1.0, System::Aeroelastic, "/c");
        let first = CaseId::new(1).unwrap();
        case.set_case_id(first).unwrap();
        let err = case.set_case_id(CaseId::new(2).unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invariant);
        assert_eq!(case.case_id(), Some(first));
    }

    #[test]
    fn path_resolution_order() {
        let src = DataSources::default();
        let mut case = Case::new(1.0, System::Structural, "/c");
        assert_eq!(
            case.resolve_path(ArtifactKind::Eigs, None, &src),
            Path::new("/c/stability/eigenvalues.dat")
        );
        case.path_to_eigs = Some(PathBuf::from("/fallback.dat"));
        assert_eq!(
            case.resolve_path(ArtifactKind::Eigs, None, &src),
            Path::new("/fallback.dat")
        );
        case.path_to_sys
            .insert(ArtifactKind::Eigs, PathBuf::from("/registered.dat"));
        assert_eq!(
            case.resolve_path(ArtifactKind::Eigs, None, &src),
            Path::new("/registered.dat")
        );
        assert_eq!(
            case.resolve_path(ArtifactKind::Eigs, Some(Path::new("/x.dat")), &src),
            Path::new("/x.dat")
        );
    }

    #[test]
    fn eigs_load_is_idempotent_unless_refreshed() {
        let eigs = DMatrix::from_row_slice(1, 2, &[-0.1, 3.0]);
        let src = sources(vec![("/c/stability/eigenvalues.dat", eigs.clone())]);
        let mut case = Case::new(1.0, System::Aeroelastic, "/c");

        assert_eq!(case.load_eigs(&src, None, false), LoadOutcome::Loaded);
        assert_eq!(case.load_eigs(&src, None, false), LoadOutcome::AlreadyLoaded);
        assert_eq!(case.load_eigs(&src, None, true), LoadOutcome::Loaded);
        assert_eq!(case.eigs, Some(eigs));
    }

    #[test]
    fn missing_eigs_is_not_fatal() {
        let src = sources(vec![]);
        let mut case = Case::new(1.0, System::Aeroelastic, "/c");
        assert_eq!(case.load_eigs(&src, None, false), LoadOutcome::Unavailable);
        assert!(case.eigs.is_none());
        assert_eq!(case.load_bode(&src, None, false), LoadOutcome::Unavailable);
    }

    #[test]
    fn bode_loads_from_default_layout() {
        let dir = unique_temp_dir("ap_case_bode");
        write_container(
            &dir.join("frequencyresponse").join("aeroelastic.freqresp.json"),
            vec![
                ("frequency", ContainerArray::real(vec![2], vec![1.0, 2.0])),
                (
                    "response",
                    ContainerArray::complex(vec![1, 1, 2], vec![1.0, 0.5], vec![0.0, -0.5]),
                ),
            ],
        );
        let mut case = Case::new(1.0, System::Aeroelastic, dir.clone());
        let src = DataSources::default();
        assert_eq!(case.load_bode(&src, None, false), LoadOutcome::Loaded);
        let bode = case.bode.as_ref().unwrap();
        assert_eq!(bode.wv, vec![1.0, 2.0]);
        assert_eq!(bode.yfreq[1][(0, 0)].im, -0.5);
        assert_eq!(case.load_bode(&src, None, false), LoadOutcome::AlreadyLoaded);
    }

    #[test]
    fn state_space_loads_from_default_layout() {
        let dir = unique_temp_dir("ap_case_ss");
        write_container(
            &dir.join("statespace").join("structural.statespace.json"),
            vec![
                ("a", ContainerArray::real(vec![1, 1], vec![-2.0])),
                ("b", ContainerArray::real(vec![1, 1], vec![1.0])),
                ("c", ContainerArray::real(vec![1, 1], vec![3.0])),
                ("d", ContainerArray::real(vec![1, 1], vec![0.0])),
                ("dt", ContainerArray::scalar(0.1)),
            ],
        );
        let mut case = Case::new(1.0, System::Structural, dir.clone());
        let src = DataSources::default();
        assert_eq!(case.load_ss(&src, None, false).unwrap(), LoadOutcome::Loaded);
        let ss = case.ss.as_ref().unwrap();
        assert_eq!(ss.a[(0, 0)], -2.0);
        assert_eq!(ss.c[(0, 0)], 3.0);
        assert_eq!(ss.dt, Some(0.1));
    }

    #[test]
    fn missing_forces_and_ss_propagate() {
        let src = sources(vec![]);
        let mut case = Case::new(1.0, System::Aeroelastic, "/nonexistent-case-dir");
        assert_eq!(
            case.load_forces(&src, None, false).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            case.load_beam_modal_analysis(&src, None, false)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert!(case.load_ss(&src, None, false).is_err());
    }

    #[test]
    fn forces_take_last_sample_and_optional_moments() {
        let forces = DMatrix::from_row_slice(2, 3, &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        let src = sources(vec![("/c/forces/aeroforces.txt", forces)]);
        let mut case = Case::new(1.0, System::Aeroelastic, "/c");
        assert_eq!(case.load_forces(&src, None, false).unwrap(), LoadOutcome::Loaded);
        assert_eq!(case.aero_forces.as_ref().unwrap().as_slice(), &[1.0, 2.0, 3.0]);
        assert!(case.aero_moments.is_none());
    }

    #[test]
    fn beam_frequencies_in_second_column() {
        let freqs = DMatrix::from_row_slice(3, 1, &[1.5, 4.0, 9.0]);
        let src = sources(vec![("/c/beam_modal_analysis/frequencies.dat", freqs)]);
        let mut case = Case::new(1.0, System::Structural, "/c");
        case.load_beam_modal_analysis(&src, None, false).unwrap();
        let beam = case.beam_eigs.unwrap();
        assert_eq!(beam.shape(), (3, 2));
        assert_eq!(beam.column(0).sum(), 0.0);
        assert_eq!(beam[(2, 1)], 9.0);
    }

    #[test]
    fn deflection_at_line_without_orientation_is_raw() {
        let mut case = Case::new(1.0, System::Aeroelastic, "/c");
        assert!(case.get_deflection_at_line(&Vector3::zeros()).is_err());
        let raw = DMatrix::from_row_slice(1, 3, &[0.0, 1.0, 2.0]);
        case.deflection = Some(raw.clone());
        assert_eq!(
            case.get_deflection_at_line(&Vector3::new(1.0, 1.0, 1.0)).unwrap(),
            raw
        );
    }
}
