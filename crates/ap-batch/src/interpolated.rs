//! Dataset built from an interpolated model library.
//!
//! The library root holds `pmor_summary.txt`, one section per interpolated
//! case in case-index order. Artifacts for case `i` live under
//! `param_caseNN/<system>/` folders of the stability, frequency response
//! and state-space directories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ap_io::{DataSources, Manifest};
use tracing::{info, warn};

use crate::actual::{insert_case, load_requested};
use crate::case::Case;
use crate::config::BulkLoadOptions;
use crate::dataset::{Dataset, SystemSets};
use crate::error::{BatchError, BatchResult};
use crate::parameter::ManifestParameters;
use crate::progress::{BulkLoadEvent, BulkLoadStage, emit_progress};
use crate::set::SetOfCases;
use crate::system::{ArtifactKind, PathLayout, System};

pub const SUMMARY_FILE: &str = "pmor_summary.txt";

/// Artifacts loaded when the options request none.
const DEFAULT_ARTIFACTS: [ArtifactKind; 3] =
    [ArtifactKind::Bode, ArtifactKind::StateSpace, ArtifactKind::Eigs];

#[derive(Debug)]
pub struct Interpolated {
    path: PathBuf,
    summary: Manifest,
    parameter_name: Option<String>,
    sets: SystemSets,
    sources: DataSources,
}

impl Interpolated {
    pub fn open(path: impl Into<PathBuf>) -> BatchResult<Self> {
        Self::with_sources(path, DataSources::default())
    }

    pub fn with_sources(path: impl Into<PathBuf>, sources: DataSources) -> BatchResult<Self> {
        let path = path.into();
        let summary = Manifest::read(&path.join(SUMMARY_FILE))?;
        Ok(Self::from_summary(path, summary, sources))
    }

    pub fn from_summary(path: impl Into<PathBuf>, summary: Manifest, sources: DataSources) -> Self {
        Self {
            path: path.into(),
            summary,
            parameter_name: None,
            sets: SystemSets::default(),
            sources,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary(&self) -> &Manifest {
        &self.summary
    }

    /// Name of the interpolation parameter, known once cases are loaded.
    pub fn parameter_name(&self) -> Option<&str> {
        self.parameter_name.as_deref()
    }

    pub fn aeroelastic(&self) -> &SetOfCases {
        &self.sets.aeroelastic
    }

    pub fn aerodynamic(&self) -> &SetOfCases {
        &self.sets.aerodynamic
    }

    pub fn structural(&self) -> &SetOfCases {
        &self.sets.structural
    }

    pub fn load_bulk_cases(&mut self, options: &BulkLoadOptions) -> BatchResult<usize> {
        self.load_bulk_cases_with_progress(options, None)
    }

    /// `sources`, `path_rewrite` and `parallel` have no effect on an
    /// interpolated library.
    pub fn load_bulk_cases_with_progress(
        &mut self,
        options: &BulkLoadOptions,
        mut progress_cb: Option<&mut dyn FnMut(BulkLoadEvent)>,
    ) -> BatchResult<usize> {
        let started = Instant::now();
        let artifacts: BTreeSet<ArtifactKind> = if options.artifacts.is_empty() {
            DEFAULT_ARTIFACTS.into_iter().collect()
        } else {
            options.artifacts.clone()
        };
        let layout = PathLayout::new(options.eigs_naming, self.sources.containers.extension());
        let summary_path = self.summary.path().to_path_buf();

        let mut loaded = 0;
        let entries = self.summary.sections().iter().filter(|s| !s.name.is_empty());
        for (ith, section) in entries.enumerate() {
            let parsed = ManifestParameters::from_section(section).and_then(|parameters| {
                let value = parameters.value(options.parameter_mode)?;
                Ok((parameters, value))
            });
            let (parameters, value) = match parsed {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(section = %section.name, error = %err, "interpolated case rejected");
                    emit_progress(
                        &mut progress_cb,
                        started,
                        BulkLoadStage::SourceRejected {
                            source: summary_path.clone(),
                            reason: format!("[{}] {err}", section.name),
                        },
                    );
                    continue;
                }
            };
            let case_dir = format!("param_case{ith:02}");

            for system in System::ALL {
                let mut case = Case::new(value.clone(), system, self.path.clone());
                case.name = case_dir.clone();
                case.parameter_names = parameters.names.clone();
                case.case_info = parameters.dict.clone();
                case.verbose = options.verbose;
                for kind in ArtifactKind::ALL {
                    if let Some(path) = layout.interpolated_path(kind, &self.path, ith, system) {
                        case.path_to_sys.insert(kind, path);
                    }
                }

                let set = self.sets.get_mut(system);
                if options.append && set.contains_parameter_value(&value) {
                    emit_progress(
                        &mut progress_cb,
                        started,
                        BulkLoadStage::CaseSkipped {
                            system,
                            parameter: value.clone(),
                        },
                    );
                    continue;
                }
                for artifact in load_requested(&mut case, &artifacts, &self.sources) {
                    emit_progress(
                        &mut progress_cb,
                        started,
                        BulkLoadStage::ArtifactUnavailable {
                            system,
                            parameter: value.clone(),
                            artifact,
                        },
                    );
                }
                let stage = insert_case(set, case, &value, &parameters.dict, options.append)?;
                emit_progress(&mut progress_cb, started, stage);
            }
            self.parameter_name = parameters.names.first().cloned();
            loaded += 1;
        }

        info!(loaded, path = %self.path.display(), "Loaded {loaded} interpolated cases");
        let attempted = if loaded == 0 {
            vec![summary_path]
        } else {
            Vec::new()
        };
        emit_progress(
            &mut progress_cb,
            started,
            BulkLoadStage::Completed {
                loaded,
                attempted: attempted.clone(),
            },
        );
        if loaded == 0 {
            return Err(BatchError::NoCasesLoaded { attempted });
        }
        Ok(loaded)
    }
}

impl Dataset for Interpolated {
    fn sets(&self) -> &SystemSets {
        &self.sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterValue;

    fn summary(content: &str) -> Manifest {
        Manifest::parse(content, Path::new("/lib/pmor_summary.txt")).unwrap()
    }

    #[test]
    fn cases_follow_summary_order() {
        let mut lib = Interpolated::from_summary(
            "/nonexistent-lib",
            summary("[case_a]\nu_inf = 12.5\n[case_b]\nu_inf = 15.0\n"),
            DataSources::default(),
        );
        let loaded = lib
            .load_bulk_cases(&BulkLoadOptions::with_artifacts([ArtifactKind::Eigs]))
            .unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(lib.parameter_name(), Some("u_inf"));
        assert_eq!(lib.aeroelastic().n_cases(), 2);
        let second = &lib.structural()[1];
        assert_eq!(second.parameter_value, ParameterValue::Vector(vec![15.0]));
        assert_eq!(
            second.path_to_sys[&ArtifactKind::Eigs],
            Path::new("/nonexistent-lib/stability/param_case01/structural/_eigenvalues.dat")
        );
        assert!(second.eigs.is_none());
    }

    #[test]
    fn empty_summary_reports_attempt() {
        let mut lib = Interpolated::from_summary(
            "/nonexistent-lib",
            summary("# nothing\n"),
            DataSources::default(),
        );
        match lib.load_bulk_cases(&BulkLoadOptions::default()) {
            Err(BatchError::NoCasesLoaded { attempted }) => {
                assert_eq!(attempted, vec![PathBuf::from("/lib/pmor_summary.txt")]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn append_skips_known_values() {
        let mut lib = Interpolated::from_summary(
            "/nonexistent-lib",
            summary("[a]\nu_inf = 10\n"),
            DataSources::default(),
        );
        let options = BulkLoadOptions {
            append: true,
            ..BulkLoadOptions::with_artifacts([ArtifactKind::Eigs])
        };
        lib.load_bulk_cases(&options).unwrap();
        lib.load_bulk_cases(&options).unwrap();
        assert_eq!(lib.aeroelastic().n_cases(), 1);
    }
}
