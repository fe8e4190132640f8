//! Dataset built from a tree of simulation output directories.
//!
//! Each candidate directory holds one `*.pmor.sharpy` manifest whose
//! `parameters` section identifies the case and whose `sim_info` section
//! points at the simulation output. Loading runs in two phases. Cases are
//! first read from disk, optionally on the rayon pool. They are then
//! inserted into their system's collection in source order, so ids never
//! depend on scheduling.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ap_io::{DataSources, Manifest, discover, discover_in};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::case::{Case, LoadOutcome};
use crate::config::BulkLoadOptions;
use crate::dataset::{Dataset, SystemSets};
use crate::error::{BatchError, BatchResult};
use crate::parameter::{ManifestParameters, ParamDict, ParameterValue};
use crate::progress::{BulkLoadEvent, BulkLoadStage, emit_progress};
use crate::set::SetOfCases;
use crate::system::{ArtifactKind, MANIFEST_PATTERN, PathLayout, System};

#[derive(Debug)]
pub struct Actual {
    /// Glob pattern of case directories.
    path: String,
    parameter_names: Vec<String>,
    sets: SystemSets,
    sources: DataSources,
}

pub(crate) struct PreparedCase {
    pub case: Case,
    pub unavailable: Vec<ArtifactKind>,
}

struct PreparedSource {
    source: PathBuf,
    value: ParameterValue,
    dict: ParamDict,
    names: Vec<String>,
    cases: Vec<PreparedCase>,
    skipped: Vec<System>,
}

enum SourceOutcome {
    Prepared(PreparedSource),
    ManifestMissing(PathBuf),
    Rejected { source: PathBuf, reason: String },
}

impl Actual {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_sources(path, DataSources::default())
    }

    pub fn with_sources(path: impl Into<String>, sources: DataSources) -> Self {
        Self {
            path: path.into(),
            parameter_names: Vec::new(),
            sets: SystemSets::default(),
            sources,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parameter names of the most recently loaded manifest.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
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

    /// Returns the number of case directories loaded.
    pub fn load_bulk_cases(&mut self, options: &BulkLoadOptions) -> BatchResult<usize> {
        self.load_bulk_cases_with_progress(options, None)
    }

    pub fn load_bulk_cases_with_progress(
        &mut self,
        options: &BulkLoadOptions,
        mut progress_cb: Option<&mut dyn FnMut(BulkLoadEvent)>,
    ) -> BatchResult<usize> {
        let started = Instant::now();
        emit_progress(&mut progress_cb, started, BulkLoadStage::ListingSources);

        let candidates = match &options.sources {
            Some(list) => list.clone(),
            None => discover(&self.path)?,
        };
        info!(
            pattern = %self.path,
            candidates = candidates.len(),
            parallel = options.parallel,
            "loading case directories"
        );

        let outcomes: Vec<SourceOutcome> = {
            let (sources, sets) = (&self.sources, &self.sets);
            if options.parallel {
                candidates
                    .par_iter()
                    .map(|source| prepare_source(source, options, sources, sets))
                    .collect()
            } else {
                candidates
                    .iter()
                    .map(|source| prepare_source(source, options, sources, sets))
                    .collect()
            }
        };

        let mut loaded = 0;
        for outcome in outcomes {
            match outcome {
                SourceOutcome::ManifestMissing(source) => {
                    if options.verbose {
                        warn!(source = %source.display(), "unable to find source case manifest");
                    } else {
                        debug!(source = %source.display(), "unable to find source case manifest");
                    }
                    emit_progress(
                        &mut progress_cb,
                        started,
                        BulkLoadStage::ManifestMissing { source },
                    );
                }
                SourceOutcome::Rejected { source, reason } => {
                    warn!(source = %source.display(), %reason, "case directory rejected");
                    emit_progress(
                        &mut progress_cb,
                        started,
                        BulkLoadStage::SourceRejected { source, reason },
                    );
                }
                SourceOutcome::Prepared(prepared) => {
                    emit_progress(
                        &mut progress_cb,
                        started,
                        BulkLoadStage::SourceDiscovered {
                            source: prepared.source.clone(),
                        },
                    );
                    for system in prepared.skipped {
                        emit_progress(
                            &mut progress_cb,
                            started,
                            BulkLoadStage::CaseSkipped {
                                system,
                                parameter: prepared.value.clone(),
                            },
                        );
                    }
                    for PreparedCase { case, unavailable } in prepared.cases {
                        let system = case.system;
                        for artifact in unavailable {
                            emit_progress(
                                &mut progress_cb,
                                started,
                                BulkLoadStage::ArtifactUnavailable {
                                    system,
                                    parameter: prepared.value.clone(),
                                    artifact,
                                },
                            );
                        }
                        let stage = insert_case(
                            self.sets.get_mut(system),
                            case,
                            &prepared.value,
                            &prepared.dict,
                            options.append,
                        )?;
                        emit_progress(&mut progress_cb, started, stage);
                    }
                    self.parameter_names = prepared.names;
                    loaded += 1;
                }
            }
        }

        info!(loaded, "Loaded {loaded} cases");
        let attempted = if loaded == 0 {
            candidates
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
            warn!(pattern = %self.path, attempted = ?attempted, "no cases loaded");
            return Err(BatchError::NoCasesLoaded { attempted });
        }
        Ok(loaded)
    }
}

impl Dataset for Actual {
    fn sets(&self) -> &SystemSets {
        &self.sets
    }
}

/// Append mode is checked again here since two sources in one batch can
/// share a parameter value.
pub(crate) fn insert_case(
    set: &mut SetOfCases,
    case: Case,
    value: &ParameterValue,
    dict: &ParamDict,
    append: bool,
) -> BatchResult<BulkLoadStage> {
    let system = case.system;
    if append && set.contains_parameter_value(value) {
        debug!(%system, parameter = %value, "parameter value already loaded, skipping");
        return Ok(BulkLoadStage::CaseSkipped {
            system,
            parameter: value.clone(),
        });
    }
    let case_id = set.add_case(value.clone(), case, Some(dict.clone()))?;
    Ok(BulkLoadStage::CaseLoaded {
        system,
        case_id,
        parameter: value.clone(),
    })
}

/// Loads every requested artifact and returns the kinds that could not be
/// loaded. Failures have already been logged by the case.
pub(crate) fn load_requested(
    case: &mut Case,
    artifacts: &BTreeSet<ArtifactKind>,
    sources: &DataSources,
) -> Vec<ArtifactKind> {
    let mut unavailable = Vec::new();
    for &kind in artifacts {
        let outcome = match kind {
            ArtifactKind::Eigs => Ok(case.load_eigs(sources, None, false)),
            ArtifactKind::Bode => Ok(case.load_bode(sources, None, false)),
            ArtifactKind::Deflection => Ok(case.load_deflection(sources, None, false)),
            ArtifactKind::StateSpace => case.load_ss(sources, None, false),
            ArtifactKind::BeamModalAnalysis => case.load_beam_modal_analysis(sources, None, false),
            ArtifactKind::Forces => case.load_forces(sources, None, false),
            ArtifactKind::Stability if case.system == System::Aeroelastic => {
                case.load_stability(sources, None, false)
            }
            ArtifactKind::Stability => continue,
        };
        if !matches!(outcome, Ok(LoadOutcome::Loaded | LoadOutcome::AlreadyLoaded)) {
            unavailable.push(kind);
        }
    }
    unavailable
}

fn prepare_source(
    source: &Path,
    options: &BulkLoadOptions,
    sources: &DataSources,
    sets: &SystemSets,
) -> SourceOutcome {
    let manifests = match discover_in(source, MANIFEST_PATTERN) {
        Ok(manifests) => manifests,
        Err(err) => {
            return SourceOutcome::Rejected {
                source: source.to_path_buf(),
                reason: err.to_string(),
            };
        }
    };
    let Some(manifest_path) = manifests.first() else {
        return SourceOutcome::ManifestMissing(source.to_path_buf());
    };
    match build_cases(source, manifest_path, options, sources, sets) {
        Ok(prepared) => SourceOutcome::Prepared(prepared),
        Err(err) => SourceOutcome::Rejected {
            source: source.to_path_buf(),
            reason: err.to_string(),
        },
    }
}

fn build_cases(
    source: &Path,
    manifest_path: &Path,
    options: &BulkLoadOptions,
    sources: &DataSources,
    sets: &SystemSets,
) -> BatchResult<PreparedSource> {
    let manifest = Manifest::read(manifest_path)?;
    let parameters = ManifestParameters::from_section(manifest.require_section("parameters")?)?;
    let value = parameters.value(options.parameter_mode)?;
    let data_path = PathBuf::from(options.rewrite(manifest.require("sim_info", "path_to_data")?));
    let name = match manifest.get("sim_info", "case") {
        Some(name) => name.to_string(),
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let layout = PathLayout::new(options.eigs_naming, sources.containers.extension());

    let mut cases = Vec::with_capacity(System::ALL.len());
    let mut skipped = Vec::new();
    for system in System::ALL {
        if options.append && sets.get(system).contains_parameter_value(&value) {
            skipped.push(system);
            continue;
        }
        let mut case = Case::new(value.clone(), system, data_path.clone());
        case.name = name.clone();
        case.parameter_names = parameters.names.clone();
        case.case_info = parameters.dict.clone();
        case.alpha = parameters.alpha();
        case.verbose = options.verbose;
        for kind in ArtifactKind::ALL {
            case.path_to_sys
                .insert(kind, layout.path(kind, &data_path, system));
        }
        let unavailable = load_requested(&mut case, &options.artifacts, sources);
        cases.push(PreparedCase { case, unavailable });
    }

    Ok(PreparedSource {
        source: source.to_path_buf(),
        value,
        dict: parameters.dict,
        names: parameters.names,
        cases,
        skipped,
    })
}
