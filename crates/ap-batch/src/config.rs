//! Bulk-load options and the YAML analysis configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ap_linear::ModeFilter;
use serde::{Deserialize, Serialize};

use crate::dataset::DampingFilter;
use crate::error::{BatchError, BatchResult};
use crate::parameter::ParameterMode;
use crate::system::{ArtifactKind, EigsNaming};

/// Substring replacement applied to manifest data paths, for datasets
/// moved since they were written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

impl PathRewrite {
    pub fn apply(&self, path: &str) -> String {
        path.replace(&self.from, &self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkLoadOptions {
    /// Artifacts loaded for every case.
    pub artifacts: BTreeSet<ArtifactKind>,
    pub eigs_naming: EigsNaming,
    pub parameter_mode: ParameterMode,
    pub path_rewrite: Option<PathRewrite>,
    /// Skip parameter values already present in the target set.
    pub append: bool,
    pub verbose: bool,
    /// Case directories to use instead of expanding the dataset pattern.
    pub sources: Option<Vec<PathBuf>>,
    /// Read case directories on the rayon pool. Insertion stays sequential.
    pub parallel: bool,
}

impl Default for BulkLoadOptions {
    fn default() -> Self {
        Self {
            artifacts: BTreeSet::new(),
            eigs_naming: EigsNaming::Legacy,
            parameter_mode: ParameterMode::Vector,
            path_rewrite: None,
            append: false,
            verbose: false,
            sources: None,
            parallel: false,
        }
    }
}

impl BulkLoadOptions {
    pub fn with_artifacts(artifacts: impl IntoIterator<Item = ArtifactKind>) -> Self {
        Self {
            artifacts: artifacts.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn requests(&self, kind: ArtifactKind) -> bool {
        self.artifacts.contains(&kind)
    }

    pub fn rewrite(&self, path: &str) -> String {
        match &self.path_rewrite {
            Some(rewrite) => rewrite.apply(path),
            None => path.to_string(),
        }
    }
}

/// Everything the command line needs to load and post-process a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Glob pattern of case directories.
    pub source: Option<String>,
    pub load: BulkLoadOptions,
    pub mode_filter: ModeFilter,
    pub damping: DampingFilter,
    /// Offset from the beam reference line to the point tracked by
    /// tip deflection queries, in the local node frame.
    pub reference_line: [f64; 3],
}

pub fn load_yaml(path: &Path) -> BatchResult<AnalysisConfig> {
    let content = ap_io::read_to_string(path)?;
    let config: AnalysisConfig = serde_yaml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &AnalysisConfig) -> BatchResult<()> {
    validate(config)?;
    let content = serde_yaml::to_string(config)?;
    ap_io::write_text(path, &content)?;
    Ok(())
}

fn validate(config: &AnalysisConfig) -> BatchResult<()> {
    let filter = &config.mode_filter;
    if filter.vmin > filter.vmax || filter.wdmin >= filter.wdmax {
        return Err(BatchError::invalid(format!(
            "empty mode filter window: v in [{}, {}], wd in ({}, {})",
            filter.vmin, filter.vmax, filter.wdmin, filter.wdmax
        )));
    }
    if config.damping.max_fn.is_nan() || config.damping.max_fn <= 0.0 {
        return Err(BatchError::invalid(format!(
            "max_fn must be positive, found {}",
            config.damping.max_fn
        )));
    }
    if config.reference_line.iter().any(|v| !v.is_finite()) {
        return Err(BatchError::invalid("reference line must be finite"));
    }
    Ok(())
}
