//! Physical systems, artifact kinds and where each artifact lives on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

pub const MANIFEST_PATTERN: &str = "*.pmor.sharpy";
pub const STABILITY_DIR: &str = "stability";
pub const FREQRESP_DIR: &str = "frequencyresponse";
pub const STATESPACE_DIR: &str = "statespace";
pub const DEFLECTION_DIR: &str = "WriteVariablesTime";
pub const BEAM_MODAL_DIR: &str = "beam_modal_analysis";
pub const FORCES_DIR: &str = "forces";
pub const FORCES_FILE: &str = "aeroforces.txt";
pub const MOMENTS_FILE: &str = "aeromoments.txt";
pub const FREQUENCIES_FILE: &str = "frequencies.dat";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum System {
    Aeroelastic,
    Aerodynamic,
    Structural,
}

impl System {
    pub const ALL: [System; 3] = [System::Aeroelastic, System::Aerodynamic, System::Structural];

    pub fn name(self) -> &'static str {
        match self {
            System::Aeroelastic => "aeroelastic",
            System::Aerodynamic => "aerodynamic",
            System::Structural => "structural",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for System {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aeroelastic" => Ok(System::Aeroelastic),
            "aerodynamic" => Ok(System::Aerodynamic),
            "structural" => Ok(System::Structural),
            other => Err(BatchError::invalid(format!("unknown system '{other}'"))),
        }
    }
}

/// Artifacts a case can carry. Names accepted by [`FromStr`] follow the
/// request strings used on the command line and in YAML option files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Eigs,
    Bode,
    #[serde(alias = "ss")]
    StateSpace,
    Deflection,
    BeamModalAnalysis,
    Forces,
    Stability,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::Eigs,
        ArtifactKind::Bode,
        ArtifactKind::StateSpace,
        ArtifactKind::Deflection,
        ArtifactKind::BeamModalAnalysis,
        ArtifactKind::Forces,
        ArtifactKind::Stability,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Eigs => "eigs",
            ArtifactKind::Bode => "bode",
            ArtifactKind::StateSpace => "ss",
            ArtifactKind::Deflection => "deflection",
            ArtifactKind::BeamModalAnalysis => "beam_modal_analysis",
            ArtifactKind::Forces => "forces",
            ArtifactKind::Stability => "stability",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArtifactKind {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "eigs" => Ok(ArtifactKind::Eigs),
            "bode" | "freqresp" => Ok(ArtifactKind::Bode),
            "ss" | "statespace" | "state_space" => Ok(ArtifactKind::StateSpace),
            "deflection" | "WriteVariablesTime" => Ok(ArtifactKind::Deflection),
            "beam_modal_analysis" => Ok(ArtifactKind::BeamModalAnalysis),
            "forces" => Ok(ArtifactKind::Forces),
            "stability" => Ok(ArtifactKind::Stability),
            other => Err(BatchError::invalid(format!("unknown artifact kind '{other}'"))),
        }
    }
}

/// Eigenvalue file naming under `stability/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EigsNaming {
    /// `stability/eigenvalues.dat`, shared by every system.
    #[default]
    Legacy,
    /// `stability/<system>_eigenvalues.dat`
    PerSystem,
}

/// Conventional artifact locations under a simulation output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    pub eigs_naming: EigsNaming,
    pub container_extension: String,
}

impl PathLayout {
    pub fn new(eigs_naming: EigsNaming, container_extension: impl Into<String>) -> Self {
        Self {
            eigs_naming,
            container_extension: container_extension.into(),
        }
    }

    /// File (or directory, for deflection, modal analysis and stability)
    /// holding `kind` for `system`.
    pub fn path(&self, kind: ArtifactKind, base: &Path, system: System) -> PathBuf {
        let ext = &self.container_extension;
        match kind {
            ArtifactKind::Eigs => match self.eigs_naming {
                EigsNaming::Legacy => base.join(STABILITY_DIR).join("eigenvalues.dat"),
                EigsNaming::PerSystem => base
                    .join(STABILITY_DIR)
                    .join(format!("{system}_eigenvalues.dat")),
            },
            ArtifactKind::Bode => base
                .join(FREQRESP_DIR)
                .join(format!("{system}.freqresp.{ext}")),
            ArtifactKind::StateSpace => base
                .join(STATESPACE_DIR)
                .join(format!("{system}.statespace.{ext}")),
            ArtifactKind::Deflection => base.join(DEFLECTION_DIR),
            ArtifactKind::BeamModalAnalysis => base.join(BEAM_MODAL_DIR),
            ArtifactKind::Forces => base.join(FORCES_DIR).join(FORCES_FILE),
            ArtifactKind::Stability => base.join(STABILITY_DIR),
        }
    }

    /// Layout of an interpolated library, where every case index has its own
    /// `param_caseNN/<system>/` folder. `None` for artifacts such libraries
    /// do not carry.
    pub fn interpolated_path(
        &self,
        kind: ArtifactKind,
        base: &Path,
        index: usize,
        system: System,
    ) -> Option<PathBuf> {
        let case_dir = format!("param_case{index:02}");
        let ext = &self.container_extension;
        let path = match kind {
            ArtifactKind::Eigs => base
                .join(STABILITY_DIR)
                .join(case_dir)
                .join(system.name())
                .join("_eigenvalues.dat"),
            ArtifactKind::Bode => base
                .join(FREQRESP_DIR)
                .join(case_dir)
                .join(system.name())
                .join(format!("freqresp.{ext}")),
            ArtifactKind::StateSpace => base
                .join(STATESPACE_DIR)
                .join(case_dir)
                .join(system.name())
                .join(format!("statespace.{ext}")),
            _ => return None,
        };
        Some(path)
    }
}
