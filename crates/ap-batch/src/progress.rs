use std::path::PathBuf;
use std::time::Instant;

use ap_core::CaseId;

use crate::parameter::ParameterValue;
use crate::system::{ArtifactKind, System};

#[derive(Debug, Clone, PartialEq)]
pub enum BulkLoadStage {
    ListingSources,
    SourceDiscovered {
        source: PathBuf,
    },
    ManifestMissing {
        source: PathBuf,
    },
    /// Manifest present but unusable.
    SourceRejected {
        source: PathBuf,
        reason: String,
    },
    ArtifactUnavailable {
        system: System,
        parameter: ParameterValue,
        artifact: ArtifactKind,
    },
    CaseLoaded {
        system: System,
        case_id: CaseId,
        parameter: ParameterValue,
    },
    /// Append mode found the parameter value already present.
    CaseSkipped {
        system: System,
        parameter: ParameterValue,
    },
    Completed {
        loaded: usize,
        attempted: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoadEvent {
    pub stage: BulkLoadStage,
    pub elapsed_wall_s: f64,
}

pub(crate) fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(BulkLoadEvent)>,
    started: Instant,
    stage: BulkLoadStage,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(BulkLoadEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
        });
    }
}
