//! Error types for case collections and dataset builders.

use std::path::PathBuf;

use ap_core::{ApError, CaseId, ErrorKind};
use ap_io::IoError;
use ap_linear::LinearError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{0}")]
    Io(#[from] IoError),

    #[error("{0}")]
    Linear(#[from] LinearError),

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Malformed data: {what}")]
    Malformed { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArgument { what: String },

    #[error("Parameter dictionary required to add case with parameter {parameter}")]
    MissingParamDict { parameter: String },

    #[error("Case id already set to {existing}, refusing to assign {requested}")]
    CaseIdAlreadySet { existing: CaseId, requested: CaseId },

    #[error("Cannot assign an id to case number {}", count + 1)]
    CaseIdOverflow { count: usize },

    #[error("No cases loaded from {} candidate source(s)", attempted.len())]
    NoCasesLoaded { attempted: Vec<PathBuf> },

    #[error("Configuration file error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type BatchResult<T> = Result<T, BatchError>;

impl BatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::Io(e) => e.kind(),
            BatchError::Linear(e) => e.kind(),
            BatchError::NotFound { .. } | BatchError::NoCasesLoaded { .. } => ErrorKind::NotFound,
            BatchError::Malformed { .. } => ErrorKind::MalformedData,
            BatchError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            BatchError::MissingParamDict { .. } | BatchError::Yaml(_) => ErrorKind::Configuration,
            BatchError::CaseIdAlreadySet { .. } | BatchError::CaseIdOverflow { .. } => {
                ErrorKind::Invariant
            }
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        BatchError::NotFound { what: what.into() }
    }

    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        BatchError::Malformed { what: what.into() }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        BatchError::InvalidArgument { what: what.into() }
    }
}

impl From<BatchError> for ApError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Io(e) => e.into(),
            BatchError::Linear(e) => e.into(),
            other => ApError::from_kind(other.kind(), other.to_string()),
        }
    }
}
