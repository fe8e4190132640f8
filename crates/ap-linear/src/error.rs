//! Error types for linear analysis.

use ap_core::{ApError, ErrorKind};
use ap_io::IoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinearError {
    #[error("{0}")]
    Io(#[from] IoError),

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Malformed data: {what}")]
    Malformed { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArgument { what: String },
}

pub type LinearResult<T> = Result<T, LinearError>;

impl LinearError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinearError::Io(e) => e.kind(),
            LinearError::NotFound { .. } => ErrorKind::NotFound,
            LinearError::Malformed { .. } => ErrorKind::MalformedData,
            LinearError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        LinearError::Malformed { what: what.into() }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        LinearError::InvalidArgument { what: what.into() }
    }
}

impl From<LinearError> for ApError {
    fn from(err: LinearError) -> Self {
        match err {
            LinearError::Io(e) => e.into(),
            other => ApError::from_kind(other.kind(), other.to_string()),
        }
    }
}
