use thiserror::Error;

pub type ApResult<T> = Result<T, ApError>;

/// Coarse classification shared by every crate's error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Expected file or data absent.
    NotFound,
    /// File present but unparsable or of the wrong shape.
    MalformedData,
    /// Unsupported argument value.
    InvalidArgument,
    /// Required auxiliary data missing.
    Configuration,
    /// Structural invariant violated (e.g. duplicate id assignment).
    Invariant,
    /// Underlying I/O failure other than a missing file.
    Io,
}

#[derive(Error, Debug)]
pub enum ApError {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Malformed data: {what}")]
    MalformedData { what: String },

    #[error("Invalid argument: {what}")]
    InvalidArgument { what: String },

    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Invariant violated: {what}")]
    Invariant { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApError::NotFound { .. } => ErrorKind::NotFound,
            ApError::MalformedData { .. } => ErrorKind::MalformedData,
            ApError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            ApError::Configuration { .. } => ErrorKind::Configuration,
            ApError::Invariant { .. } => ErrorKind::Invariant,
            ApError::Io(_) => ErrorKind::Io,
        }
    }

    /// Build an error of the given kind from a message.
    ///
    /// `ErrorKind::Io` wraps the message in `std::io::Error::other`.
    pub fn from_kind(kind: ErrorKind, what: impl Into<String>) -> Self {
        let what = what.into();
        match kind {
            ErrorKind::NotFound => ApError::NotFound { what },
            ErrorKind::MalformedData => ApError::MalformedData { what },
            ErrorKind::InvalidArgument => ApError::InvalidArgument { what },
            ErrorKind::Configuration => ApError::Configuration { what },
            ErrorKind::Invariant => ApError::Invariant { what },
            ErrorKind::Io => ApError::Io(std::io::Error::other(what)),
        }
    }
}
