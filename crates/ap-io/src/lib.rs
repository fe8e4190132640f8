//! ap-io: adapters for the artifacts an aeroelastic case directory holds.
//!
//! Everything here is boundary code. The analysis crates only see matrices,
//! ordered string mappings and lists of paths.

pub mod container;
pub mod discovery;
pub mod manifest;
pub mod sources;
pub mod table;
pub mod writer;

pub use container::{Container, ContainerArray, ContainerSource, JsonContainers};
pub use discovery::{discover, discover_in, node_index, sort_by_node_index};
pub use manifest::{Manifest, Section};
pub use sources::DataSources;
pub use table::{TableSource, TextTables, parse_table, read_table};
pub use writer::{format_sci, format_table, write_table, write_text};

use std::path::{Path, PathBuf};

use ap_core::{ApError, ErrorKind};

pub type IoResult<T> = Result<T, IoError>;

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {} at line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Malformed data in {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Missing key '{key}' in {}", path.display())]
    MissingKey { path: PathBuf, key: String },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

impl IoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IoError::NotFound { .. } => ErrorKind::NotFound,
            IoError::Read { .. } | IoError::Write { .. } => ErrorKind::Io,
            IoError::Parse { .. }
            | IoError::Malformed { .. }
            | IoError::MissingKey { .. }
            | IoError::Json { .. } => ErrorKind::MalformedData,
            IoError::Pattern { .. } => ErrorKind::InvalidArgument,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn malformed(path: &Path, message: impl Into<String>) -> Self {
        IoError::Malformed {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

impl From<IoError> for ApError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Read { source, .. } | IoError::Write { source, .. } => ApError::Io(source),
            other => ApError::from_kind(other.kind(), other.to_string()),
        }
    }
}

/// Read a whole file, reporting a missing file as `IoError::NotFound`.
pub fn read_to_string(path: &Path) -> IoResult<String> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            IoError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = read_to_string(Path::new("/definitely/not/here.dat")).unwrap_err();
        assert!(err.is_not_found());
        let ap: ApError = err.into();
        assert_eq!(ap.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn parse_error_is_malformed() {
        let err = IoError::Parse {
            path: PathBuf::from("x.dat"),
            line: 3,
            message: "bad float".into(),
        };
        assert_eq!(err.kind(), ErrorKind::MalformedData);
        assert!(err.to_string().contains("line 3"));
    }
}
