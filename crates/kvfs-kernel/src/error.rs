//! Projection and load error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;

/// `ENOENT`: no such file or directory.
const ENOENT: i32 = 2;
/// `EIO`: input/output error.
const EIO: i32 = 5;

/// Errors surfaced to the filesystem-serving layer.
///
/// Every backend failure is classified into one of these two before it
/// leaves the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectionError {
    /// No key or prefix exists for the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport, timeout or unclassifiable backend failure.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl ProjectionError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a BackendUnavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable(reason.into())
    }

    /// Returns true for [`ProjectionError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Raw errno for serving layers that reply with error codes.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound(_) => ENOENT,
            Self::BackendUnavailable(_) => EIO,
        }
    }
}

impl From<BackendError> for ProjectionError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(key) => Self::NotFound(key),
            other => Self::BackendUnavailable(other.to_string()),
        }
    }
}

/// Convert ProjectionError to std::io::Error for compatibility.
impl From<ProjectionError> for io::Error {
    fn from(e: ProjectionError) -> Self {
        match e {
            ProjectionError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            ProjectionError::BackendUnavailable(msg) => io::Error::other(msg),
        }
    }
}

/// Projection result type.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Snapshot source could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source file could not be opened.
    #[error("failed to open data file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading failed part way through.
    #[error("failed to read data file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_backend_error_classification() {
        let e: ProjectionError = BackendError::NotFound("a/b".into()).into();
        assert_eq!(e, ProjectionError::NotFound("a/b".into()));

        let e: ProjectionError = BackendError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(e, ProjectionError::BackendUnavailable(_)));

        let e: ProjectionError = BackendError::InvalidOutput("garbage".into()).into();
        assert!(matches!(e, ProjectionError::BackendUnavailable(_)));
    }

    #[test]
    fn test_io_error_mapping() {
        let io: io::Error = ProjectionError::not_found("x").into();
        assert_eq!(io.kind(), io::ErrorKind::NotFound);

        let io: io::Error = ProjectionError::unavailable("down").into();
        assert_eq!(io.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn test_errno() {
        assert_eq!(ProjectionError::not_found("x").errno(), 2);
        assert_eq!(ProjectionError::unavailable("x").errno(), 5);
    }
}
