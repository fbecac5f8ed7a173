//! Error types shared by the codec and the archive session.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ZipError>;

/// Coarse classification of a [`ZipError`].
///
/// Callers that only care about *why* an operation was refused (rather than the
/// exact underlying cause) can match on this instead of the full error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A filesystem or archive path does not satisfy the requested precondition.
    WrongPath,
    /// A memory buffer does not start with the ZIP signature.
    NotAnArchive,
    /// The session is in the wrong mode for the requested operation.
    WrongMode,
    /// A batch operation received nothing to work on.
    NoInputData,
    /// The requested entry does not exist.
    NotFound,
    /// Filesystem or codec failure.
    IoFailure,
}

#[derive(Debug, Error)]
pub enum ZipError {
    #[error("wrong path: {}", .0.display())]
    WrongPath(PathBuf),

    #[error("buffer is not a ZIP archive")]
    NotAnArchive,

    #[error("operation requires {expected} mode, session is {actual}")]
    WrongMode {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no input data")]
    NoInputData,

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("invalid entry index: {0}")]
    InvalidIndex(usize),

    #[error("entry already exists: {0}")]
    Duplicate(String),

    #[error("entry path escapes the output folder: {0}")]
    UnsafePath(String),

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl ZipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZipError::WrongPath(_) | ZipError::Duplicate(_) => ErrorKind::WrongPath,
            ZipError::NotAnArchive => ErrorKind::NotAnArchive,
            ZipError::WrongMode { .. } => ErrorKind::WrongMode,
            ZipError::NoInputData => ErrorKind::NoInputData,
            ZipError::NotFound(_) | ZipError::InvalidIndex(_) => ErrorKind::NotFound,
            ZipError::UnsafePath(_)
            | ZipError::InvalidArchive(_)
            | ZipError::Unsupported(_)
            | ZipError::Io(_)
            | ZipError::Walk(_) => ErrorKind::IoFailure,
        }
    }
}
