//! Error types
//!
//! Every filesystem and validation failure inside the storage core is
//! converted into a `StorageError` before it reaches the routing layer.

use std::fmt;
use std::io;

use thiserror::Error;

/// Shared `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Which quota a save was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    User,
    Global,
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaScope::User => write!(f, "user"),
            QuotaScope::Global => write!(f, "global"),
        }
    }
}

/// Storage module errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("File too large: {size} bytes (maximum allowed: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error(
        "Storage quota exceeded ({scope} scope): {requested} bytes requested, {available} bytes available"
    )]
    QuotaExceeded {
        scope: QuotaScope,
        requested: u64,
        available: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Fieldless classification of a [`StorageError`], for callers that map
/// outcomes onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    Conflict,
    FileTooLarge,
    QuotaExceeded,
    IoFailure,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::InvalidPath(_) => ErrorKind::InvalidPath,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::Conflict(_) => ErrorKind::Conflict,
            StorageError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            StorageError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            StorageError::Io(_) => ErrorKind::IoFailure,
        }
    }

    /// Maps an I/O error raised while touching `what` onto the closest kind:
    /// a vanished target is `NotFound`, anything else stays an I/O failure.
    pub(crate) fn from_io(what: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(what.to_string()),
            _ => StorageError::Io(error),
        }
    }
}
