//! Error types for depotkv
//!
//! Every failing operation returns exactly one [`DepotError`], and every
//! error maps onto one of six [`ErrorKind`]s. `NotFound` is an ordinary
//! outcome (a missing key), not an environment failure, so callers can
//! build default-on-miss logic on top of it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using DepotError
pub type Result<T> = std::result::Result<T, DepotError>;

/// Unified error type for depot operations
#[derive(Debug, Error)]
pub enum DepotError {
    // -------------------------------------------------------------------------
    // Lookup Outcomes
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("Key already exists")]
    KeyExists,

    // -------------------------------------------------------------------------
    // Handle Errors
    // -------------------------------------------------------------------------
    #[error("Depot handle has already been closed")]
    ClosedHandle,

    #[error("Cannot open {}: {source}", path.display())]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt header: {0}")]
    CorruptHeader(String),
}

/// The closed set of failure kinds a caller can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    KeyExists,
    ClosedHandle,
    CannotOpen,
    IoFailure,
    CorruptHeader,
}

impl DepotError {
    /// Classify this error into its kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            DepotError::NotFound => ErrorKind::NotFound,
            DepotError::KeyExists => ErrorKind::KeyExists,
            DepotError::ClosedHandle => ErrorKind::ClosedHandle,
            DepotError::CannotOpen { .. } => ErrorKind::CannotOpen,
            DepotError::Io(_) => ErrorKind::IoFailure,
            DepotError::CorruptHeader(_) => ErrorKind::CorruptHeader,
        }
    }

    /// True when the error only says the key is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, DepotError::NotFound)
    }

    pub(crate) fn cannot_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DepotError::CannotOpen {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn read_only() -> Self {
        DepotError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "depot was opened read-only",
        ))
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        DepotError::Io(io::Error::new(io::ErrorKind::InvalidInput, msg.into()))
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        DepotError::CorruptHeader(msg.into())
    }
}
