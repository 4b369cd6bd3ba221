//! Error types for the type and object store.
//!
//! Validation errors are raised when a type or object handle is built;
//! everything else wraps filesystem failures with the path involved.

use std::io;
use std::path::PathBuf;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing types and objects.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The type directory does not exist below the type base path.
    #[error("no such type: {name} (looked in {path})")]
    NoSuchType {
        /// Requested type name.
        name: String,
        /// Directory that was expected to hold the type.
        path: PathBuf,
    },

    /// The object id violates one of the naming rules.
    #[error("illegal object id '{object_id}': {reason}")]
    IllegalObjectId {
        /// Offending object id.
        object_id: String,
        /// Which rule was violated.
        reason: String,
    },

    /// A non-singleton type was addressed without an object id.
    #[error("type {type_name} requires an object id")]
    MissingObjectId {
        /// Name of the type.
        type_name: String,
    },

    /// The persisted state file holds an unknown value.
    #[error("invalid object state '{value}' in {path}")]
    InvalidState {
        /// State file.
        path: PathBuf,
        /// Raw file content.
        value: String,
    },

    /// The object lock could not be acquired.
    #[error("failed to lock {path}: {source}")]
    Lock {
        /// Lock file.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// IO error during file operations.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved in the error.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Build an IO error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a validation failure (bad name or id)
    /// rather than a filesystem problem.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::NoSuchType { .. } | Self::IllegalObjectId { .. } | Self::MissingObjectId { .. }
        )
    }
}
