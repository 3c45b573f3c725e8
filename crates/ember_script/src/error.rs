//! Error types for script operations.
//!
//! Every fallible operation on a [`Script`](crate::Script) returns an
//! explicit `Result`; there is no out-of-band error field to poll after
//! a failing call.

use std::path::PathBuf;

use ember_backend::BackendError;
use ember_source::SourceError;

/// The result type of script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors reported by script operations.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// An input was empty, unreadable, or otherwise unusable.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input.
        reason: String,
    },

    /// The operation is not permitted in the script's current state.
    #[error("invalid operation: {operation}")]
    InvalidOperation {
        /// The rejected operation.
        operation: String,
    },

    /// An internal structure could not be allocated.
    #[error("out of memory")]
    OutOfMemory,

    /// The compile pipeline failed; carries the backend's message.
    #[error("compilation failed: {message}")]
    Compile {
        /// The backend's error message.
        message: String,
    },

    /// An I/O error outside the cache (e.g. writing a relocatable object).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Fewer bytes than expected reached the output file; the partial file
    /// has been deleted.
    #[error("truncated write to {path}: wrote {written} of {expected} bytes")]
    TruncatedWrite {
        /// The output path.
        path: PathBuf,
        /// Expected byte count.
        expected: u64,
        /// Actually written byte count.
        written: u64,
    },
}

impl ScriptError {
    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidOperation` error.
    pub fn invalid_operation(operation: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation: operation.into(),
        }
    }
}

impl From<BackendError> for ScriptError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::OutOfMemory => Self::OutOfMemory,
            other => Self::Compile {
                message: other.to_string(),
            },
        }
    }
}

impl From<SourceError> for ScriptError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Io { path, source } => Self::InvalidArgument {
                reason: format!("unreadable source {}: {source}", path.display()),
            },
            SourceError::Backend(backend) => backend.into(),
            SourceError::Consumed { name } => Self::InvalidOperation {
                operation: format!("reuse of consumed source '{name}'"),
            },
        }
    }
}
