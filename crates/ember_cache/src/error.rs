//! Error and cache-miss types.

use std::fmt;
use std::path::PathBuf;

/// Errors surfaced by the cache write path.
///
/// Read-path failures never use this type: they are [`CacheMiss`]es, and
/// the orchestrator falls back to compilation instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Metadata serialization failed.
    #[error("cache serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

/// Why a cache candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMissReason {
    /// Object or metadata file does not exist or is unreadable.
    Missing,
    /// The metadata file's header could not be decoded.
    BadHeader,
    /// The metadata file uses an incompatible format version.
    VersionMismatch,
    /// The recorded dependency ledger no longer matches the expected one.
    LedgerMismatch,
    /// The object payload failed its integrity checks.
    Corrupt,
    /// No execution slot was available to load the cached image.
    ///
    /// Tracked separately from the other reasons: the compile that follows
    /// this miss skips the cache rewrite, since the artifact on disk is
    /// still valid.
    SlotUnavailable,
}

/// A rejected cache candidate: the reason plus optional diagnostic detail.
///
/// Misses are expected and non-fatal; they are logged at debug level and
/// the orchestrator falls through to the compile pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMiss {
    /// Why the candidate was rejected.
    pub reason: CacheMissReason,
    /// Optional human-readable detail for logging.
    pub detail: Option<String>,
}

impl CacheMiss {
    /// Creates a miss with no extra detail.
    pub fn new(reason: CacheMissReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    /// Creates a miss carrying diagnostic detail.
    pub fn with_detail(reason: CacheMissReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "cache miss: {:?} ({detail})", self.reason),
            None => write!(f, "cache miss: {:?}", self.reason),
        }
    }
}
