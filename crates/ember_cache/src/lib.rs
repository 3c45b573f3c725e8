//! On-disk caching of compiled script artifacts.
//!
//! A prepared script persists as two sibling files: the raw native object
//! and a metadata file recording the export table plus the dependency
//! ledger that was current at write time. A later process may reuse the
//! artifact only while every ledger entry's content hash still matches;
//! any discrepancy is a cache miss that falls back to recompilation, never
//! an error.
//!
//! Replacement is unlink-then-recreate: a cache file is never mutated in
//! place, because another process or thread may still have the old file
//! mapped while the same script is being recompiled.

#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod ledger;
pub mod paths;

pub use codec::{CacheMetadata, CacheReader, CacheWriter};
pub use error::{CacheError, CacheMiss, CacheMissReason};
pub use ledger::{DependencyLedger, LedgerEntry, ResourceKind};
pub use paths::CachePaths;
