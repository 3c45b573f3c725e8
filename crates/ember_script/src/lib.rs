//! Script orchestration: from raw bitcode sources to callable native code.
//!
//! A [`Script`] owns up to two source descriptors (a primary and an
//! optional support library), decides whether a previously cached native
//! artifact is still valid via content-hash dependency checking, and
//! otherwise drives the parse → link → compile → cache pipeline. Once
//! finalized it answers symbol lookups and export-metadata queries,
//! delegating to whichever artifact variant is active.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;
pub mod script;

pub use artifact::{CachedArtifact, CompiledArtifact};
pub use error::{ScriptError, ScriptResult};
pub use script::{ObjectType, Script, ScriptStatus, SourceSlot};
