//! Source descriptors for the Ember execution layer.
//!
//! A [`Source`] wraps one compilation input — an in-memory buffer, a
//! pre-built module, or a file path — and lazily materializes it into a
//! parsed backend module. Its content identity is computed eagerly at
//! construction time so it can contribute a dependency-ledger entry before
//! any parsing happens.

#![warn(missing_docs)]

pub mod source;

pub use source::{Source, SourceError};
