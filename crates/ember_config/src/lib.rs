//! Configuration property lookup for the Ember execution layer.
//!
//! Hosts tune runtime behavior (most importantly the cache-disable switch)
//! through a flat property map. Properties load fail-safe from a TOML file:
//! a missing or unparsable file yields an empty map, and every boolean query
//! defaults to `false` when the property is unset.

#![warn(missing_docs)]

pub mod error;
pub mod props;

pub use error::ConfigError;
pub use props::Properties;

/// Property consulted by the cache eligibility gate. When set to `true`,
/// on-disk caching is disabled unconditionally.
pub const PROP_DEBUG_NOCACHE: &str = "debug.nocache";
