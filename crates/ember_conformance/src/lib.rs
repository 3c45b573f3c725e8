//! Conformance test helpers for the Ember script preparation pipeline.
//!
//! Provides shared fixtures for integration tests that drive a [`Script`]
//! over the deterministic [`FixtureBackend`] through the full
//! add-source → prepare → query protocol, including the on-disk cache.

#![warn(missing_docs)]

use std::path::Path;

use ember_backend::{FixtureBackend, SourceFlags};
use ember_config::{Properties, PROP_DEBUG_NOCACHE};
use ember_script::{Script, SourceSlot};

/// A representative module exercising every export kind.
pub const BASIC_SOURCE: &str = "var gInt\nfun root\nkernel blur\npragma version 1\nslot 0\n";

/// A small support library with no symbols overlapping [`BASIC_SOURCE`].
pub const LIBRARY_SOURCE: &str = "fun helper\nvar gLib\n";

/// Properties with the cache disabled via the debug property.
pub fn nocache_properties() -> Properties {
    let mut props = Properties::empty();
    props.set_bool(PROP_DEBUG_NOCACHE, true);
    props
}

/// Builds an unfinalized script holding `source` as its primary buffer.
pub fn script_with_buffer<'b>(
    backend: &'b FixtureBackend,
    properties: Properties,
    source: &str,
) -> Script<'b, FixtureBackend> {
    let mut script = Script::new(backend, properties);
    script
        .add_source_buffer(
            SourceSlot::Primary,
            "main",
            source.as_bytes(),
            SourceFlags::default(),
        )
        .expect("adding a primary buffer to a fresh script");
    script
}

/// Prepares a script over `source` for execution against the given cache
/// location and returns it finalized.
pub fn prepare_buffer_script<'b>(
    backend: &'b FixtureBackend,
    cache_dir: &Path,
    cache_name: &str,
    source: &str,
) -> Script<'b, FixtureBackend> {
    let mut script = script_with_buffer(backend, Properties::empty(), source);
    script
        .prepare_executable(cache_dir, cache_name)
        .expect("preparing a well-formed script");
    script
}
