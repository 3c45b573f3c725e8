//! Shared foundational types for the Ember bitcode execution layer.
//!
//! This crate provides the content-hashing primitive used for cache
//! dependency validation throughout the toolchain.

#![warn(missing_docs)]

pub mod hash;

pub use hash::ContentHash;
