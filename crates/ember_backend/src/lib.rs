//! Code-generation backend interface for the Ember execution layer.
//!
//! The orchestrator consumes the backend through the narrow [`Backend`]
//! trait: materialize a module from bitcode, link a library module into a
//! base module, compile to a native image, and reload an image from raw
//! object bytes. The backend's internal algorithms are outside this crate;
//! what lives here is the interface, the shared execution types (native
//! images, export metadata, compile options, symbol resolution), the
//! process-wide debugger registrar, and a deterministic fixture backend
//! used by the test suites of the crates above.

#![warn(missing_docs)]

pub mod backend;
pub mod debugger;
pub mod fixture;
pub mod image;
pub mod options;
pub mod resolver;

pub use backend::{Backend, BackendError, CompileOutput, ImageLoader};
pub use fixture::FixtureBackend;
pub use image::{ExportSymbol, ExportTable, FuncInfo, NativeImage, Pragma};
pub use options::{CompileOptions, RelocModel, SourceFlags};
pub use resolver::SymbolResolver;
