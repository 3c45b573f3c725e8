//! The consumed backend trait and its error type.

use ember_common::ContentHash;

use crate::image::{ExportTable, NativeImage};
use crate::options::{CompileOptions, SourceFlags};
use crate::resolver::SymbolResolver;

/// Errors reported by a code-generation backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The bitcode could not be parsed into a module.
    #[error("parse error: {message}")]
    Parse {
        /// Backend-supplied description.
        message: String,
    },

    /// Two modules could not be linked.
    #[error("link error: {message}")]
    Link {
        /// Backend-supplied description.
        message: String,
    },

    /// Code generation failed.
    #[error("codegen error: {message}")]
    Codegen {
        /// Backend-supplied description.
        message: String,
    },

    /// The modules involved in a link do not share a compilation context.
    #[error("modules do not share a compilation context")]
    ContextMismatch,

    /// No execution slot was available to load the image.
    #[error("no execution slot available")]
    NoExecutionSlot,

    /// The backend failed to allocate an internal structure.
    #[error("backend out of memory")]
    OutOfMemory,
}

/// A successful compile: the loaded image plus an optional non-fatal
/// diagnostic message from the code generator.
#[derive(Debug)]
pub struct CompileOutput {
    /// The compiled, queryable native image.
    pub image: NativeImage,
    /// Non-fatal diagnostic emitted during compilation, if any.
    pub diagnostic: Option<String>,
}

/// The narrow interface the execution layer consumes from a code generator.
///
/// `Context` owns backend-internal state shared by every module of one
/// script; modules parsed against different contexts cannot be linked.
/// `Module` is the backend's parsed-module handle, owned by the source
/// descriptor until compilation consumes it.
pub trait Backend {
    /// Backend-internal compilation context.
    type Context;
    /// Backend-internal parsed module handle.
    type Module;

    /// A short identifier for this backend, used in ledger entries.
    fn name(&self) -> &str;

    /// Content identity of the backend itself. Recorded in every dependency
    /// ledger so cached artifacts are invalidated when the backend changes.
    fn fingerprint(&self) -> ContentHash;

    /// Creates a fresh compilation context.
    fn create_context(&self) -> Self::Context;

    /// Parses bitcode bytes into a module bound to `ctx`.
    fn parse(
        &self,
        ctx: &mut Self::Context,
        name: &str,
        bitcode: &[u8],
        flags: SourceFlags,
    ) -> Result<Self::Module, BackendError>;

    /// Content identity of a pre-built module, for ledger entries.
    fn module_fingerprint(&self, module: &Self::Module) -> ContentHash;

    /// Links `library` into `base`. Both modules must belong to `ctx`.
    fn link(
        &self,
        ctx: &mut Self::Context,
        base: &mut Self::Module,
        library: Self::Module,
    ) -> Result<(), BackendError>;

    /// Compiles a module to a native image.
    ///
    /// `resolver`, when present, is consulted for external symbols the
    /// module references but does not define.
    fn compile(
        &self,
        ctx: &mut Self::Context,
        module: Self::Module,
        options: &CompileOptions,
        resolver: Option<&SymbolResolver>,
    ) -> Result<CompileOutput, BackendError>;

    /// Reconstructs an executable image from raw object bytes and their
    /// export table, as read back from the cache.
    ///
    /// May fail with [`BackendError::NoExecutionSlot`] when the process has
    /// exhausted its execution arenas; the cache layer treats that as a
    /// distinguishable miss.
    fn load(
        &self,
        object: Vec<u8>,
        exports: ExportTable,
        resolver: Option<&SymbolResolver>,
    ) -> Result<NativeImage, BackendError>;
}

/// The slice of [`Backend`] the cache reader needs: turning object bytes
/// back into an executable image.
pub trait ImageLoader {
    /// See [`Backend::load`].
    fn load_image(
        &self,
        object: Vec<u8>,
        exports: ExportTable,
        resolver: Option<&SymbolResolver>,
    ) -> Result<NativeImage, BackendError>;
}

impl<B: Backend> ImageLoader for B {
    fn load_image(
        &self,
        object: Vec<u8>,
        exports: ExportTable,
        resolver: Option<&SymbolResolver>,
    ) -> Result<NativeImage, BackendError> {
        self.load(object, exports, resolver)
    }
}
