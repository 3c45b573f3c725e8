//! The two artifact variants behind a finalized script.
//!
//! A fresh compile produces a [`CompiledArtifact`]; a cache reload produces
//! a [`CachedArtifact`]. Both answer the same queries through the private
//! [`ArtifactQuery`] surface, so the orchestrator's delegation is
//! transparent to the host.

use ember_backend::NativeImage;

/// Query surface shared by both artifact variants.
pub(crate) trait ArtifactQuery {
    /// The native image this artifact wraps.
    fn image(&self) -> &NativeImage;

    /// Resolves an exported symbol to its address in the code buffer.
    fn lookup(&self, name: &str) -> Option<*const u8> {
        self.image().symbol_address(name)
    }
}

/// The in-memory result of a fresh compile.
#[derive(Debug)]
pub struct CompiledArtifact {
    image: NativeImage,
    compiler_message: Option<String>,
}

impl CompiledArtifact {
    pub(crate) fn new(image: NativeImage, compiler_message: Option<String>) -> Self {
        Self {
            image,
            compiler_message,
        }
    }

    /// The native image produced by the compile.
    pub fn image(&self) -> &NativeImage {
        &self.image
    }

    /// Non-fatal diagnostic emitted by the code generator, if any.
    pub fn compiler_message(&self) -> Option<&str> {
        self.compiler_message.as_deref()
    }
}

impl ArtifactQuery for CompiledArtifact {
    fn image(&self) -> &NativeImage {
        &self.image
    }
}

/// The in-memory result of a cache reload.
///
/// Structurally answers the same queries as a [`CompiledArtifact`] without
/// compilation having run in this process.
#[derive(Debug)]
pub struct CachedArtifact {
    image: NativeImage,
}

impl CachedArtifact {
    pub(crate) fn new(image: NativeImage) -> Self {
        Self { image }
    }

    /// The native image reloaded from the cache.
    pub fn image(&self) -> &NativeImage {
        &self.image
    }
}

impl ArtifactQuery for CachedArtifact {
    fn image(&self) -> &NativeImage {
        &self.image
    }
}
