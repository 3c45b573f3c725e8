//! One compilation input and its lazily parsed module.

use std::path::{Path, PathBuf};

use ember_backend::{Backend, BackendError, SourceFlags};
use ember_cache::{LedgerEntry, ResourceKind};
use ember_common::ContentHash;

/// Errors constructing or materializing a source descriptor.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source file could not be read.
    #[error("unable to read source {path}: {source}")]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The backend rejected the source.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The module was already handed to the compile pipeline.
    #[error("source '{name}' was already consumed")]
    Consumed {
        /// The source's resource name.
        name: String,
    },
}

/// One compilation input: origin, flags, content identity, and the lazily
/// materialized backend module.
///
/// The content identity (the descriptor's ledger entry) is fixed at
/// construction: for buffers and files it hashes the bitcode bytes, for
/// pre-built modules it asks the backend for a module fingerprint. The
/// module itself is parsed on demand against the context supplied by the
/// orchestrator, so the primary source and the support library share one
/// context and stay linkable.
pub struct Source<B: Backend> {
    identity: LedgerEntry,
    flags: SourceFlags,
    bitcode: Option<Vec<u8>>,
    module: Option<B::Module>,
}

impl<B: Backend> Source<B> {
    /// Wraps an in-memory bitcode buffer.
    pub fn from_buffer(name: &str, bitcode: &[u8], flags: SourceFlags) -> Self {
        Self {
            identity: LedgerEntry::new(
                ResourceKind::Buffer,
                name,
                ContentHash::from_bytes(bitcode),
            ),
            flags,
            bitcode: Some(bitcode.to_vec()),
            module: None,
        }
    }

    /// Wraps a bitcode file, reading it eagerly.
    ///
    /// The read happens at construction so an unreadable path fails at
    /// add-source time and the content hash reflects what will be parsed.
    pub fn from_file(path: &Path, flags: SourceFlags) -> Result<Self, SourceError> {
        let bitcode = std::fs::read(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            identity: LedgerEntry::new(
                ResourceKind::File,
                path.display().to_string(),
                ContentHash::from_bytes(&bitcode),
            ),
            flags,
            bitcode: Some(bitcode),
            module: None,
        })
    }

    /// Wraps a pre-built backend module.
    pub fn from_module(backend: &B, name: &str, module: B::Module, flags: SourceFlags) -> Self {
        let hash = backend.module_fingerprint(&module);
        Self {
            identity: LedgerEntry::new(ResourceKind::Module, name, hash),
            flags,
            bitcode: None,
            module: Some(module),
        }
    }

    /// This source's contribution to the dependency ledger.
    pub fn ledger_entry(&self) -> LedgerEntry {
        self.identity.clone()
    }

    /// The resource name (or path) of this source.
    pub fn name(&self) -> &str {
        &self.identity.path
    }

    /// The opaque flags the backend receives for this source.
    pub fn flags(&self) -> SourceFlags {
        self.flags
    }

    /// Returns `true` once the module has been parsed (or was pre-built)
    /// and not yet consumed.
    pub fn is_materialized(&self) -> bool {
        self.module.is_some()
    }

    /// Parses the source into a module, if it has not been parsed yet.
    pub fn materialize(
        &mut self,
        backend: &B,
        ctx: &mut B::Context,
    ) -> Result<(), SourceError> {
        if self.module.is_some() {
            return Ok(());
        }
        let bitcode = self.bitcode.take().ok_or_else(|| SourceError::Consumed {
            name: self.identity.path.clone(),
        })?;
        let module = backend.parse(ctx, &self.identity.path, &bitcode, self.flags)?;
        self.module = Some(module);
        Ok(())
    }

    /// Materializes the source and hands its module to the caller.
    ///
    /// A second take fails with [`SourceError::Consumed`].
    pub fn take_module(
        &mut self,
        backend: &B,
        ctx: &mut B::Context,
    ) -> Result<B::Module, SourceError> {
        self.materialize(backend, ctx)?;
        self.module.take().ok_or_else(|| SourceError::Consumed {
            name: self.identity.path.clone(),
        })
    }
}
