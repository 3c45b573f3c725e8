//! The cache codec: validates, decodes, and encodes the on-disk pair.
//!
//! The metadata file is a 4-byte little-endian length prefix followed by a
//! bincode-encoded [`CacheMetadata`]: magic bytes, format version, the
//! dependency ledger recorded at write time, the export table, and the
//! object payload's length and checksum. The object file holds the raw
//! native object bytes with no framing of its own.

use std::path::Path;

use ember_backend::{ExportTable, ImageLoader, NativeImage, SymbolResolver};
use ember_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheMiss, CacheMissReason};
use crate::ledger::DependencyLedger;
use crate::paths::CachePaths;

/// Magic bytes identifying an Ember cache metadata file.
const METADATA_MAGIC: [u8; 4] = *b"EMBC";

/// Current metadata format version. Increment on breaking changes.
const METADATA_FORMAT_VERSION: u32 = 1;

/// Decoded contents of a metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Magic bytes: must be `b"EMBC"`.
    pub magic: [u8; 4],
    /// Metadata format version.
    pub format_version: u32,
    /// The dependency ledger that was current when the pair was written.
    pub ledger: DependencyLedger,
    /// Export metadata of the cached artifact.
    pub exports: ExportTable,
    /// Byte length the object file must have.
    pub object_len: u64,
    /// Content hash the object file must have.
    pub object_checksum: ContentHash,
}

/// Read side of the codec: validates a candidate pair against an expected
/// ledger and reconstructs the in-memory image on acceptance.
///
/// Every rejection is a [`CacheMiss`], never a hard error; the caller falls
/// back to compilation.
pub struct CacheReader<'a> {
    expected: &'a DependencyLedger,
}

impl<'a> CacheReader<'a> {
    /// Creates a reader that validates against `expected`.
    pub fn new(expected: &'a DependencyLedger) -> Self {
        Self { expected }
    }

    /// Decodes and validates the metadata file only.
    ///
    /// Checks framing, magic, format version, and the dependency ledger,
    /// but does not touch the object payload.
    pub fn validate(&self, paths: &CachePaths) -> Result<CacheMetadata, CacheMiss> {
        let raw = std::fs::read(paths.metadata())
            .map_err(|_| CacheMiss::new(CacheMissReason::Missing))?;

        if raw.len() < 4 {
            return Err(CacheMiss::new(CacheMissReason::BadHeader));
        }
        let header_len = u32::from_le_bytes(
            raw[..4]
                .try_into()
                .map_err(|_| CacheMiss::new(CacheMissReason::BadHeader))?,
        ) as usize;
        if raw.len() < 4 + header_len {
            return Err(CacheMiss::new(CacheMissReason::BadHeader));
        }

        let metadata: CacheMetadata =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .map_err(|_| CacheMiss::new(CacheMissReason::BadHeader))?
                .0;

        if metadata.magic != METADATA_MAGIC {
            return Err(CacheMiss::new(CacheMissReason::BadHeader));
        }
        if metadata.format_version != METADATA_FORMAT_VERSION {
            return Err(CacheMiss::with_detail(
                CacheMissReason::VersionMismatch,
                format!(
                    "format version {} != {METADATA_FORMAT_VERSION}",
                    metadata.format_version
                ),
            ));
        }
        if !self.expected.matches(&metadata.ledger) {
            let detail = self
                .expected
                .first_mismatch(&metadata.ledger)
                .unwrap_or_else(|| "ledger mismatch".to_string());
            return Err(CacheMiss::with_detail(
                CacheMissReason::LedgerMismatch,
                detail,
            ));
        }

        Ok(metadata)
    }

    /// Validates the pair and reconstructs the executable image.
    ///
    /// The object payload must match the recorded length and checksum; the
    /// backend's load hook then turns the bytes into a [`NativeImage`]. A
    /// load failure for want of an execution slot is reported as the
    /// distinguishable [`CacheMissReason::SlotUnavailable`].
    pub fn read<L: ImageLoader>(
        &self,
        paths: &CachePaths,
        loader: &L,
        resolver: Option<&SymbolResolver>,
    ) -> Result<NativeImage, CacheMiss> {
        let metadata = self.validate(paths)?;

        let object =
            std::fs::read(paths.object()).map_err(|_| CacheMiss::new(CacheMissReason::Missing))?;

        if object.len() as u64 != metadata.object_len {
            return Err(CacheMiss::with_detail(
                CacheMissReason::Corrupt,
                format!(
                    "object length {} != recorded {}",
                    object.len(),
                    metadata.object_len
                ),
            ));
        }
        if ContentHash::from_bytes(&object) != metadata.object_checksum {
            return Err(CacheMiss::with_detail(
                CacheMissReason::Corrupt,
                "object checksum mismatch",
            ));
        }

        loader
            .load_image(object, metadata.exports, resolver)
            .map_err(|err| match err {
                ember_backend::BackendError::NoExecutionSlot => {
                    CacheMiss::new(CacheMissReason::SlotUnavailable)
                }
                other => CacheMiss::with_detail(CacheMissReason::Corrupt, other.to_string()),
            })
    }
}

/// Write side of the codec: serializes a freshly compiled artifact plus its
/// ledger, replacing any previous pair.
pub struct CacheWriter<'a> {
    ledger: &'a DependencyLedger,
}

impl<'a> CacheWriter<'a> {
    /// Creates a writer that records `ledger` in the metadata file.
    pub fn new(ledger: &'a DependencyLedger) -> Self {
        Self { ledger }
    }

    /// Writes the object and metadata files.
    ///
    /// Pre-existing files are unlinked first, never rewritten in place: the
    /// old inode may still be mapped by a concurrent reader of the same
    /// script, so it must keep its content until that reader drops it. If
    /// writing fails partway, both partial files are deleted (best-effort)
    /// before the error is returned.
    pub fn write(
        &self,
        paths: &CachePaths,
        object: &[u8],
        exports: &ExportTable,
    ) -> Result<(), CacheError> {
        if let Some(dir) = paths.object().parent() {
            std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let metadata = CacheMetadata {
            magic: METADATA_MAGIC,
            format_version: METADATA_FORMAT_VERSION,
            ledger: self.ledger.clone(),
            exports: exports.clone(),
            object_len: object.len() as u64,
            object_checksum: ContentHash::from_bytes(object),
        };
        let encoded = bincode::serde::encode_to_vec(&metadata, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        let mut metadata_bytes = Vec::with_capacity(4 + encoded.len());
        metadata_bytes.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        metadata_bytes.extend_from_slice(&encoded);

        unlink_stale(paths.object());
        unlink_stale(paths.metadata());

        let result = write_pair(paths, object, &metadata_bytes);
        if result.is_err() {
            remove_partial(paths.object());
            remove_partial(paths.metadata());
        }
        result
    }
}

fn write_pair(paths: &CachePaths, object: &[u8], metadata: &[u8]) -> Result<(), CacheError> {
    std::fs::write(paths.metadata(), metadata).map_err(|e| CacheError::Io {
        path: paths.metadata().to_path_buf(),
        source: e,
    })?;
    std::fs::write(paths.object(), object).map_err(|e| CacheError::Io {
        path: paths.object().to_path_buf(),
        source: e,
    })
}

/// Unlinks a pre-existing cache file before replacement.
fn unlink_stale(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::warn!("unable to remove stale cache file {}: {err}", path.display());
        }
    }
}

/// Best-effort removal of a partially written cache file.
fn remove_partial(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::warn!(
                "unable to remove partial cache file {}: {err}",
                path.display()
            );
        }
    }
}
