//! On-disk locations of the two cache files for one script.

use std::path::{Path, PathBuf};

/// Extension of the native object file.
const OBJECT_EXT: &str = "o";

/// Extension of the metadata file.
const METADATA_EXT: &str = "meta";

/// The sibling object and metadata paths for a `(cache_dir, cache_name)`
/// pair. The two files are always written and replaced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    object: PathBuf,
    metadata: PathBuf,
}

impl CachePaths {
    /// Derives the cache file locations for a script.
    pub fn new(cache_dir: &Path, cache_name: &str) -> Self {
        Self {
            object: cache_dir.join(format!("{cache_name}.{OBJECT_EXT}")),
            metadata: cache_dir.join(format!("{cache_name}.{METADATA_EXT}")),
        }
    }

    /// Path of the native object file.
    pub fn object(&self) -> &Path {
        &self.object
    }

    /// Path of the metadata file.
    pub fn metadata(&self) -> &Path {
        &self.metadata
    }

    /// Returns `true` if both cache files currently exist.
    pub fn both_exist(&self) -> bool {
        self.object.exists() && self.metadata.exists()
    }
}
