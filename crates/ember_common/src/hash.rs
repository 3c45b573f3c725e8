//! Content hashing for cache dependency validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// A 128-bit content hash computed using XXH3.
///
/// Two resources with the same `ContentHash` are assumed to have identical
/// content. The dependency ledger records one hash per resource a compiled
/// script depends on; a cached artifact is reusable only while every recorded
/// hash still matches the resource on disk (or in memory).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Reads a file and computes the content hash of its bytes.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let content = std::fs::read(path)?;
        Ok(Self::from_bytes(&content))
    }

    /// Returns the raw 16-byte digest.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ContentHash::from_bytes(b"define foo");
        let b = ContentHash::from_bytes(b"define foo");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = ContentHash::from_bytes(b"module a");
        let b = ContentHash::from_bytes(b"module b");
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_32_hex_chars() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h}");
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn debug_abbreviated() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h:?}");
        assert!(s.starts_with("ContentHash("));
        assert!(s.ends_with(")"));
    }

    #[test]
    fn from_file_matches_from_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.bc");
        std::fs::write(&path, b"kernel bytes").unwrap();
        let from_file = ContentHash::from_file(&path).unwrap();
        assert_eq!(from_file, ContentHash::from_bytes(b"kernel bytes"));
    }

    #[test]
    fn from_file_missing_errors() {
        assert!(ContentHash::from_file(Path::new("/nonexistent/a.bc")).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_bytes(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
