//! The dependency ledger: what must stay unchanged for a cached artifact
//! to remain valid.

use ember_common::ContentHash;
use serde::{Deserialize, Serialize};

/// The kind of resource a ledger entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// The compiler runtime itself (the execution layer or its backend).
    Runtime,
    /// A source provided as an on-disk file.
    File,
    /// A source provided as an in-memory buffer.
    Buffer,
    /// A source provided as a pre-built module.
    Module,
}

/// One (kind, path, content-hash) dependency record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// What kind of resource this entry describes.
    pub kind: ResourceKind,
    /// The resource's path, or its resource name for in-memory origins.
    pub path: String,
    /// Content hash the resource must still have for the cache to be valid.
    pub hash: ContentHash,
}

impl LedgerEntry {
    /// Creates a ledger entry.
    pub fn new(kind: ResourceKind, path: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            kind,
            path: path.into(),
            hash,
        }
    }
}

/// An ordered list of dependency records.
///
/// Every ledger starts with two runtime entries (the execution layer's own
/// identity and the backend's identity), followed by one entry per present
/// source. A cache candidate is valid iff its recorded ledger equals the
/// expected ledger entry-for-entry, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyLedger {
    entries: Vec<LedgerEntry>,
}

impl DependencyLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger seeded with the runtime's own identity and the
    /// identity of the given backend.
    pub fn for_runtime(backend_name: &str, backend_fingerprint: ContentHash) -> Self {
        let runtime_hash = ContentHash::from_bytes(
            concat!("ember-runtime/", env!("CARGO_PKG_VERSION")).as_bytes(),
        );
        Self {
            entries: vec![
                LedgerEntry::new(ResourceKind::Runtime, "ember-runtime", runtime_hash),
                LedgerEntry::new(ResourceKind::Runtime, backend_name, backend_fingerprint),
            ],
        }
    }

    /// Appends a dependency record.
    pub fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// The recorded entries, in order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Checks a recorded ledger against this expected ledger.
    ///
    /// Valid iff both ledgers have the same entries in the same order.
    pub fn matches(&self, recorded: &DependencyLedger) -> bool {
        self.entries == recorded.entries
    }

    /// Describes the first difference from `recorded`, for miss logging.
    pub fn first_mismatch(&self, recorded: &DependencyLedger) -> Option<String> {
        if self.entries.len() != recorded.entries.len() {
            return Some(format!(
                "entry count {} != {}",
                recorded.entries.len(),
                self.entries.len()
            ));
        }
        self.entries
            .iter()
            .zip(&recorded.entries)
            .find(|(expected, actual)| expected != actual)
            .map(|(expected, _)| format!("stale dependency '{}'", expected.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ledger() -> DependencyLedger {
        let mut ledger =
            DependencyLedger::for_runtime("fixture", ContentHash::from_bytes(b"backend-v1"));
        ledger.push(LedgerEntry::new(
            ResourceKind::Buffer,
            "main",
            ContentHash::from_bytes(b"fun root"),
        ));
        ledger
    }

    #[test]
    fn runtime_entries_come_first() {
        let ledger = sample_ledger();
        assert_eq!(ledger.entries().len(), 3);
        assert_eq!(ledger.entries()[0].kind, ResourceKind::Runtime);
        assert_eq!(ledger.entries()[0].path, "ember-runtime");
        assert_eq!(ledger.entries()[1].path, "fixture");
        assert_eq!(ledger.entries()[2].kind, ResourceKind::Buffer);
    }

    #[test]
    fn identical_ledgers_match() {
        assert!(sample_ledger().matches(&sample_ledger()));
        assert!(sample_ledger().first_mismatch(&sample_ledger()).is_none());
    }

    #[test]
    fn changed_hash_breaks_match() {
        let expected = sample_ledger();
        let mut recorded =
            DependencyLedger::for_runtime("fixture", ContentHash::from_bytes(b"backend-v1"));
        recorded.push(LedgerEntry::new(
            ResourceKind::Buffer,
            "main",
            ContentHash::from_bytes(b"fun root2"),
        ));
        assert!(!expected.matches(&recorded));
        assert_eq!(
            expected.first_mismatch(&recorded).unwrap(),
            "stale dependency 'main'"
        );
    }

    #[test]
    fn changed_backend_breaks_match() {
        let expected = sample_ledger();
        let mut recorded =
            DependencyLedger::for_runtime("fixture", ContentHash::from_bytes(b"backend-v2"));
        recorded.push(expected.entries()[2].clone());
        assert!(!expected.matches(&recorded));
    }

    #[test]
    fn entry_count_mismatch_reported() {
        let expected = sample_ledger();
        let recorded =
            DependencyLedger::for_runtime("fixture", ContentHash::from_bytes(b"backend-v1"));
        assert!(!expected.matches(&recorded));
        assert_eq!(
            expected.first_mismatch(&recorded).unwrap(),
            "entry count 2 != 3"
        );
    }

    #[test]
    fn order_is_significant() {
        let mut a = DependencyLedger::new();
        a.push(LedgerEntry::new(
            ResourceKind::Buffer,
            "x",
            ContentHash::from_bytes(b"x"),
        ));
        a.push(LedgerEntry::new(
            ResourceKind::Buffer,
            "y",
            ContentHash::from_bytes(b"y"),
        ));

        let mut b = DependencyLedger::new();
        b.push(a.entries()[1].clone());
        b.push(a.entries()[0].clone());
        assert!(!a.matches(&b));
    }
}
