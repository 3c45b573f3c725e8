//! Process-wide debugger registration of native code ranges.
//!
//! Scripts may be finalized concurrently on different threads; all of them
//! register their code ranges into one shared registry. Registration is
//! serialized by a single mutex and is idempotent, so re-registering an
//! already-known range is a no-op.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

static REGISTRY: OnceLock<Mutex<HashSet<(usize, usize)>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashSet<(usize, usize)>> {
    REGISTRY.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Registers a native code range with the process debugger integration.
///
/// Safe to call concurrently from multiple threads and safe to call for
/// images without debug metadata. Returns `true` if the range was newly
/// registered, `false` if it was already known.
pub fn register_code_range(code: *const u8, len: usize) -> bool {
    let mut ranges = match registry().lock() {
        Ok(guard) => guard,
        // A panicked registrant cannot corrupt a HashSet of copyable pairs.
        Err(poisoned) => poisoned.into_inner(),
    };
    ranges.insert((code as usize, len))
}

/// Returns `true` if the exact range has been registered.
pub fn is_registered(code: *const u8, len: usize) -> bool {
    let ranges = match registry().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    ranges.contains(&(code as usize, len))
}

/// Number of distinct code ranges currently registered.
pub fn registered_count() -> usize {
    let ranges = match registry().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    ranges.len()
}
