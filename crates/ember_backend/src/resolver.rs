//! External symbol resolution capability.

use std::fmt;
use std::sync::Arc;

/// A host-supplied callback that resolves external symbol names to addresses.
///
/// The resolver is a capability passed by value: cloning shares the same
/// underlying callback, and no component takes ownership of host state. The
/// orchestrator hands it to the backend at compile and load time; it never
/// invokes the callback itself.
#[derive(Clone)]
pub struct SymbolResolver {
    resolve: Arc<dyn Fn(&str) -> Option<*const ()> + Send + Sync>,
}

impl SymbolResolver {
    /// Wraps a resolution callback.
    pub fn new(resolve: impl Fn(&str) -> Option<*const ()> + Send + Sync + 'static) -> Self {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    /// Resolves a symbol name, returning `None` when the host does not
    /// provide it.
    pub fn resolve(&self, name: &str) -> Option<*const ()> {
        (self.resolve)(name)
    }
}

impl fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymbolResolver(..)")
    }
}
