//! Native images and export metadata.
//!
//! A [`NativeImage`] is the queryable result of compilation or a cache
//! reload: the native code buffer plus the [`ExportTable`] describing what
//! the script exposes to the host. The export table is serde-serializable
//! because the cache codec persists it in the metadata file.

use serde::{Deserialize, Serialize};

/// One exported symbol: a name and its byte offset into the code buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSymbol {
    /// Symbol name as exported by the script.
    pub name: String,
    /// Byte offset of the symbol within the native code buffer.
    pub offset: u32,
}

/// A `#pragma key value` pair carried through from the source module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pragma {
    /// Pragma key.
    pub key: String,
    /// Pragma value.
    pub value: String,
}

/// Per-function metadata for debugger and host introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncInfo {
    /// Function name.
    pub name: String,
    /// Byte offset of the function body within the code buffer.
    pub offset: u32,
    /// Size of the function body in bytes.
    pub size: u32,
}

/// Export metadata for a prepared script.
///
/// Both artifact variants (freshly compiled and cache-loaded) answer host
/// queries from this table, so the two must be structurally identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTable {
    /// Exported global variables.
    pub variables: Vec<ExportSymbol>,
    /// Exported callable functions.
    pub functions: Vec<ExportSymbol>,
    /// Exported invokable kernels.
    pub kernels: Vec<ExportSymbol>,
    /// Pragmas declared by the script.
    pub pragmas: Vec<Pragma>,
    /// Per-function info records.
    pub func_infos: Vec<FuncInfo>,
    /// Object-reference slot indices declared by the script.
    pub object_slots: Vec<u32>,
}

impl ExportTable {
    /// Finds the code-buffer offset of a named export.
    ///
    /// Functions take precedence over kernels, which take precedence over
    /// variables, matching the lookup order of the execution surface.
    pub fn symbol_offset(&self, name: &str) -> Option<u32> {
        self.functions
            .iter()
            .chain(self.kernels.iter())
            .chain(self.variables.iter())
            .find(|sym| sym.name == name)
            .map(|sym| sym.offset)
    }
}

/// Native, callable code with its export metadata.
///
/// The code buffer is owned; symbol addresses point into it and stay valid
/// for the lifetime of the image (the heap allocation does not move when
/// the image itself is moved).
#[derive(Debug)]
pub struct NativeImage {
    code: Vec<u8>,
    exports: ExportTable,
}

impl NativeImage {
    /// Builds an image from a code buffer and its export table.
    pub fn new(code: Vec<u8>, exports: ExportTable) -> Self {
        Self { code, exports }
    }

    /// The raw object bytes of this image.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The export metadata of this image.
    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    /// Resolves an exported symbol to its address inside the code buffer.
    ///
    /// Returns `None` for names the script does not export and for offsets
    /// that fall outside the code buffer.
    pub fn symbol_address(&self, name: &str) -> Option<*const u8> {
        let offset = self.exports.symbol_offset(name)? as usize;
        if offset >= self.code.len() {
            return None;
        }
        Some(self.code[offset..].as_ptr())
    }
}
