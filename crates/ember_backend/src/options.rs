//! Compilation options and per-source flags.

/// Relocation model requested from the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelocModel {
    /// Let the backend pick its default model.
    #[default]
    Default,
    /// Non-relocatable, absolute code.
    Static,
    /// Position-independent code.
    Pic,
}

/// Options handed to the backend's compile step.
///
/// Executable preparation uses the defaults; relocatable-object preparation
/// supplies a caller-chosen relocation model and disables loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Relocation model for code generation.
    pub reloc_model: RelocModel,
    /// Whether the compiled image should be made executable in-process.
    /// `false` when the object is only serialized to disk.
    pub load_for_execution: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            reloc_model: RelocModel::Default,
            load_for_execution: true,
        }
    }
}

/// Opaque per-source flags passed through to the backend.
///
/// The execution layer never interprets these; they travel with the source
/// descriptor from the host to the backend's parse step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceFlags(pub u32);
