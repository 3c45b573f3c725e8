//! The script orchestrator and its state machine.

use std::io::Write;
use std::path::{Path, PathBuf};

use ember_backend::{
    debugger, Backend, CompileOptions, ExportSymbol, FuncInfo, NativeImage, Pragma, RelocModel,
    SourceFlags, SymbolResolver,
};
use ember_cache::{CacheMissReason, CachePaths, CacheReader, CacheWriter, DependencyLedger};
use ember_config::{Properties, PROP_DEBUG_NOCACHE};
use ember_source::Source;

use crate::artifact::{ArtifactQuery, CachedArtifact, CompiledArtifact};
use crate::error::{ScriptError, ScriptResult};

/// Which source position an input occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSlot {
    /// The required main source; must be set before finalization.
    Primary,
    /// An optional support library linked into the primary module.
    SupportLibrary,
}

impl SourceSlot {
    fn index(self) -> usize {
        match self {
            SourceSlot::Primary => 0,
            SourceSlot::SupportLibrary => 1,
        }
    }
}

/// The host-visible lifecycle tag of a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    /// Sources may still be added; no artifact exists yet.
    Unknown,
    /// Finalized by a fresh compile.
    Compiled,
    /// Finalized by a validated cache reload.
    Cached,
}

/// Which output mode the script was last prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// In-process executable code.
    Executable,
    /// A relocatable object serialized to disk.
    Relocatable,
}

/// The artifact sum type: the state tag and the active artifact are one
/// value, so they cannot disagree.
enum State {
    Unknown,
    Compiled(CompiledArtifact),
    Cached(CachedArtifact),
}

/// A compilation unit from raw sources to a callable artifact.
///
/// The lifecycle is a one-way state machine: `Unknown` until a prepare
/// operation succeeds, then terminally `Compiled` or `Cached`. Sources and
/// the symbol resolver may only change while `Unknown`; queries are only
/// answered once finalized. A `Script` is single-owner and carries no
/// internal synchronization; the only shared boundaries (the debugger
/// registry and the on-disk cache) serialize themselves.
pub struct Script<'b, B: Backend> {
    backend: &'b B,
    properties: Properties,
    context: Option<B::Context>,
    sources: [Option<Source<B>>; 2],
    state: State,
    cache_dir: Option<PathBuf>,
    cache_name: Option<String>,
    resolver: Option<SymbolResolver>,
    object_type: Option<ObjectType>,
    last_miss: Option<CacheMissReason>,
}

impl<'b, B: Backend> Script<'b, B> {
    /// Creates a script over a backend with the given runtime properties.
    pub fn new(backend: &'b B, properties: Properties) -> Self {
        Self {
            backend,
            properties,
            context: None,
            sources: [None, None],
            state: State::Unknown,
            cache_dir: None,
            cache_name: None,
            resolver: None,
            object_type: None,
            last_miss: None,
        }
    }

    /// Creates a script over a pre-created backend context.
    ///
    /// Needed when the host parses modules itself before handing them over
    /// via [`Script::add_source_module`]: backends require that every module
    /// entering one compile pipeline came from the same context.
    pub fn with_context(backend: &'b B, properties: Properties, context: B::Context) -> Self {
        let mut script = Self::new(backend, properties);
        script.context = Some(context);
        script
    }

    /// The current lifecycle state.
    pub fn status(&self) -> ScriptStatus {
        match self.state {
            State::Unknown => ScriptStatus::Unknown,
            State::Compiled(_) => ScriptStatus::Compiled,
            State::Cached(_) => ScriptStatus::Cached,
        }
    }

    /// The output mode of the last successful prepare operation.
    pub fn object_type(&self) -> Option<ObjectType> {
        self.object_type
    }

    /// Why the most recent cache-load attempt missed, if it did.
    pub fn last_cache_miss(&self) -> Option<CacheMissReason> {
        self.last_miss
    }

    /// Returns `true` if the slot holds a source.
    pub fn has_source(&self, slot: SourceSlot) -> bool {
        self.sources[slot.index()].is_some()
    }

    fn ensure_unknown(&self, operation: &str) -> ScriptResult<()> {
        match self.state {
            State::Unknown => Ok(()),
            _ => Err(ScriptError::invalid_operation(format!(
                "{operation} after finalization"
            ))),
        }
    }

    /// Adds an in-memory bitcode buffer.
    ///
    /// Replacing an occupied slot before finalization is permitted; the
    /// previous descriptor is dropped.
    pub fn add_source_buffer(
        &mut self,
        slot: SourceSlot,
        name: &str,
        bitcode: &[u8],
        flags: SourceFlags,
    ) -> ScriptResult<()> {
        if name.is_empty() {
            return Err(ScriptError::invalid_argument("empty resource name"));
        }
        self.ensure_unknown("add_source")?;
        if bitcode.is_empty() {
            return Err(ScriptError::invalid_argument("empty bitcode buffer"));
        }
        self.sources[slot.index()] = Some(Source::from_buffer(name, bitcode, flags));
        Ok(())
    }

    /// Adds a pre-built backend module.
    pub fn add_source_module(
        &mut self,
        slot: SourceSlot,
        name: &str,
        module: B::Module,
        flags: SourceFlags,
    ) -> ScriptResult<()> {
        if name.is_empty() {
            return Err(ScriptError::invalid_argument("empty resource name"));
        }
        self.ensure_unknown("add_source")?;
        self.sources[slot.index()] =
            Some(Source::from_module(self.backend, name, module, flags));
        Ok(())
    }

    /// Adds a bitcode file; the file must be readable now.
    pub fn add_source_file(
        &mut self,
        slot: SourceSlot,
        path: &Path,
        flags: SourceFlags,
    ) -> ScriptResult<()> {
        self.ensure_unknown("add_source")?;
        let source = Source::from_file(path, flags)?;
        self.sources[slot.index()] = Some(source);
        Ok(())
    }

    /// Registers the host's external symbol resolver.
    ///
    /// Only permitted while the script is `Unknown`; a late registration
    /// is rejected and has no effect.
    pub fn register_symbol_resolver(&mut self, resolver: SymbolResolver) -> ScriptResult<()> {
        self.ensure_unknown("register_symbol_resolver")?;
        self.resolver = Some(resolver);
        Ok(())
    }

    /// Whether the cache may be consulted and written.
    ///
    /// False when the debug disable property is set or either cache
    /// location string is missing or empty. Gates the load and write paths
    /// identically.
    pub fn is_cacheable(&self) -> bool {
        if self.properties.get_bool(PROP_DEBUG_NOCACHE) {
            return false;
        }
        let dir_ok = self
            .cache_dir
            .as_deref()
            .is_some_and(|dir| !dir.as_os_str().is_empty());
        let name_ok = self.cache_name.as_deref().is_some_and(|n| !n.is_empty());
        dir_ok && name_ok
    }

    fn build_ledger(&self) -> DependencyLedger {
        let mut ledger =
            DependencyLedger::for_runtime(self.backend.name(), self.backend.fingerprint());
        for source in self.sources.iter().flatten() {
            ledger.push(source.ledger_entry());
        }
        ledger
    }

    fn cache_paths(&self) -> Option<CachePaths> {
        let dir = self.cache_dir.as_deref()?;
        let name = self.cache_name.as_deref()?;
        Some(CachePaths::new(dir, name))
    }

    /// Prepares the script for in-process execution.
    ///
    /// Attempts a dependency-validated cache load first; on any miss,
    /// compiles and writes the result back to the cache. A cache-write
    /// failure is logged and swallowed: the in-memory artifact remains
    /// fully usable without persistence.
    pub fn prepare_executable(&mut self, cache_dir: &Path, cache_name: &str) -> ScriptResult<()> {
        self.ensure_unknown("prepare_executable")?;
        self.cache_dir = Some(cache_dir.to_path_buf());
        self.cache_name = Some(cache_name.to_string());

        if self.is_cacheable() {
            let ledger = self.build_ledger();
            let paths = CachePaths::new(cache_dir, cache_name);
            match CacheReader::new(&ledger).read(&paths, self.backend, self.resolver.as_ref()) {
                Ok(image) => {
                    debugger::register_code_range(image.code().as_ptr(), image.code().len());
                    log::debug!("loaded '{cache_name}' from cache");
                    self.state = State::Cached(CachedArtifact::new(image));
                    self.object_type = Some(ObjectType::Executable);
                    return Ok(());
                }
                Err(miss) => {
                    log::debug!("cache miss for '{cache_name}': {miss}");
                    self.last_miss = Some(miss.reason);
                }
            }
        }

        let artifact = self.internal_compile(&CompileOptions::default())?;

        // A slot-unavailable miss means the pair on disk is still valid;
        // rewriting it would only churn the inode under concurrent readers.
        if self.is_cacheable() && self.last_miss != Some(CacheMissReason::SlotUnavailable) {
            let ledger = self.build_ledger();
            if let Some(paths) = self.cache_paths() {
                let image = artifact.image();
                if let Err(err) =
                    CacheWriter::new(&ledger).write(&paths, image.code(), image.exports())
                {
                    log::warn!("failed to write cache for '{cache_name}': {err}");
                }
            }
        }

        debugger::register_code_range(
            artifact.image().code().as_ptr(),
            artifact.image().code().len(),
        );
        self.state = State::Compiled(artifact);
        self.object_type = Some(ObjectType::Executable);
        Ok(())
    }

    /// Compiles with the given relocation model and serializes the object
    /// bytes to `object_path`. Does not consult or write the cache.
    pub fn prepare_relocatable(
        &mut self,
        object_path: &Path,
        reloc_model: RelocModel,
    ) -> ScriptResult<()> {
        self.ensure_unknown("prepare_relocatable")?;
        let options = CompileOptions {
            reloc_model,
            load_for_execution: false,
        };
        let artifact = self.internal_compile(&options)?;
        let result = write_object_file(object_path, artifact.image().code());

        self.state = State::Compiled(artifact);
        if result.is_ok() {
            self.object_type = Some(ObjectType::Relocatable);
        }
        result
    }

    /// The fail-fast compile pipeline: materialize the primary module,
    /// materialize and link the support library against the same context,
    /// then hand the merged module to the backend.
    fn internal_compile(&mut self, options: &CompileOptions) -> ScriptResult<CompiledArtifact> {
        let backend = self.backend;
        if self.sources[SourceSlot::Primary.index()].is_none() {
            return Err(ScriptError::invalid_operation(
                "prepare without a primary source",
            ));
        }
        let ctx = self
            .context
            .get_or_insert_with(|| backend.create_context());

        let Some(primary) = self.sources[SourceSlot::Primary.index()].as_mut() else {
            return Err(ScriptError::invalid_operation(
                "prepare without a primary source",
            ));
        };
        let mut base = primary.take_module(backend, ctx)?;

        if let Some(library) = self.sources[SourceSlot::SupportLibrary.index()].as_mut() {
            let lib = library.take_module(backend, ctx)?;
            backend.link(ctx, &mut base, lib)?;
        }

        let output = backend.compile(ctx, base, options, self.resolver.as_ref())?;
        Ok(CompiledArtifact::new(output.image, output.diagnostic))
    }

    fn active(&self, operation: &str) -> ScriptResult<&dyn ArtifactQuery> {
        match &self.state {
            State::Compiled(artifact) => Ok(artifact),
            State::Cached(artifact) => Ok(artifact),
            State::Unknown => Err(ScriptError::invalid_operation(format!(
                "{operation} before finalization"
            ))),
        }
    }

    fn image(&self, operation: &str) -> ScriptResult<&NativeImage> {
        Ok(self.active(operation)?.image())
    }

    /// Resolves an exported symbol to its address.
    ///
    /// `Ok(None)` means the script does not export the name.
    pub fn lookup(&self, name: &str) -> ScriptResult<Option<*const u8>> {
        Ok(self.active("lookup")?.lookup(name))
    }

    /// Number of exported variables.
    pub fn export_var_count(&self) -> ScriptResult<usize> {
        Ok(self.image("export_var_count")?.exports().variables.len())
    }

    /// Number of exported functions.
    pub fn export_func_count(&self) -> ScriptResult<usize> {
        Ok(self.image("export_func_count")?.exports().functions.len())
    }

    /// Number of exported invokable kernels.
    pub fn export_kernel_count(&self) -> ScriptResult<usize> {
        Ok(self.image("export_kernel_count")?.exports().kernels.len())
    }

    /// Number of pragmas.
    pub fn pragma_count(&self) -> ScriptResult<usize> {
        Ok(self.image("pragma_count")?.exports().pragmas.len())
    }

    /// Number of per-function info records.
    pub fn func_info_count(&self) -> ScriptResult<usize> {
        Ok(self.image("func_info_count")?.exports().func_infos.len())
    }

    /// Number of object-reference slots.
    pub fn object_slot_count(&self) -> ScriptResult<usize> {
        Ok(self.image("object_slot_count")?.exports().object_slots.len())
    }

    /// Fills `out` with exported variable addresses; returns how many were
    /// written (the smaller of the capacity and the export count).
    pub fn export_var_list(&self, out: &mut [*const u8]) -> ScriptResult<usize> {
        let image = self.image("export_var_list")?;
        Ok(fill_addresses(image, &image.exports().variables, out))
    }

    /// Fills `out` with exported function addresses.
    pub fn export_func_list(&self, out: &mut [*const u8]) -> ScriptResult<usize> {
        let image = self.image("export_func_list")?;
        Ok(fill_addresses(image, &image.exports().functions, out))
    }

    /// Fills `out` with exported kernel addresses.
    pub fn export_kernel_list(&self, out: &mut [*const u8]) -> ScriptResult<usize> {
        let image = self.image("export_kernel_list")?;
        Ok(fill_addresses(image, &image.exports().kernels, out))
    }

    /// Fills `out` with pragma pairs.
    pub fn pragma_list(&self, out: &mut [Pragma]) -> ScriptResult<usize> {
        let pragmas = &self.image("pragma_list")?.exports().pragmas;
        let n = pragmas.len().min(out.len());
        out[..n].clone_from_slice(&pragmas[..n]);
        Ok(n)
    }

    /// Fills `out` with per-function info records.
    pub fn func_info_list(&self, out: &mut [FuncInfo]) -> ScriptResult<usize> {
        let infos = &self.image("func_info_list")?.exports().func_infos;
        let n = infos.len().min(out.len());
        out[..n].clone_from_slice(&infos[..n]);
        Ok(n)
    }

    /// Fills `out` with object-reference slot indices.
    pub fn object_slot_list(&self, out: &mut [u32]) -> ScriptResult<usize> {
        let slots = &self.image("object_slot_list")?.exports().object_slots;
        let n = slots.len().min(out.len());
        out[..n].copy_from_slice(&slots[..n]);
        Ok(n)
    }

    /// The code generator's non-fatal diagnostic from this run's compile.
    ///
    /// Only meaningful for a `Compiled` script; a cached artifact was never
    /// compiled in this run, so the query is an invalid operation there.
    pub fn compiler_error_message(&self) -> ScriptResult<Option<&str>> {
        match &self.state {
            State::Compiled(artifact) => Ok(artifact.compiler_message()),
            _ => Err(ScriptError::invalid_operation(
                "compiler_error_message without a compile in this run",
            )),
        }
    }
}

/// Address of one export inside the image's code buffer.
fn symbol_address(image: &NativeImage, symbol: &ExportSymbol) -> *const u8 {
    image
        .code()
        .get(symbol.offset as usize..)
        .map_or(std::ptr::null(), |tail| tail.as_ptr())
}

fn fill_addresses(image: &NativeImage, symbols: &[ExportSymbol], out: &mut [*const u8]) -> usize {
    let n = symbols.len().min(out.len());
    for (slot, symbol) in out.iter_mut().zip(&symbols[..n]) {
        *slot = symbol_address(image, symbol);
    }
    n
}

/// Serializes object bytes, deleting the partial file on any failure.
fn write_object_file(path: &Path, code: &[u8]) -> ScriptResult<()> {
    let mut file = std::fs::File::create(path).map_err(|e| ScriptError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Err(err) = file.write_all(code).and_then(|_| file.flush()) {
        drop(file);
        remove_partial(path);
        return Err(ScriptError::Io {
            path: path.to_path_buf(),
            source: err,
        });
    }

    let written = file.metadata().map(|m| m.len()).unwrap_or(0);
    if written != code.len() as u64 {
        drop(file);
        remove_partial(path);
        return Err(ScriptError::TruncatedWrite {
            path: path.to_path_buf(),
            expected: code.len() as u64,
            written,
        });
    }
    Ok(())
}

fn remove_partial(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::warn!(
                "unable to remove partial object file {}: {err}",
                path.display()
            );
        }
    }
}
