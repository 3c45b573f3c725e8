//! Deterministic reference backend used by the test suites.
//!
//! `FixtureBackend` consumes a line-oriented module format instead of real
//! bitcode so that every crate above the backend seam can exercise the full
//! prepare/cache/reload protocol without a code generator. One directive
//! per line, `;` starts a comment:
//!
//! ```text
//! var    NAME        ; exported global variable
//! fun    NAME        ; exported function
//! kernel NAME        ; exported invokable kernel
//! pragma KEY VALUE   ; pragma pair
//! slot   N           ; object-reference slot index
//! extern NAME        ; external symbol, must resolve at compile time
//! ```
//!
//! Compilation lays every exported symbol out as a 16-byte block derived
//! from the symbol name, after a 16-byte object header, so images are
//! byte-for-byte reproducible.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use ember_common::ContentHash;

use crate::backend::{Backend, BackendError, CompileOutput};
use crate::image::{ExportSymbol, ExportTable, FuncInfo, NativeImage, Pragma};
use crate::options::{CompileOptions, RelocModel, SourceFlags};
use crate::resolver::SymbolResolver;

/// Object header magic for fixture images.
const OBJECT_MAGIC: [u8; 8] = *b"EMBROBJ\0";

/// Fixture object format version byte.
const OBJECT_VERSION: u8 = 1;

/// Size of the object header and of each symbol block.
const BLOCK: usize = 16;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One parsed directive of the fixture module format.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decl {
    Var(String),
    Fun(String),
    Kernel(String),
    Pragma(String, String),
    Slot(u32),
    Extern(String),
}

/// Compilation context of the fixture backend.
///
/// Carries only an identity; modules remember which context parsed them so
/// the linker can enforce the shared-context invariant.
#[derive(Debug)]
pub struct FixtureContext {
    id: u64,
}

/// A parsed fixture module.
#[derive(Debug)]
pub struct FixtureModule {
    name: String,
    ctx_id: u64,
    decls: Vec<Decl>,
}

impl FixtureModule {
    /// The resource name this module was parsed from.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn canonical_text(&self) -> String {
        let mut text = String::new();
        for decl in &self.decls {
            match decl {
                Decl::Var(n) => text.push_str(&format!("var {n}\n")),
                Decl::Fun(n) => text.push_str(&format!("fun {n}\n")),
                Decl::Kernel(n) => text.push_str(&format!("kernel {n}\n")),
                Decl::Pragma(k, v) => text.push_str(&format!("pragma {k} {v}\n")),
                Decl::Slot(s) => text.push_str(&format!("slot {s}\n")),
                Decl::Extern(n) => text.push_str(&format!("extern {n}\n")),
            }
        }
        text
    }
}

/// Deterministic in-tree backend over the fixture module format.
#[derive(Debug, Default)]
pub struct FixtureBackend {
    compile_calls: AtomicUsize,
    /// Remaining execution slots for image loads, `None` = unbounded.
    exec_slots: Option<AtomicUsize>,
}

impl FixtureBackend {
    /// Creates a backend with an unbounded execution-slot pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that can load at most `slots` images before
    /// reporting [`BackendError::NoExecutionSlot`].
    pub fn with_exec_slots(slots: usize) -> Self {
        Self {
            compile_calls: AtomicUsize::new(0),
            exec_slots: Some(AtomicUsize::new(slots)),
        }
    }

    /// Number of times the compile step has run on this backend instance.
    pub fn compile_count(&self) -> usize {
        self.compile_calls.load(Ordering::SeqCst)
    }

    fn take_exec_slot(&self) -> Result<(), BackendError> {
        if let Some(slots) = &self.exec_slots {
            slots
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .map_err(|_| BackendError::NoExecutionSlot)?;
        }
        Ok(())
    }
}

fn parse_decl(line_no: usize, line: &str) -> Result<Option<Decl>, BackendError> {
    let line = match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let mut parts = line.split_whitespace();
    let Some(directive) = parts.next() else {
        return Ok(None);
    };

    let parse_err = |message: String| BackendError::Parse { message };
    let one_name = |parts: &mut std::str::SplitWhitespace<'_>| {
        parts
            .next()
            .map(str::to_string)
            .ok_or_else(|| parse_err(format!("line {line_no}: '{directive}' needs a name")))
    };

    let decl = match directive {
        "var" => Decl::Var(one_name(&mut parts)?),
        "fun" => Decl::Fun(one_name(&mut parts)?),
        "kernel" => Decl::Kernel(one_name(&mut parts)?),
        "extern" => Decl::Extern(one_name(&mut parts)?),
        "pragma" => {
            let key = one_name(&mut parts)?;
            let value = parts
                .next()
                .map(str::to_string)
                .ok_or_else(|| parse_err(format!("line {line_no}: 'pragma' needs a value")))?;
            Decl::Pragma(key, value)
        }
        "slot" => {
            let raw = one_name(&mut parts)?;
            let index = raw
                .parse::<u32>()
                .map_err(|_| parse_err(format!("line {line_no}: bad slot index '{raw}'")))?;
            Decl::Slot(index)
        }
        other => {
            return Err(parse_err(format!(
                "line {line_no}: unknown directive '{other}'"
            )))
        }
    };
    Ok(Some(decl))
}

impl Backend for FixtureBackend {
    type Context = FixtureContext;
    type Module = FixtureModule;

    fn name(&self) -> &str {
        "fixture"
    }

    fn fingerprint(&self) -> ContentHash {
        ContentHash::from_bytes(
            format!("fixture-backend/{}", env!("CARGO_PKG_VERSION")).as_bytes(),
        )
    }

    fn create_context(&self) -> FixtureContext {
        FixtureContext {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn parse(
        &self,
        ctx: &mut FixtureContext,
        name: &str,
        bitcode: &[u8],
        _flags: SourceFlags,
    ) -> Result<FixtureModule, BackendError> {
        let text = std::str::from_utf8(bitcode).map_err(|_| BackendError::Parse {
            message: format!("{name}: module is not valid utf-8"),
        })?;

        let mut decls = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if let Some(decl) = parse_decl(idx + 1, line)? {
                decls.push(decl);
            }
        }

        Ok(FixtureModule {
            name: name.to_string(),
            ctx_id: ctx.id,
            decls,
        })
    }

    fn module_fingerprint(&self, module: &FixtureModule) -> ContentHash {
        ContentHash::from_bytes(module.canonical_text().as_bytes())
    }

    fn link(
        &self,
        ctx: &mut FixtureContext,
        base: &mut FixtureModule,
        library: FixtureModule,
    ) -> Result<(), BackendError> {
        if base.ctx_id != ctx.id || library.ctx_id != ctx.id {
            return Err(BackendError::ContextMismatch);
        }

        for decl in &library.decls {
            if let Decl::Fun(name) | Decl::Kernel(name) = decl {
                let duplicate = base
                    .decls
                    .iter()
                    .any(|d| matches!(d, Decl::Fun(n) | Decl::Kernel(n) if n == name));
                if duplicate {
                    return Err(BackendError::Link {
                        message: format!("duplicate symbol '{name}'"),
                    });
                }
            }
        }

        base.decls.extend(library.decls);
        Ok(())
    }

    fn compile(
        &self,
        ctx: &mut FixtureContext,
        module: FixtureModule,
        options: &CompileOptions,
        resolver: Option<&SymbolResolver>,
    ) -> Result<CompileOutput, BackendError> {
        if module.ctx_id != ctx.id {
            return Err(BackendError::ContextMismatch);
        }
        self.compile_calls.fetch_add(1, Ordering::SeqCst);

        // Externals must resolve before layout.
        for decl in &module.decls {
            if let Decl::Extern(name) = decl {
                let resolved = resolver.and_then(|r| r.resolve(name));
                if resolved.is_none() {
                    return Err(BackendError::Codegen {
                        message: format!("unresolved external symbol '{name}'"),
                    });
                }
            }
        }

        let mut code = Vec::new();
        code.extend_from_slice(&OBJECT_MAGIC);
        code.push(OBJECT_VERSION);
        code.push(match options.reloc_model {
            RelocModel::Default => 0,
            RelocModel::Static => 1,
            RelocModel::Pic => 2,
        });
        code.push(options.load_for_execution as u8);
        code.resize(BLOCK, 0);

        let mut exports = ExportTable::default();
        for decl in &module.decls {
            let (name, list) = match decl {
                Decl::Var(n) => (n, &mut exports.variables),
                Decl::Fun(n) => (n, &mut exports.functions),
                Decl::Kernel(n) => (n, &mut exports.kernels),
                Decl::Pragma(k, v) => {
                    exports.pragmas.push(Pragma {
                        key: k.clone(),
                        value: v.clone(),
                    });
                    continue;
                }
                Decl::Slot(s) => {
                    exports.object_slots.push(*s);
                    continue;
                }
                Decl::Extern(_) => continue,
            };

            let offset = code.len() as u32;
            code.extend_from_slice(ContentHash::from_bytes(name.as_bytes()).as_bytes());
            list.push(ExportSymbol {
                name: name.clone(),
                offset,
            });
            if matches!(decl, Decl::Fun(_) | Decl::Kernel(_)) {
                exports.func_infos.push(FuncInfo {
                    name: name.clone(),
                    offset,
                    size: BLOCK as u32,
                });
            }
        }

        let diagnostic = exports
            .kernels
            .iter()
            .find(|k| exports.functions.iter().any(|f| f.name == k.name))
            .map(|k| format!("kernel '{}' shadows function '{}'", k.name, k.name));

        Ok(CompileOutput {
            image: NativeImage::new(code, exports),
            diagnostic,
        })
    }

    fn load(
        &self,
        object: Vec<u8>,
        exports: ExportTable,
        _resolver: Option<&SymbolResolver>,
    ) -> Result<NativeImage, BackendError> {
        if object.len() < BLOCK || object[..8] != OBJECT_MAGIC || object[8] != OBJECT_VERSION {
            return Err(BackendError::Codegen {
                message: "invalid object image".to_string(),
            });
        }
        self.take_exec_slot()?;
        Ok(NativeImage::new(object, exports))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_source(source: &str) -> CompileOutput {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let module = backend
            .parse(&mut ctx, "test", source.as_bytes(), SourceFlags::default())
            .unwrap();
        backend
            .compile(&mut ctx, module, &CompileOptions::default(), None)
            .unwrap()
    }

    #[test]
    fn parse_collects_declarations() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let source = "; header comment\nvar gInt\nfun root\nkernel blur\npragma version 1\nslot 2\n";
        let module = backend
            .parse(&mut ctx, "s", source.as_bytes(), SourceFlags::default())
            .unwrap();
        assert_eq!(module.decls.len(), 5);
        assert_eq!(module.name(), "s");
    }

    #[test]
    fn parse_rejects_unknown_directive() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let err = backend
            .parse(&mut ctx, "s", b"frobnicate x\n", SourceFlags::default())
            .unwrap_err();
        assert!(format!("{err}").contains("unknown directive 'frobnicate'"));
    }

    #[test]
    fn parse_rejects_bad_slot() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let err = backend
            .parse(&mut ctx, "s", b"slot banana\n", SourceFlags::default())
            .unwrap_err();
        assert!(format!("{err}").contains("bad slot index"));
    }

    #[test]
    fn compile_is_deterministic() {
        let a = compile_source("var g\nfun root\n");
        let b = compile_source("var g\nfun root\n");
        assert_eq!(a.image.code(), b.image.code());
        assert_eq!(a.image.exports(), b.image.exports());
    }

    #[test]
    fn compile_lays_out_symbols_after_header() {
        let out = compile_source("var g\nfun root\n");
        let exports = out.image.exports();
        assert_eq!(exports.variables[0].offset, 16);
        assert_eq!(exports.functions[0].offset, 32);
        assert_eq!(out.image.code().len(), 48);
        assert_eq!(exports.func_infos.len(), 1);
        assert_eq!(exports.func_infos[0].size, 16);
    }

    #[test]
    fn compile_requires_resolved_externs() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let module = backend
            .parse(&mut ctx, "s", b"extern host_fn\nfun root\n", SourceFlags::default())
            .unwrap();
        let err = backend
            .compile(&mut ctx, module, &CompileOptions::default(), None)
            .unwrap_err();
        assert!(format!("{err}").contains("unresolved external symbol 'host_fn'"));
    }

    #[test]
    fn compile_accepts_resolved_externs() {
        static TARGET: u32 = 7;
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let module = backend
            .parse(&mut ctx, "s", b"extern host_fn\nfun root\n", SourceFlags::default())
            .unwrap();
        let resolver = SymbolResolver::new(|name| {
            (name == "host_fn").then(|| &TARGET as *const u32 as *const ())
        });
        let out = backend
            .compile(&mut ctx, module, &CompileOptions::default(), Some(&resolver))
            .unwrap();
        assert!(out.image.symbol_address("root").is_some());
    }

    #[test]
    fn kernel_shadowing_function_warns() {
        let out = compile_source("fun work\nkernel work\n");
        assert_eq!(
            out.diagnostic.as_deref(),
            Some("kernel 'work' shadows function 'work'")
        );
    }

    #[test]
    fn link_merges_library_decls() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let mut base = backend
            .parse(&mut ctx, "main", b"fun root\n", SourceFlags::default())
            .unwrap();
        let lib = backend
            .parse(&mut ctx, "lib", b"fun helper\nvar gLib\n", SourceFlags::default())
            .unwrap();
        backend.link(&mut ctx, &mut base, lib).unwrap();

        let out = backend
            .compile(&mut ctx, base, &CompileOptions::default(), None)
            .unwrap();
        assert!(out.image.symbol_address("root").is_some());
        assert!(out.image.symbol_address("helper").is_some());
        assert!(out.image.symbol_address("gLib").is_some());
    }

    #[test]
    fn link_rejects_duplicate_symbols() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let mut base = backend
            .parse(&mut ctx, "main", b"fun root\n", SourceFlags::default())
            .unwrap();
        let lib = backend
            .parse(&mut ctx, "lib", b"fun root\n", SourceFlags::default())
            .unwrap();
        let err = backend.link(&mut ctx, &mut base, lib).unwrap_err();
        assert!(format!("{err}").contains("duplicate symbol 'root'"));
    }

    #[test]
    fn link_rejects_foreign_context() {
        let backend = FixtureBackend::new();
        let mut ctx_a = backend.create_context();
        let mut ctx_b = backend.create_context();
        let mut base = backend
            .parse(&mut ctx_a, "main", b"fun root\n", SourceFlags::default())
            .unwrap();
        let lib = backend
            .parse(&mut ctx_b, "lib", b"fun helper\n", SourceFlags::default())
            .unwrap();
        let err = backend.link(&mut ctx_a, &mut base, lib).unwrap_err();
        assert!(matches!(err, BackendError::ContextMismatch));
    }

    #[test]
    fn load_roundtrips_object_bytes() {
        let backend = FixtureBackend::new();
        let out = compile_source("fun root\n");
        let code = out.image.code().to_vec();
        let exports = out.image.exports().clone();
        let image = backend.load(code.clone(), exports, None).unwrap();
        assert_eq!(image.code(), code.as_slice());
        assert!(image.symbol_address("root").is_some());
    }

    #[test]
    fn load_rejects_bad_magic() {
        let backend = FixtureBackend::new();
        let err = backend
            .load(vec![0u8; 32], ExportTable::default(), None)
            .unwrap_err();
        assert!(format!("{err}").contains("invalid object image"));
    }

    #[test]
    fn load_exhausts_exec_slots() {
        let backend = FixtureBackend::with_exec_slots(1);
        let out = compile_source("fun root\n");
        let code = out.image.code().to_vec();

        assert!(backend
            .load(code.clone(), out.image.exports().clone(), None)
            .is_ok());
        let err = backend
            .load(code, out.image.exports().clone(), None)
            .unwrap_err();
        assert!(matches!(err, BackendError::NoExecutionSlot));
    }

    #[test]
    fn module_fingerprint_tracks_content() {
        let backend = FixtureBackend::new();
        let mut ctx = backend.create_context();
        let a = backend
            .parse(&mut ctx, "a", b"fun root\n", SourceFlags::default())
            .unwrap();
        let b = backend
            .parse(&mut ctx, "b", b"fun root\n", SourceFlags::default())
            .unwrap();
        let c = backend
            .parse(&mut ctx, "c", b"fun other\n", SourceFlags::default())
            .unwrap();
        assert_eq!(backend.module_fingerprint(&a), backend.module_fingerprint(&b));
        assert_ne!(backend.module_fingerprint(&a), backend.module_fingerprint(&c));
    }

    #[test]
    fn compile_count_increments() {
        let backend = FixtureBackend::new();
        assert_eq!(backend.compile_count(), 0);
        let mut ctx = backend.create_context();
        let module = backend
            .parse(&mut ctx, "s", b"fun root\n", SourceFlags::default())
            .unwrap();
        backend
            .compile(&mut ctx, module, &CompileOptions::default(), None)
            .unwrap();
        assert_eq!(backend.compile_count(), 1);
    }
}
