//! The three source kinds (buffer, file, prebuilt module), support-library
//! linking, and external symbol resolution, end to end.

use ember_backend::{Backend, FixtureBackend, SourceFlags, SymbolResolver};
use ember_cache::CacheMissReason;
use ember_config::Properties;
use ember_conformance::{script_with_buffer, BASIC_SOURCE, LIBRARY_SOURCE};
use ember_script::{Script, ScriptStatus, SourceSlot};

#[test]
fn file_source_roundtrips_through_the_cache() {
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let bc_path = dir.path().join("main.ebc");
    let cache_dir = dir.path().join("cache");
    std::fs::write(&bc_path, BASIC_SOURCE).unwrap();

    let mut cold = Script::new(&backend, Properties::empty());
    cold.add_source_file(SourceSlot::Primary, &bc_path, SourceFlags::default())
        .unwrap();
    cold.prepare_executable(&cache_dir, "file_script").unwrap();
    assert_eq!(cold.status(), ScriptStatus::Compiled);
    assert!(cold.lookup("root").unwrap().is_some());

    let mut warm = Script::new(&backend, Properties::empty());
    warm.add_source_file(SourceSlot::Primary, &bc_path, SourceFlags::default())
        .unwrap();
    warm.prepare_executable(&cache_dir, "file_script").unwrap();
    assert_eq!(warm.status(), ScriptStatus::Cached);
    assert_eq!(backend.compile_count(), 1);
}

#[test]
fn file_content_change_invalidates_the_cache() {
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let bc_path = dir.path().join("main.ebc");
    let cache_dir = dir.path().join("cache");
    std::fs::write(&bc_path, BASIC_SOURCE).unwrap();

    let mut cold = Script::new(&backend, Properties::empty());
    cold.add_source_file(SourceSlot::Primary, &bc_path, SourceFlags::default())
        .unwrap();
    cold.prepare_executable(&cache_dir, "file_script").unwrap();

    std::fs::write(&bc_path, "fun root\nfun added\n").unwrap();
    let mut stale = Script::new(&backend, Properties::empty());
    stale
        .add_source_file(SourceSlot::Primary, &bc_path, SourceFlags::default())
        .unwrap();
    stale.prepare_executable(&cache_dir, "file_script").unwrap();

    assert_eq!(stale.status(), ScriptStatus::Compiled);
    assert_eq!(
        stale.last_cache_miss(),
        Some(CacheMissReason::LedgerMismatch)
    );
    assert!(stale.lookup("added").unwrap().is_some());
}

#[test]
fn prebuilt_module_feeds_the_pipeline() {
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = backend.create_context();
    let module = backend
        .parse(&mut ctx, "pre", BASIC_SOURCE.as_bytes(), SourceFlags::default())
        .unwrap();

    let mut script = Script::with_context(&backend, Properties::empty(), ctx);
    script
        .add_source_module(SourceSlot::Primary, "pre", module, SourceFlags::default())
        .unwrap();
    script.prepare_executable(dir.path(), "prebuilt").unwrap();

    assert_eq!(script.status(), ScriptStatus::Compiled);
    assert!(script.lookup("root").unwrap().is_some());
    assert!(script.lookup("blur").unwrap().is_some());
}

#[test]
fn support_library_symbols_join_the_image() {
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();

    let mut script = script_with_buffer(&backend, Properties::empty(), BASIC_SOURCE);
    script
        .add_source_buffer(
            SourceSlot::SupportLibrary,
            "libsupport",
            LIBRARY_SOURCE.as_bytes(),
            SourceFlags::default(),
        )
        .unwrap();
    script.prepare_executable(dir.path(), "linked").unwrap();

    assert!(script.lookup("root").unwrap().is_some());
    assert!(script.lookup("helper").unwrap().is_some());
    assert!(script.lookup("gLib").unwrap().is_some());
    // Functions from both modules carry info records.
    assert_eq!(script.func_info_count().unwrap(), 3);
}

#[test]
fn support_library_change_invalidates_the_cache() {
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();

    let prepare = |library: &str| {
        let mut script = script_with_buffer(&backend, Properties::empty(), BASIC_SOURCE);
        script
            .add_source_buffer(
                SourceSlot::SupportLibrary,
                "libsupport",
                library.as_bytes(),
                SourceFlags::default(),
            )
            .unwrap();
        script.prepare_executable(dir.path(), "linked").unwrap();
        script
    };

    prepare(LIBRARY_SOURCE);
    let changed = prepare("fun helper\nfun helper2\n");

    assert_eq!(changed.status(), ScriptStatus::Compiled);
    assert_eq!(
        changed.last_cache_miss(),
        Some(CacheMissReason::LedgerMismatch)
    );
    assert_eq!(backend.compile_count(), 2);
}

#[test]
fn resolver_satisfies_externals_across_compile_and_reload() {
    static HOST_TARGET: u32 = 0;
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let source = "extern host_log\nfun root\n";
    let resolver = SymbolResolver::new(|name| {
        (name == "host_log").then(|| &HOST_TARGET as *const u32 as *const ())
    });

    let mut cold = script_with_buffer(&backend, Properties::empty(), source);
    cold.register_symbol_resolver(resolver.clone()).unwrap();
    cold.prepare_executable(dir.path(), "externs").unwrap();
    assert_eq!(cold.status(), ScriptStatus::Compiled);

    let mut warm = script_with_buffer(&backend, Properties::empty(), source);
    warm.register_symbol_resolver(resolver).unwrap();
    warm.prepare_executable(dir.path(), "externs").unwrap();
    assert_eq!(warm.status(), ScriptStatus::Cached);
    assert_eq!(backend.compile_count(), 1);
}

#[test]
fn missing_resolver_fails_compilation_cleanly() {
    let backend = FixtureBackend::new();
    let dir = tempfile::tempdir().unwrap();

    let mut script =
        script_with_buffer(&backend, Properties::empty(), "extern host_log\nfun root\n");
    let err = script.prepare_executable(dir.path(), "externs").unwrap_err();

    assert!(format!("{err}").contains("unresolved external symbol 'host_log'"));
    assert_eq!(script.status(), ScriptStatus::Unknown);
    // Nothing was cached for the failed preparation.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
