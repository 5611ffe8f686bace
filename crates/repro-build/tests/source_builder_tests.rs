//! Source builder tests
//!
//! Drive `SourceBuilder` against recording fakes and check the exact
//! command sequence each project and variant produces.

mod common;

use common::{FakeConfirmer, Fakes, RecordingEditor};
use pretty_assertions::assert_eq;
use repro_build::revision::{deps_url, numbering_url};
use repro_build::{
    resolve_binary_name, BinaryProvider, BuildError, BuildOptions, CheckoutState, CommandOutput,
    GnArgs, GomaPolicy, Provider, SourceBuilder, Testcase,
};
use repro_config::{Arch, Definition, Project, ReproDirs, Sanitizer};
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SHA: &str = "1a2s3d4f";

const DEPS_BASE64: &str = "dmFycyA9IHsNCiAgJ3BkZml1bV9naXQnOiAnaHR0cHM6Ly9wZGZpdW0uZ29vZ2xlc291cmNlLmNvbScsDQogICdwZGZpdW1fcmV2aXNpb24nOiAnNDA5MzAzOWQxOWY4MzIxNzNlYzU4Y2ZkOWYyZThhYzM5M2E3NjA5MScsDQp9DQo=";

struct Workspace {
    _temp: TempDir,
    src: PathBuf,
    state: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let state = temp.path().join("state");
        fs::create_dir_all(&src).unwrap();
        Self {
            _temp: temp,
            src,
            state,
        }
    }

    fn out_dir(&self, id: u64) -> PathBuf {
        self.src.join("out").join(format!("clusterfuzz_{}", id))
    }

    fn dirs(&self) -> ReproDirs {
        ReproDirs::under(&self.state)
    }
}

fn pinned(text: &str) -> GnArgs {
    text.parse().unwrap()
}

fn testcase() -> Testcase {
    Testcase::new(1234, 5678).with_gn_args(pinned("is_asan = true\nis_debug = false"))
}

fn serve_sha(fakes: &Fakes, repo: &str, revision: u64, sha: &str) {
    fakes.fetcher.serve(
        numbering_url(revision, repo),
        &format!(r#"{{"git_sha": "{}", "number": "{}"}}"#, sha, revision),
    );
}

fn builder(
    fakes: &Fakes,
    ws: &Workspace,
    testcase: Testcase,
    definition: Definition,
    options: BuildOptions,
) -> SourceBuilder {
    let binary_name = resolve_binary_name(&definition, &testcase).unwrap();
    SourceBuilder::new(
        testcase,
        definition,
        binary_name,
        options,
        ws.dirs(),
        fakes.services(),
    )
    .with_source_directory(&ws.src)
}

fn policy() -> GomaPolicy {
    GomaPolicy::with_cpu_count(None, None, 4)
}

fn ninja_line(build_dir: &Path, target: &str) -> String {
    format!(
        "ninja -w dupbuild=err -C {} -j 200 -l 8 {}",
        build_dir.display(),
        target
    )
}

// ============================================================================
// Resolution and memoization
// ============================================================================

#[test]
fn test_git_sha_is_memoized() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    serve_sha(&fakes, "v8/v8", 5678, SHA);

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    assert_eq!(v8.git_sha().unwrap(), SHA);

    serve_sha(&fakes, "v8/v8", 5678, "ffffffff");
    assert_eq!(v8.git_sha().unwrap(), SHA);
    assert_eq!(fakes.fetcher.calls().len(), 1);
}

#[test]
fn test_pdfium_sha_comes_from_chromium_deps() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    serve_sha(&fakes, "chromium/src", 5678, "abcd");
    fakes
        .fetcher
        .serve(deps_url("chromium/src", "abcd"), DEPS_BASE64);

    let mut pdfium = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::Pdfium, "PDFIUM_SRC"),
        BuildOptions::default(),
    );
    assert_eq!(
        pdfium.git_sha().unwrap(),
        "4093039d19f832173ec58cfd9f2e8ac393a76091"
    );
}

#[test]
fn test_out_dir_uses_testcase_id_override() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default().with_testcase_id(Some(99)),
    );
    assert_eq!(v8.out_dir_name().unwrap(), ws.out_dir(99));

    let mut fixed = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    )
    .with_build_directory("/elsewhere");
    assert_eq!(fixed.out_dir_name().unwrap(), PathBuf::from("/elsewhere"));
}

#[test]
fn test_missing_source_variable() {
    let fakes = Fakes::new();
    let testcase = testcase();
    let definition = Definition::new(Project::V8, "REPRO_TEST_SOURCE_VAR_THAT_IS_NEVER_SET");
    let mut v8 = SourceBuilder::new(
        testcase,
        definition,
        "d8",
        BuildOptions::default(),
        ReproDirs::under("/state"),
        fakes.services(),
    );

    let err = v8.source_directory().unwrap_err();
    assert!(
        matches!(err, BuildError::MissingSourceDirectory { var } if var == "REPRO_TEST_SOURCE_VAR_THAT_IS_NEVER_SET")
    );
}

#[test]
#[serial]
fn test_source_directory_from_environment() {
    let fakes = Fakes::new();
    let ws = Workspace::new();
    let var = "REPRO_TEST_V8_SRC";
    std::env::set_var(var, &ws.src);

    let mut v8 = SourceBuilder::new(
        testcase(),
        Definition::new(Project::V8, var),
        "d8",
        BuildOptions::default(),
        ws.dirs(),
        fakes.services(),
    );
    let source = v8.source_directory();
    let out = v8.out_dir_name();
    std::env::remove_var(var);

    assert_eq!(source.unwrap(), ws.src);
    assert_eq!(out.unwrap(), ws.out_dir(1234));
}

// ============================================================================
// Checkout
// ============================================================================

#[test]
fn test_download_build_data_reconciles_checkout() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    serve_sha(&fakes, "v8/v8", 5678, SHA);
    fakes.runner.respond_stdout("git rev-parse HEAD", "0000\n");

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    let state = v8.download_build_data().unwrap();

    assert_eq!(
        state,
        Some(CheckoutState::WrongRevision {
            current: "0000".to_string(),
            dirty: false
        })
    );
    assert_eq!(fakes.runner.count(&format!("git checkout {}", SHA)), 1);
}

#[test]
fn test_current_skips_checkout() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default().with_current(true),
    );
    assert_eq!(v8.download_build_data().unwrap(), None);
    assert!(fakes.runner.calls().is_empty());
    assert!(fakes.fetcher.calls().is_empty());
}

#[test]
fn test_declined_dirty_checkout_stops_build() {
    let ws = Workspace::new();
    let fakes = Fakes::with_confirmer(FakeConfirmer::answering(false));
    serve_sha(&fakes, "v8/v8", 5678, SHA);
    fakes.runner.respond_stdout("git rev-parse HEAD", "0000\n");
    fakes.runner.respond_stdout("git diff", "diff --git a/x b/x\n");

    let mut provider = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    let err = provider.binary_path().unwrap_err();

    assert!(matches!(err, BuildError::DirtyRepo { .. }));
    assert_eq!(fakes.runner.count("git checkout"), 0);
    assert_eq!(fakes.runner.count("ninja"), 0);
}

// ============================================================================
// Build steps per project and variant
// ============================================================================

#[test]
fn test_v8_build_steps() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC").with_sanitizer(Sanitizer::Asan),
        BuildOptions::default(),
    );
    v8.build_target_with(policy()).unwrap();

    let out = ws.out_dir(1234);
    assert_eq!(
        fakes.runner.command_lines(),
        vec![
            "gclient sync --no-history --shallow".to_string(),
            "gclient runhooks".to_string(),
            "python tools/clang/scripts/update.py".to_string(),
            format!("gn gen --check {}", out.display()),
            ninja_line(&out, "d8"),
        ]
    );
    assert!(fakes.runner.calls().iter().all(|spec| spec.cwd == ws.src));
    assert_eq!(
        fs::read_to_string(out.join("args.gn")).unwrap(),
        "is_asan = true\nis_debug = false\nuse_goma = false"
    );
}

#[test]
fn test_msan_x86_chromium_build_steps() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    let testcase = Testcase::new(1234, 5678)
        .with_gn_args(pinned("is_msan = true\nmsan_track_origins = 1"))
        .with_stacktrace_lines(["Running command: /b/chrome_build/chrome --no-sandbox"]);
    let definition = Definition::new(Project::Chromium, "CHROMIUM_SRC")
        .with_target("chromium_builder_asan")
        .with_sanitizer(Sanitizer::Msan)
        .with_arch(Arch::X86);

    let mut chromium = builder(&fakes, &ws, testcase, definition, BuildOptions::default());
    chromium.build_target_with(policy()).unwrap();

    let out = ws.out_dir(1234);
    assert_eq!(
        fakes.runner.command_lines(),
        vec![
            "gclient sync --no-history --shallow".to_string(),
            "gclient runhooks".to_string(),
            "build/install-build-deps.sh --lib32 --syms --no-prompt".to_string(),
            "python tools/clang/scripts/update.py".to_string(),
            format!("gn gen --check {}", out.display()),
            ninja_line(&out, "chromium_builder_asan"),
        ]
    );

    let hooks = &fakes.runner.calls()[1];
    assert_eq!(
        hooks.env.get("GYP_DEFINES").map(String::as_str),
        Some("msan=1 msan_track_origins=1 use_prebuilt_instrumented_libraries=1")
    );
    assert_eq!(chromium.binary_name(), "chrome");
}

#[test]
fn test_msan_hooks_default_origin_tracking() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC").with_sanitizer(Sanitizer::Msan),
        BuildOptions::default(),
    );
    v8.build_target_with(policy()).unwrap();

    let hooks = &fakes.runner.calls()[1];
    assert_eq!(
        hooks.env.get("GYP_DEFINES").map(String::as_str),
        Some("msan=1 msan_track_origins=2 use_prebuilt_instrumented_libraries=1")
    );
}

#[test]
fn test_cfi_chromium_fetches_gold_plugin_first() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    let definition = Definition::new(Project::Chromium, "CHROMIUM_SRC")
        .with_binary_name("chrome")
        .with_sanitizer(Sanitizer::Cfi);

    let mut chromium = builder(&fakes, &ws, testcase(), definition, BuildOptions::default());
    chromium.build_target_with(policy()).unwrap();

    let lines = fakes.runner.command_lines();
    assert_eq!(lines[2], "build/download_gold_plugin.py");
    assert_eq!(lines[3], "python tools/clang/scripts/update.py");
}

#[test]
fn test_pdfium_build_steps() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut pdfium = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::Pdfium, "PDFIUM_SRC").with_sanitizer(Sanitizer::Asan),
        BuildOptions::default(),
    );
    pdfium.build_target_with(policy()).unwrap();

    let out = ws.out_dir(1234);
    assert_eq!(
        fakes.runner.command_lines(),
        vec![
            "gclient sync --no-history --shallow".to_string(),
            format!("gn gen {}", out.display()),
            ninja_line(&out, "pdfium_test"),
        ]
    );
    let args = fs::read_to_string(out.join("args.gn")).unwrap();
    assert!(args.contains("pdf_is_standalone = true"));
}

#[test]
fn test_skip_deps() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default().with_skip_deps(true),
    );
    v8.build_target_with(policy()).unwrap();

    assert_eq!(fakes.runner.count("gclient"), 0);
    assert_eq!(fakes.runner.count("python"), 0);
    assert_eq!(fakes.runner.count("gn gen"), 1);
    assert_eq!(fakes.runner.count("ninja"), 1);
}

#[test]
fn test_failing_step_stops_the_build() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    fakes.runner.respond("gclient runhooks", CommandOutput::failed(2));

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    let err = v8.build_target_with(policy()).unwrap_err();

    match err {
        BuildError::ToolInvocation { command, cwd, .. } => {
            assert_eq!(command, "gclient runhooks");
            assert_eq!(cwd, ws.src);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fakes.runner.count("gn"), 0);
    assert_eq!(fakes.runner.count("ninja"), 0);
}

// ============================================================================
// gn args
// ============================================================================

#[test]
fn test_goma_and_debug_flags_reach_args_gn() {
    let ws = Workspace::new();
    let goma = TempDir::new().unwrap();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC").with_sanitizer(Sanitizer::Asan),
        BuildOptions::default()
            .with_goma_dir(Some(goma.path().to_path_buf()))
            .with_enable_debug(true),
    );
    v8.build_target_with(policy()).unwrap();

    let args = GnArgs::read_from(&ws.out_dir(1234).join("args.gn")).unwrap();
    assert_eq!(args.get("use_goma"), Some("true"));
    assert_eq!(
        args.get("goma_dir"),
        Some(format!("\"{}\"", goma.path().display()).as_str())
    );
    assert_eq!(args.get("is_debug"), Some("true"));
    assert_eq!(args.get("symbol_level"), Some("2"));
}

#[test]
fn test_missing_goma_dir_fails_before_any_step() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default().with_goma_dir(Some(ws.src.join("no-goma-here"))),
    );
    let err = v8.build_target_with(policy()).unwrap_err();

    assert!(matches!(err, BuildError::GomaNotInstalled { .. }));
    assert_eq!(err.exit_code(), 46);
    assert!(fakes.runner.calls().is_empty());
}

#[test]
fn test_edited_args_become_the_memoized_set() {
    let ws = Workspace::new();
    let fakes = Fakes::new().with_editor(RecordingEditor::replacing_with("is_debug = true\nv8_enable_slow_dchecks = true"));

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default().with_edit_mode(true),
    );
    v8.gn_gen().unwrap();

    assert_eq!(
        fakes.editor.calls(),
        vec![(
            "is_asan = true\nis_debug = false\nuse_goma = false".to_string(),
            true
        )]
    );
    assert_eq!(
        fs::read_to_string(ws.out_dir(1234).join("args.gn")).unwrap(),
        "is_debug = true\nv8_enable_slow_dchecks = true"
    );
    let args = v8.gn_args().unwrap();
    assert_eq!(args.get("v8_enable_slow_dchecks"), Some("true"));
    assert_eq!(args.get("is_asan"), None);
}

#[test]
fn test_editor_is_consulted_even_without_edit_mode() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    v8.gn_gen().unwrap();

    let calls = fakes.editor.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].1);
}

#[test]
fn test_args_read_from_prebuilt_build_when_not_pinned() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    let prebuilt = ws.dirs().testcase_build_dir(1234);
    fs::create_dir_all(&prebuilt).unwrap();
    fs::write(prebuilt.join("args.gn"), "is_msan = true\nis_debug = false\n").unwrap();

    let mut v8 = builder(
        &fakes,
        &ws,
        Testcase::new(1234, 5678),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    let args = v8.gn_args().unwrap();

    assert_eq!(args.get("is_msan"), Some("true"));
    assert!(fakes.runner.calls().is_empty());
}

#[test]
fn test_no_args_source_is_an_error() {
    let ws = Workspace::new();
    let fakes = Fakes::new();

    let mut v8 = builder(
        &fakes,
        &ws,
        Testcase::new(1234, 5678),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default(),
    );
    let err = v8.gn_args().unwrap_err();
    assert!(matches!(err, BuildError::ArtifactUnavailable { .. }));
}

// ============================================================================
// Third-party sweep
// ============================================================================

#[test]
fn test_clean_third_party_runs_first() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    fs::create_dir_all(ws.src.join("third_party/icu/.git")).unwrap();

    let mut v8 = builder(
        &fakes,
        &ws,
        testcase(),
        Definition::new(Project::V8, "V8_SRC"),
        BuildOptions::default()
            .with_clean_third_party(true)
            .with_skip_deps(true),
    );
    v8.build_target_with(policy()).unwrap();

    let calls = fakes.runner.calls();
    assert_eq!(calls[0].command_line(), "git checkout -f HEAD");
    assert_eq!(calls[0].cwd, ws.src.join("third_party/icu"));
    assert_eq!(calls[1].command_line(), "git clean -ffddx");
}

// ============================================================================
// End to end through Provider
// ============================================================================

#[test]
fn test_provider_builds_once() {
    let ws = Workspace::new();
    let fakes = Fakes::new();
    serve_sha(&fakes, "v8/v8", 5678, SHA);
    fakes
        .runner
        .respond_stdout("git rev-parse HEAD", &format!("{}\n", SHA));

    let testcase = testcase();
    let definition = Definition::new(Project::V8, "V8_SRC");
    let options = BuildOptions::default()
        .with_goma_threads(Some(16))
        .with_goma_load(Some(3));
    let services = fakes.services();
    let builder = SourceBuilder::new(
        testcase,
        definition,
        "d8",
        options,
        ws.dirs(),
        services,
    )
    .with_source_directory(&ws.src);
    let mut provider = Provider::Source(Box::new(builder));

    let out = ws.out_dir(1234);
    assert_eq!(provider.binary_path().unwrap(), out.join("d8"));
    let commands = fakes.runner.command_lines();
    assert_eq!(commands[0], "git rev-parse HEAD");
    assert_eq!(
        commands.last().unwrap(),
        &format!("ninja -w dupbuild=err -C {} -j 16 -l 3 d8", out.display())
    );

    assert_eq!(provider.binary_path().unwrap(), out.join("d8"));
    assert_eq!(fakes.runner.command_lines().len(), commands.len());
    assert_eq!(fakes.fetcher.calls().len(), 1);
}
