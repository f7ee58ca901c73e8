//! Integration tests for the instrumentation pipeline

use cp_inserter_core::config::{self, CliOverrides};
use cp_inserter_core::planner::EditKind;
use cp_inserter_core::{
    summarize, CompilationDatabase, InstrumentConfig, InstrumentError, Instrumenter, OutputMode,
    TargetSet, WriteStatus,
};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn instrumenter(targets: &str) -> Instrumenter {
    Instrumenter::new(InstrumentConfig::new(TargetSet::parse(targets))).unwrap()
}

fn count(haystack: &[u8], needle: &str) -> usize {
    String::from_utf8_lossy(haystack).matches(needle).count()
}

#[test]
fn test_early_and_trailing_returns() {
    let path = fixture_path("c/reverse.c");
    let result = instrumenter("reverse").process_file(&path).unwrap();

    let original = fs::read(&path).unwrap();
    assert_eq!(count(&result.output, "cp(\"entry\", NULL, 0);"), 1);
    assert_eq!(count(&result.output, "cp(\"exit\", NULL, 0);"), 2);

    let kinds: Vec<EditKind> = result.report.edits.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EditKind::Entry, EditKind::Exit, EditKind::Exit]);

    let positions: Vec<(u32, u32)> = result
        .report
        .edits
        .iter()
        .map(|e| (e.line, e.column))
        .collect();
    assert_eq!(positions, vec![(4, 24), (6, 8), (14, 4)]);

    // Exactly the inserted text was added
    let inserted = "\n    cp(\"entry\", NULL, 0);".len() + 2 * "cp(\"exit\", NULL, 0);\n    ".len();
    assert_eq!(result.output.len(), original.len() + inserted);
}

#[test]
fn test_non_target_functions_untouched() {
    let path = fixture_path("c/reverse.c");
    let original = fs::read_to_string(&path).unwrap();
    let result = instrumenter("reverse").process_file(&path).unwrap();

    let main_start = original.find("int main(void)").unwrap();
    let output = String::from_utf8(result.output).unwrap();
    assert!(output.ends_with(&original[main_start..]));
    assert!(output.starts_with(&original[..original.find('{').unwrap() + 1]));
}

#[test]
fn test_missing_target_is_identity() {
    let path = fixture_path("c/reverse.c");
    let result = instrumenter("missing").process_file(&path).unwrap();

    assert_eq!(result.output, fs::read(&path).unwrap());
    assert!(!result.report.changed);
    assert!(result.report.edits.is_empty());
}

#[test]
fn test_constructors_never_match_class_name() {
    let source = b"struct Shape { Shape(int w) : w_(w) {} int w_; };\nShape::Shape() { }\n";
    let result = instrumenter("Shape")
        .instrument_source(Path::new("s.cpp"), source)
        .unwrap();

    assert_eq!(result.output, source.to_vec());
    assert!(result.report.edits.is_empty());

    let shapes = fixture_path("cpp/shapes.cpp");
    let output = instrumenter("Shape").process_file(&shapes).unwrap().output;
    assert_eq!(output, fs::read(&shapes).unwrap());
}

#[test]
fn test_trailing_comma_adds_empty_name() {
    let targets = TargetSet::parse("f1,f2,");
    assert_eq!(targets.len(), 3);
    assert!(targets.contains(""));

    // The empty name never matches an unnamed lambda
    let path = fixture_path("cpp/shapes.cpp");
    let with_comma = instrumenter("count_positive,").process_file(&path).unwrap();
    let without = instrumenter("count_positive").process_file(&path).unwrap();
    assert_eq!(with_comma.output, without.output);
}

#[test]
fn test_read_only_file_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reverse.c");
    fs::copy(fixture_path("c/reverse.c"), &path).unwrap();
    let original = fs::read(&path).unwrap();

    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&path, perms).unwrap();

    let mut config = InstrumentConfig::new(TargetSet::parse("reverse"));
    config.output = OutputMode::InPlace;
    let err = Instrumenter::new(config)
        .unwrap()
        .process_file(&path)
        .unwrap_err();

    assert!(matches!(err, InstrumentError::Io { .. }));
    assert_eq!(fs::read(&path).unwrap(), original);

    let mut perms = fs::metadata(&path).unwrap().permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(&path, perms).unwrap();
}

#[test]
fn test_in_place_rewrites_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.c");
    fs::copy(fixture_path("c/counter.c"), &path).unwrap();

    let mut config = InstrumentConfig::new(TargetSet::parse("bump,read_hits"));
    config.output = OutputMode::InPlace;
    let result = Instrumenter::new(config).unwrap().process_file(&path).unwrap();
    assert_eq!(result.written, Some(WriteStatus::Written));

    let on_disk = fs::read(&path).unwrap();
    assert_eq!(on_disk, result.output);
    // The prototype of read_hits has no body
    assert_eq!(count(&on_disk, "cp(\"entry\""), 2);
    assert_eq!(count(&on_disk, "cp(\"exit\""), 1);

    let mut config = InstrumentConfig::new(TargetSet::parse("nothing"));
    config.output = OutputMode::InPlace;
    let again = Instrumenter::new(config).unwrap().process_file(&path).unwrap();
    assert_eq!(again.written, Some(WriteStatus::Unchanged));
}

#[test]
fn test_second_pass_instruments_again() {
    let path = fixture_path("c/counter.c");
    let instrumenter = instrumenter("read_hits");
    let first = instrumenter.process_file(&path).unwrap();
    let second = instrumenter
        .instrument_source(&path, &first.output)
        .unwrap();

    assert_ne!(first.output, second.output);
    assert_eq!(count(&second.output, "cp(\"entry\""), 2);
    assert_eq!(count(&second.output, "cp(\"exit\""), 2);
}

#[test]
fn test_batch_isolates_failures() {
    let paths = vec![
        fixture_path("c/reverse.c"),
        fixture_path("c/does-not-exist.c"),
        fixture_path("c/counter.c"),
    ];
    let outcomes = instrumenter("reverse,bump").run(&paths);

    assert_eq!(outcomes.len(), 3);
    for (outcome, path) in outcomes.iter().zip(&paths) {
        assert_eq!(&outcome.path, path);
    }
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(InstrumentError::Io { .. })
    ));
    assert!(outcomes[2].result.is_ok());

    let summary = summarize(&outcomes);
    assert_eq!(summary.files, 3);
    assert_eq!(summary.changed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.edits, 4);
}

#[test]
fn test_strict_mode_fails_only_broken_file() {
    let mut config = InstrumentConfig::new(TargetSet::parse("ok,bump"));
    config.strict = true;
    let instrumenter = Instrumenter::new(config).unwrap();

    let outcomes = instrumenter.run(&[fixture_path("c/broken.c"), fixture_path("c/counter.c")]);
    assert!(matches!(
        outcomes[0].result,
        Err(InstrumentError::Parse { .. })
    ));
    assert!(outcomes[1].result.is_ok());
}

#[test]
fn test_lenient_mode_accepts_broken_file() {
    let result = instrumenter("ok").process_file(&fixture_path("c/broken.c"));
    assert!(result.is_ok());
}

#[test]
fn test_compile_db_selects_language() {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("api.h");
    fs::write(&header, "int f() { return 0; }\n").unwrap();

    let entries = serde_json::json!([{
        "directory": dir.path(),
        "file": "api.h",
        "arguments": ["clang++", "-std=c++17", "-c", "api.h"],
    }]);
    fs::write(
        dir.path().join("compile_commands.json"),
        serde_json::to_string(&entries).unwrap(),
    )
    .unwrap();

    let db = CompilationDatabase::load(dir.path()).unwrap();
    let result = instrumenter("f")
        .with_compile_db(db)
        .process_file(&header)
        .unwrap();
    assert_eq!(result.report.language, "C++");

    let plain = instrumenter("f").process_file(&header).unwrap();
    assert_eq!(plain.report.language, "C");
}

#[test]
fn test_config_file_symbol() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(".cp-inserter.json"),
        r#"{ "functions": ["bump"], "cp_symbol": "trace_point" }"#,
    )
    .unwrap();

    let config = config::load_and_resolve(dir.path(), None, &CliOverrides::default()).unwrap();
    assert_eq!(
        config.config_path.as_deref(),
        Some(dir.path().join(".cp-inserter.json").as_path())
    );

    let result = Instrumenter::new(config)
        .unwrap()
        .process_file(&fixture_path("c/counter.c"))
        .unwrap();
    assert_eq!(count(&result.output, "trace_point(\"entry\", NULL, 0);"), 1);
}

#[test]
fn test_all_fixtures_deterministic() {
    let root = fixture_path("");
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .filter(|p| is_c_family(p))
        .collect();
    files.sort();
    assert!(files.len() >= 4);

    let targeted = instrumenter("reverse,bump,area,count_positive,ok,broken");
    let first = targeted.run(&files);
    let second = targeted.run(&files);
    for (a, b) in first.iter().zip(&second) {
        let a = a.result.as_ref().unwrap();
        let b = b.result.as_ref().unwrap();
        assert_eq!(a.output, b.output);
    }

    // Nothing targeted means nothing changes
    let untouched = instrumenter("no_such_function").run(&files);
    for (outcome, path) in untouched.iter().zip(&files) {
        let result = outcome.result.as_ref().unwrap();
        assert_eq!(result.output, fs::read(path).unwrap());
    }
}

fn is_c_family(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("c" | "cpp")
    )
}
