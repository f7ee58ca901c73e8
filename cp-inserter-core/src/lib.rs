//! cp-inserter core library - entry/exit checkpoint insertion for C and C++

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Each file is processed independently; a failure never leaks into another file
// - No global mutable state; configuration is read-only for the whole run
// - Edit offsets always refer to the original buffer
// - Bytes outside insertion points are never modified
// - Identical input yields byte-for-byte identical output

pub mod compile_db;
pub mod config;
pub mod error;
pub mod language;
pub mod matcher;
pub mod patcher;
pub mod planner;
pub mod report;
pub mod sink;
pub mod targets;

pub use compile_db::{CompilationDatabase, CompileFlags};
pub use config::{CliOverrides, InstrumentConfig};
pub use error::InstrumentError;
pub use report::{render_json, render_text, BatchSummary, FileReport};
pub use sink::{OutputMode, WriteStatus};
pub use targets::TargetSet;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rayon::prelude::*;

use language::{CFamilyParser, FrontEnd, Language};
use patcher::SourceBuffer;
use report::EditRecord;

/// Result of running the pipeline on one file
#[derive(Debug, Clone)]
pub struct Instrumented {
    pub report: FileReport,
    /// Patched bytes (equal to the input when nothing matched)
    pub output: Vec<u8>,
    /// Set when the file was handled in place
    pub written: Option<WriteStatus>,
}

/// A file and what happened to it
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<Instrumented, InstrumentError>,
}

/// Runs the parse → match → plan → patch → write pipeline
pub struct Instrumenter {
    config: InstrumentConfig,
    front_end: Box<dyn FrontEnd>,
    compile_db: Option<CompilationDatabase>,
    extra_flags: Vec<String>,
}

impl Instrumenter {
    /// Instrumenter backed by the tree-sitter C/C++ front-end
    pub fn new(config: InstrumentConfig) -> Result<Self> {
        let front_end = CFamilyParser::new()?.with_timeout(config.parse_timeout);
        Ok(Self::with_front_end(config, Box::new(front_end)))
    }

    /// Instrumenter backed by any front-end
    pub fn with_front_end(config: InstrumentConfig, front_end: Box<dyn FrontEnd>) -> Self {
        Instrumenter {
            config,
            front_end,
            compile_db: None,
            extra_flags: Vec::new(),
        }
    }

    /// Look up per-file flags in a compilation database
    pub fn with_compile_db(mut self, db: CompilationDatabase) -> Self {
        self.compile_db = Some(db);
        self
    }

    /// Flags appended to every file's flags
    pub fn with_extra_flags(mut self, flags: Vec<String>) -> Self {
        self.extra_flags = flags;
        self
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    fn flags_for(&self, path: &Path) -> CompileFlags {
        let base = self
            .compile_db
            .as_ref()
            .and_then(|db| db.flags_for(path))
            .cloned()
            .unwrap_or_default();
        base.with_extra(&self.extra_flags)
    }

    /// Instrument an in-memory buffer; never touches the filesystem
    pub fn instrument_source(
        &self,
        path: &Path,
        source: &[u8],
    ) -> Result<Instrumented, InstrumentError> {
        let flags = self.flags_for(path);
        let unit = self.front_end.parse(path, source, &flags)?;

        if let Some(first) = unit.syntax_errors().first() {
            if self.config.strict {
                return Err(InstrumentError::Parse {
                    path: path.to_path_buf(),
                    message: format!(
                        "syntax error at line {}, column {}",
                        first.start_line,
                        first.start_col + 1
                    ),
                });
            }
            tracing::warn!(
                "{}: {} syntax error(s), first at line {}; instrumenting the recovered tree",
                path.display(),
                unit.syntax_errors().len(),
                first.start_line
            );
        }

        let discovery = matcher::discover(&unit);
        let matches = discovery.select(&self.config.targets);
        let planned = planner::plan_edits(&matches, &self.config.template);

        let mut buffer = SourceBuffer::new(source);
        for p in &planned {
            buffer.insert(p.edit.clone());
        }
        let output = buffer
            .render()
            .map_err(|source| InstrumentError::OutOfRangeEdit {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(
            "{}: {} function(s), {} return(s) matched",
            path.display(),
            matches.functions.len(),
            matches.returns.len()
        );

        let report = FileReport {
            file: path.display().to_string(),
            language: unit.language.name().to_string(),
            changed: output != source,
            edits: planned.iter().map(EditRecord::from).collect(),
        };
        Ok(Instrumented {
            report,
            output,
            written: None,
        })
    }

    /// Read, instrument, and (in place mode) write back one file
    pub fn process_file(&self, path: &Path) -> Result<Instrumented, InstrumentError> {
        let source =
            std::fs::read(path).map_err(|e| InstrumentError::io(path, "failed to read", e))?;
        let mut instrumented = self.instrument_source(path, &source)?;

        if self.config.output == OutputMode::InPlace {
            let status = sink::write_in_place(path, &source, &instrumented.output)?;
            instrumented.written = Some(status);
        }
        Ok(instrumented)
    }

    /// Process every file, in parallel, returning outcomes in input order
    pub fn run(&self, paths: &[PathBuf]) -> Vec<FileOutcome> {
        self.run_with_progress(paths, |_| {})
    }

    /// Like [`Instrumenter::run`], calling `on_done` as each file finishes
    pub fn run_with_progress<F>(&self, paths: &[PathBuf], on_done: F) -> Vec<FileOutcome>
    where
        F: Fn(&FileOutcome) + Sync,
    {
        paths
            .par_iter()
            .map(|path| FileOutcome {
                path: path.clone(),
                result: self.process_file(path),
            })
            .inspect(&on_done)
            .collect()
    }
}

/// Totals over a finished batch
pub fn summarize(outcomes: &[FileOutcome]) -> BatchSummary {
    let mut summary = BatchSummary {
        files: outcomes.len(),
        ..Default::default()
    };
    for outcome in outcomes {
        match &outcome.result {
            Ok(instrumented) => {
                if instrumented.report.changed {
                    summary.changed += 1;
                }
                summary.edits += instrumented.report.edits.len();
            }
            Err(_) => summary.failed += 1,
        }
    }
    summary
}

/// Check if a file name has a C or C++ extension
fn is_supported_source_file(path: &Path) -> bool {
    Language::from_path(path).is_some()
}

/// Files to process, plus the paths the directory walk could not read
#[derive(Debug, Default)]
pub struct SourceFiles {
    pub files: Vec<PathBuf>,
    pub failures: Vec<FileOutcome>,
}

impl SourceFiles {
    fn fail(&mut self, path: &Path, action: &'static str, source: std::io::Error) {
        self.failures.push(FileOutcome {
            path: path.to_path_buf(),
            result: Err(InstrumentError::io(path, action, source)),
        });
    }
}

/// Expand the given paths into the list of files to process
///
/// Files given explicitly are kept as-is, whatever their extension, so that
/// a missing or unreadable file is reported for that file. Directories are
/// walked recursively in sorted order, keeping C/C++ sources that are not
/// excluded by the configuration. A file reached more than once is kept at
/// its first position. Unreadable directories and entries become failures
/// and the walk carries on.
pub fn collect_source_files(paths: &[PathBuf], config: &InstrumentConfig) -> SourceFiles {
    let mut collected = SourceFiles::default();
    let mut seen = HashSet::new();
    for path in paths {
        let candidates = if path.is_dir() {
            let mut walked = SourceFiles::default();
            collect_source_files_recursive(path, config, &mut walked);
            // Sort files for deterministic order
            walked.files.sort();
            collected.failures.extend(walked.failures);
            walked.files
        } else {
            vec![path.clone()]
        };
        for file in candidates {
            if seen.insert(dedup_key(&file)) {
                collected.files.push(file);
            }
        }
    }
    collected
}

/// Normalized absolute form used to spot the same file under two spellings
fn dedup_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    compile_db::normalize(&absolute)
}

/// Returns true for directory names that should not be traversed
fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.')
        || name == "build"
        || name == "out"
        || name == "target"
        || name == "node_modules"
}

/// Process one directory entry, pushing source files or recursing into dirs
fn process_dir_entry(
    path: PathBuf,
    metadata: std::fs::Metadata,
    config: &InstrumentConfig,
    found: &mut SourceFiles,
) {
    if metadata.is_symlink() {
        return;
    }

    if metadata.is_dir() {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if is_skipped_dir(name) {
                return;
            }
        }
        collect_source_files_recursive(&path, config, found);
    } else if metadata.is_file() && is_supported_source_file(&path) && !config.is_excluded(&path)
    {
        found.files.push(path);
    }
}

/// Recursively collect supported source files from a directory
fn collect_source_files_recursive(dir: &Path, config: &InstrumentConfig, found: &mut SourceFiles) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            found.fail(dir, "failed to read directory", e);
            return;
        }
    };
    for entry_result in entries {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                found.fail(dir, "failed to read directory entry in", e);
                continue;
            }
        };
        let path = entry.path();
        match std::fs::symlink_metadata(&path) {
            Ok(metadata) => process_dir_entry(path, metadata, config, found),
            Err(e) => found.fail(&path, "failed to stat", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(targets: &str) -> InstrumentConfig {
        InstrumentConfig::new(TargetSet::parse(targets))
    }

    #[test]
    fn test_instrument_source_simple() {
        let instrumenter = Instrumenter::new(config("f")).unwrap();
        let out = instrumenter
            .instrument_source(Path::new("f.c"), b"int f(void) {\n    return 1;\n}\n")
            .unwrap();
        assert_eq!(
            String::from_utf8(out.output).unwrap(),
            "int f(void) {\n    cp(\"entry\", NULL, 0);\n    cp(\"exit\", NULL, 0);\n    return 1;\n}\n"
        );
        assert!(out.report.changed);
        assert_eq!(out.report.edits.len(), 2);
        assert_eq!(out.report.language, "C");
        assert!(out.written.is_none());
    }

    #[test]
    fn test_strict_mode_rejects_syntax_errors() {
        let mut cfg = config("f");
        cfg.strict = true;
        let instrumenter = Instrumenter::new(cfg).unwrap();
        let err = instrumenter
            .instrument_source(Path::new("bad.c"), b"int f( { return 1; }}}")
            .unwrap_err();
        assert!(matches!(err, InstrumentError::Parse { .. }));
    }

    #[test]
    fn test_lenient_mode_keeps_going() {
        let instrumenter = Instrumenter::new(config("g")).unwrap();
        let result = instrumenter.instrument_source(
            Path::new("bad.c"),
            b"int f( { oops }}}\nint g(void) { return 2; }\n",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_extra_flags_pick_language() {
        let instrumenter = Instrumenter::new(config("f"))
            .unwrap()
            .with_extra_flags(vec!["-x".to_string(), "c++".to_string()]);
        let out = instrumenter
            .instrument_source(Path::new("f.h"), b"int f() { return 0; }")
            .unwrap();
        assert_eq!(out.report.language, "C++");
    }

    #[test]
    fn test_summarize() {
        let instrumenter = Instrumenter::new(config("f")).unwrap();
        let ok = instrumenter
            .instrument_source(Path::new("f.c"), b"void f(void) {}")
            .unwrap();
        let outcomes = vec![
            FileOutcome {
                path: PathBuf::from("f.c"),
                result: Ok(ok),
            },
            FileOutcome {
                path: PathBuf::from("missing.c"),
                result: Err(InstrumentError::io(
                    "missing.c",
                    "failed to read",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
                )),
            },
        ];
        let summary = summarize(&outcomes);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.edits, 1);
    }

    #[test]
    fn test_collect_source_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/vendor")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("build")).unwrap();
        std::fs::write(root.join("src/b.c"), "").unwrap();
        std::fs::write(root.join("src/a.cpp"), "").unwrap();
        std::fs::write(root.join("src/notes.txt"), "").unwrap();
        std::fs::write(root.join("src/vendor/v.c"), "").unwrap();
        std::fs::write(root.join(".git/x.c"), "").unwrap();
        std::fs::write(root.join("build/gen.c"), "").unwrap();

        let mut cfg = config("f");
        let mut builder = globset::GlobSetBuilder::new();
        builder.add(globset::Glob::new("**/vendor/**").unwrap());
        cfg.exclude = Some(builder.build().unwrap());

        let explicit = root.join("src/notes.txt");
        let collected = collect_source_files(&[root.to_path_buf(), explicit.clone()], &cfg);
        assert!(collected.failures.is_empty());
        assert_eq!(
            collected.files,
            vec![root.join("src/a.cpp"), root.join("src/b.c"), explicit]
        );
    }

    #[test]
    fn test_collect_source_files_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/a.c"), "").unwrap();
        std::fs::write(root.join("src/b.c"), "").unwrap();

        let paths = vec![
            root.join("src/b.c"),
            root.to_path_buf(),
            root.join("src/./a.c"),
            root.join("src/../src/b.c"),
        ];
        let collected = collect_source_files(&paths, &config("f"));
        assert_eq!(
            collected.files,
            vec![root.join("src/b.c"), root.join("src/a.c")]
        );
    }

    #[test]
    fn test_in_place_batch_with_overlapping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.c");
        std::fs::write(&file, "void f(void) {
}
").unwrap();

        let mut cfg = config("f");
        cfg.output = OutputMode::InPlace;
        let collected = collect_source_files(&[dir.path().to_path_buf(), file.clone()], &cfg);
        let outcomes = Instrumenter::new(cfg).unwrap().run(&collected.files);

        assert_eq!(outcomes.len(), 1);
        let patched = std::fs::read_to_string(&file).unwrap();
        assert_eq!(patched.matches("cp(\"entry\"").count(), 1);
    }

    #[test]
    fn test_walk_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let mut found = SourceFiles::default();
        collect_source_files_recursive(&missing, &config("f"), &mut found);

        assert!(found.files.is_empty());
        assert_eq!(found.failures.len(), 1);
        assert_eq!(found.failures[0].path, missing);
        assert!(matches!(
            found.failures[0].result,
            Err(InstrumentError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_does_not_stop_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let locked = root.join("locked");
        std::fs::create_dir_all(&locked).unwrap();
        std::fs::write(locked.join("hidden.c"), "").unwrap();
        std::fs::write(root.join("open.c"), "").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind privileged users
        let enforced = std::fs::read_dir(&locked).is_err();
        let collected = collect_source_files(&[root.to_path_buf()], &config("f"));
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if !enforced {
            return;
        }

        assert_eq!(collected.files, vec![root.join("open.c")]);
        assert_eq!(collected.failures.len(), 1);
        assert_eq!(collected.failures[0].path, locked);
        assert_eq!(summarize(&collected.failures).failed, 1);
    }
}
