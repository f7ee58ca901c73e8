//! Compiler flags and compilation database support
//!
//! Flags are only consulted to pick the grammar (C or C++). Include paths
//! and macro definitions are passed through untouched; nothing here
//! resolves them.
//!
//! The database is the standard `compile_commands.json` produced by CMake,
//! Bear, Meson and friends.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::language::Language;

/// Compiler invocation for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileFlags {
    /// Compiler driver (`cc`, `clang++`, ...), when known
    pub driver: Option<String>,
    pub args: Vec<String>,
}

impl CompileFlags {
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CompileFlags {
            driver: None,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a full command line into driver and arguments
    pub fn from_command_line(argv: Vec<String>) -> Self {
        let mut argv = argv.into_iter();
        CompileFlags {
            driver: argv.next(),
            args: argv.collect(),
        }
    }

    /// Return a copy with `extra` appended
    pub fn with_extra(&self, extra: &[String]) -> Self {
        let mut flags = self.clone();
        flags.args.extend(extra.iter().cloned());
        flags
    }

    /// Language implied by the flags
    ///
    /// Precedence: the last `-x`, then the last `-std=`, then the driver
    /// name. `-x none` (or any non C-family language) clears an earlier `-x`.
    pub fn language_hint(&self) -> Option<Language> {
        let mut x_hint = None;
        let mut std_hint = None;
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            let explicit = if arg == "-x" {
                args.next().map(String::as_str)
            } else {
                arg.strip_prefix("-x").filter(|rest| !rest.is_empty())
            };
            if let Some(lang) = explicit {
                x_hint = language_from_x(lang);
                continue;
            }
            if let Some(std) = arg.strip_prefix("-std=").or_else(|| arg.strip_prefix("--std=")) {
                std_hint = Some(if std.contains("++") {
                    Language::Cpp
                } else {
                    Language::C
                });
            }
        }
        x_hint
            .or(std_hint)
            .or_else(|| self.driver.as_deref().and_then(language_from_driver))
    }
}

fn language_from_x(value: &str) -> Option<Language> {
    match value {
        "c" | "c-header" | "cpp-output" => Some(Language::C),
        "c++" | "c++-header" | "c++-cpp-output" => Some(Language::Cpp),
        _ => None,
    }
}

fn language_from_driver(driver: &str) -> Option<Language> {
    let name = Path::new(driver).file_name()?.to_str()?;
    // Strip version and target suffixes: clang++-17, x86_64-linux-gnu-g++-12
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.' || c == '-');
    stem.ends_with("++").then_some(Language::Cpp)
}

/// One entry of `compile_commands.json`
#[derive(Debug, Clone, Deserialize)]
pub struct CompileCommand {
    pub directory: PathBuf,
    pub file: PathBuf,
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    #[serde(default)]
    pub command: Option<String>,
}

impl CompileCommand {
    fn flags(&self) -> CompileFlags {
        let argv = match (&self.arguments, &self.command) {
            (Some(arguments), _) => arguments.clone(),
            (None, Some(command)) => split_command(command),
            (None, None) => Vec::new(),
        };
        CompileFlags::from_command_line(argv)
    }

    fn absolute_file(&self) -> PathBuf {
        normalize(&self.directory.join(&self.file))
    }
}

/// Flags per source file, keyed by normalized absolute path
#[derive(Debug, Clone, Default)]
pub struct CompilationDatabase {
    entries: HashMap<PathBuf, CompileFlags>,
}

impl CompilationDatabase {
    /// Load `compile_commands.json` from a build directory
    pub fn load(build_dir: &Path) -> Result<Self> {
        let path = build_dir.join("compile_commands.json");
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read compilation database: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse compilation database: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let commands: Vec<CompileCommand> = serde_json::from_str(content)?;
        let mut entries = HashMap::new();
        for command in commands {
            // First entry wins when a file is listed more than once
            entries
                .entry(command.absolute_file())
                .or_insert_with(|| command.flags());
        }
        Ok(CompilationDatabase { entries })
    }

    /// Flags recorded for `path`, if any
    pub fn flags_for(&self, path: &Path) -> Option<&CompileFlags> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().ok()?.join(path)
        };
        self.entries.get(&normalize(&absolute))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Split a shell command line on whitespace, honouring quotes and backslashes
pub fn split_command(command: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_token = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        args.push(current);
    }
    args
}
