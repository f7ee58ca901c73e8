//! Configuration file support
//!
//! Loads project-specific settings from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.cp-inserter.json` in the project root
//! 3. `cp-inserter.config.json` in the project root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::planner::CheckpointTemplate;
use crate::sink::OutputMode;
use crate::targets::TargetSet;

/// Checkpoint symbol used when neither the CLI nor a config file sets one
pub const DEFAULT_CP_SYMBOL: &str = "cp";

/// Settings loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CpInserterConfig {
    /// Functions to instrument, one name per item
    #[serde(default)]
    pub functions: Option<Vec<String>>,

    /// Name of the checkpoint function to call (default: cp)
    #[serde(default)]
    pub cp_symbol: Option<String>,

    /// Rewrite files in place instead of printing them
    #[serde(default)]
    pub in_place: Option<bool>,

    /// Treat recovered syntax errors as parse failures
    #[serde(default)]
    pub strict: Option<bool>,

    /// Per-file parse time limit in milliseconds
    #[serde(default)]
    pub parse_timeout_ms: Option<u64>,

    /// Glob patterns for files to skip during directory discovery
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Values given on the command line; `None`/`false` defer to the file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Raw comma-separated `--functions` value
    pub functions: Option<String>,
    pub cp_symbol: Option<String>,
    pub in_place: bool,
    pub strict: bool,
    pub parse_timeout_ms: Option<u64>,
}

/// Immutable run configuration threaded through every stage
#[derive(Debug, Clone)]
pub struct InstrumentConfig {
    pub targets: TargetSet,
    pub template: CheckpointTemplate,
    pub output: OutputMode,
    pub strict: bool,
    pub parse_timeout: Option<Duration>,
    /// Compiled exclude patterns (None means exclude nothing)
    pub exclude: Option<GlobSet>,
    /// Path the config was loaded from (None if no file was used)
    pub config_path: Option<PathBuf>,
}

impl InstrumentConfig {
    /// Configuration for the given targets with every other setting at its default
    pub fn new(targets: TargetSet) -> Self {
        InstrumentConfig {
            targets,
            template: CheckpointTemplate::default(),
            output: OutputMode::Stream,
            strict: false,
            parse_timeout: None,
            exclude: None,
            config_path: None,
        }
    }

    /// Check if a discovered file should be skipped
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|set| set.is_match(path.to_string_lossy().as_ref()))
    }
}

/// Whether `symbol` can be emitted as a call target (`cp`, `trace::hit`)
pub fn is_valid_symbol(symbol: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(::)?[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(symbol))
}

impl CpInserterConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(symbol) = &self.cp_symbol {
            if !is_valid_symbol(symbol) {
                anyhow::bail!("cp_symbol must be a C/C++ identifier (got {:?})", symbol);
            }
        }

        if let Some(functions) = &self.functions {
            if functions.is_empty() {
                anyhow::bail!("functions must list at least one name");
            }
        }

        if self.parse_timeout_ms == Some(0) {
            anyhow::bail!("parse_timeout_ms must be positive");
        }

        // Validate glob patterns compile
        for pattern in &self.exclude {
            Glob::new(pattern).with_context(|| format!("invalid exclude pattern: {}", pattern))?;
        }

        Ok(())
    }

    /// Merge with CLI overrides into the run configuration
    pub fn resolve(&self, cli: &CliOverrides) -> Result<InstrumentConfig> {
        self.validate()?;

        let targets = match (&cli.functions, &self.functions) {
            (Some(list), _) => TargetSet::parse(list),
            (None, Some(names)) => TargetSet::from_names(names.iter().cloned()),
            (None, None) => anyhow::bail!(
                "no target functions given (use --functions or set \"functions\" in the config file)"
            ),
        };

        let symbol = cli
            .cp_symbol
            .clone()
            .or_else(|| self.cp_symbol.clone())
            .unwrap_or_else(|| DEFAULT_CP_SYMBOL.to_string());
        if !is_valid_symbol(&symbol) {
            anyhow::bail!("--cp-symbol must be a C/C++ identifier (got {:?})", symbol);
        }

        let output = if cli.in_place || self.in_place.unwrap_or(false) {
            OutputMode::InPlace
        } else {
            OutputMode::Stream
        };

        let timeout_ms = cli.parse_timeout_ms.or(self.parse_timeout_ms);
        if timeout_ms == Some(0) {
            anyhow::bail!("--parse-timeout-ms must be positive");
        }

        let exclude = if self.exclude.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &self.exclude {
                builder.add(Glob::new(pattern)?);
            }
            Some(builder.build()?)
        };

        Ok(InstrumentConfig {
            targets,
            template: CheckpointTemplate::new(symbol),
            output,
            strict: cli.strict || self.strict.unwrap_or(false),
            parse_timeout: timeout_ms.map(Duration::from_millis),
            exclude,
            config_path: None,
        })
    }
}

/// Discover and load a config file from the project root
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(CpInserterConfig, PathBuf)>> {
    for name in [".cp-inserter.json", "cp-inserter.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<CpInserterConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: CpInserterConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load the config (explicit path or discovered) and merge CLI overrides
pub fn load_and_resolve(
    project_root: &Path,
    explicit_path: Option<&Path>,
    cli: &CliOverrides,
) -> Result<InstrumentConfig> {
    let loaded = match explicit_path {
        Some(path) => Some((load_config_file(path)?, path.to_path_buf())),
        None => discover_config(project_root)?,
    };

    match loaded {
        Some((config, path)) => {
            let mut resolved = config
                .resolve(cli)
                .with_context(|| format!("invalid config in: {}", path.display()))?;
            resolved.config_path = Some(path);
            Ok(resolved)
        }
        None => CpInserterConfig::default().resolve(cli),
    }
}
