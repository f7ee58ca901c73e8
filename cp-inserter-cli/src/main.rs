//! cp-inserter CLI - insert entry/exit checkpoint calls into C and C++ sources

#![deny(warnings)]

// Global invariants enforced:
// - Patched sources go to stdout in input order; logs and errors go to stderr
// - A failing file never stops the others
// - Exit status is non-zero if any file failed

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use cp_inserter_core::config::{self, CliOverrides};
use cp_inserter_core::report::FileReport;
use cp_inserter_core::{
    collect_source_files, render_json, render_text, sink, summarize, CompilationDatabase,
    FileOutcome, Instrumenter, OutputMode, SourceFiles, WriteStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "cp-inserter")]
#[command(about = "Insert entry/exit checkpoint calls into selected C/C++ functions")]
#[command(version = env!("CP_INSERTER_VERSION"))]
struct Cli {
    /// Source files or directories to instrument
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Comma-separated list of functions to instrument
    #[arg(long)]
    functions: Option<String>,

    /// Overwrite each source file instead of writing to stdout
    #[arg(long)]
    in_place: bool,

    /// Name of the checkpoint function to call
    #[arg(long)]
    cp_symbol: Option<String>,

    /// Path to config file (default: auto-discover in the current directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build directory containing compile_commands.json
    #[arg(short = 'p')]
    build_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "source")]
    format: OutputFormat,

    /// Treat syntax errors as parse failures
    #[arg(long)]
    strict: bool,

    /// Abort parsing a file after this many milliseconds
    #[arg(long)]
    parse_timeout_ms: Option<u64>,

    /// Number of worker threads (default: one per core)
    #[arg(long)]
    jobs: Option<usize>,

    /// Show a progress bar on stderr
    #[arg(long)]
    progress: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Extra compiler flags applied to every file
    #[arg(last = true)]
    compiler_flags: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    Source,
    Json,
    Text,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn progress_bar(len: usize) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template("[{elapsed}] {bar:40.cyan/blue} {pos:>5}/{len:5} {msg}")
            .context("invalid progress template")?,
    );
    Ok(bar)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.in_place && cli.format != OutputFormat::Source {
        anyhow::bail!("--in-place cannot be combined with a report format");
    }

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("failed to configure worker pool")?;
    }

    // Load configuration
    let project_root = std::env::current_dir()?;
    let overrides = CliOverrides {
        functions: cli.functions.clone(),
        cp_symbol: cli.cp_symbol.clone(),
        in_place: cli.in_place,
        strict: cli.strict,
        parse_timeout_ms: cli.parse_timeout_ms,
    };
    let mut resolved = config::load_and_resolve(&project_root, cli.config.as_deref(), &overrides)
        .context("failed to load configuration")?;

    if let Some(config_path) = &resolved.config_path {
        tracing::info!("Using config: {}", config_path.display());
    }

    // Report formats never touch the sources
    if cli.format != OutputFormat::Source {
        resolved.output = OutputMode::Stream;
    }

    let SourceFiles { files, failures } = collect_source_files(&cli.paths, &resolved);
    if files.is_empty() && failures.is_empty() {
        tracing::warn!("no C/C++ source files found");
    }

    let mut instrumenter = Instrumenter::new(resolved)?.with_extra_flags(cli.compiler_flags);
    if let Some(build_dir) = &cli.build_dir {
        let db = CompilationDatabase::load(build_dir)?;
        tracing::info!("Loaded {} compile command(s)", db.len());
        instrumenter = instrumenter.with_compile_db(db);
    }

    // Unreadable directories are reported alongside per-file failures
    let mut outcomes = failures;
    outcomes.extend(if cli.progress {
        let bar = progress_bar(files.len())?;
        let outcomes = instrumenter.run_with_progress(&files, |outcome| {
            bar.set_message(outcome.path.display().to_string());
            bar.inc(1);
        });
        bar.finish_and_clear();
        outcomes
    } else {
        instrumenter.run(&files)
    });

    emit(&outcomes, cli.format, instrumenter.config().output)?;

    let summary = summarize(&outcomes);
    tracing::info!("{}", summary);

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Print results in input order and report per-file failures
fn emit(outcomes: &[FileOutcome], format: OutputFormat, output: OutputMode) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut reports: Vec<FileReport> = Vec::new();

    for outcome in outcomes {
        match &outcome.result {
            Ok(instrumented) => {
                if format == OutputFormat::Source && output == OutputMode::Stream {
                    sink::write_stream(&mut out, &instrumented.output)
                        .context("failed to write to stdout")?;
                }
                if instrumented.written == Some(WriteStatus::Written) {
                    tracing::info!(
                        "Instrumented {}: {} entry and {} exit call(s)",
                        outcome.path.display(),
                        instrumented.report.entry_count(),
                        instrumented.report.exit_count()
                    );
                }
                reports.push(instrumented.report.clone());
            }
            Err(e) => tracing::error!("{}", e),
        }
    }

    match format {
        OutputFormat::Source => {}
        OutputFormat::Json => writeln!(out, "{}", render_json(&reports))?,
        OutputFormat::Text => write!(out, "{}", render_text(&reports))?,
    }
    out.flush()?;
    Ok(())
}
