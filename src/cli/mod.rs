//! CLI layer: argument parsing, logging setup, command dispatch.

pub mod args;

pub use args::*;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use revmine::sink::JsonLinesSink;
use revmine::source::LogSource;
use revmine::source::memory::MemorySource;
use revmine::{MineConfig, MineError, Miner, Revision, RevisionRange};

// ─── CLI ─────────────────────────────────────────────────────────────

/// Incremental revision-log miner: revisions, changed paths and per-file line churn
#[derive(Parser, Debug)]
#[command(name = "revmine", version, about, after_help = "\
Run 'revmine <COMMAND> --help' for detailed options and examples.\n\
Common options: --repo <SCRIPT> (history), --out <STORE> (revision store), --config <FILE>")]
pub(crate) struct Cli {
    /// Config file (JSON). Default: <config dir>/revmine/config.json if present
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Log output format (stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Mine new revisions into a JSON-lines store, resuming after its checkpoint
    Mine(MineArgs),

    /// Show the revision range a run would mine
    Range(RangeArgs),

    /// Count changed lines of a single revision
    Diffstat(DiffstatArgs),

    /// Show the last stored revision of a store
    Checkpoint(CheckpointArgs),
}

// ─── Main entry point ───────────────────────────────────────────────

pub fn run() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Mine(args) => cmd_mine(args, config_path),
        Commands::Range(args) => cmd_range(args, config_path),
        Commands::Diffstat(args) => cmd_diffstat(args, config_path),
        Commands::Checkpoint(args) => cmd_checkpoint(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn load_config(path: Option<&Path>, overrides: Option<&MineOverrides>) -> Result<MineConfig, MineError> {
    let mut config = MineConfig::resolve(path)?;
    if let Some(overrides) = overrides {
        overrides.apply(&mut config)?;
    }
    Ok(config)
}

fn cmd_mine(args: MineArgs, config_path: Option<&Path>) -> Result<(), MineError> {
    let config = load_config(config_path, Some(&args.overrides))?;
    let source = MemorySource::from_script_file(&args.repo.repo)?;
    let start_date = args.repo.start_date()?;
    let end_date = args.repo.end_date()?;

    let mut sink = JsonLinesSink::open(&args.out)?;
    let miner = Miner::new(&source, config)?;
    let checkpoint = sink.last_stored_revision();
    let Some(range) = miner.plan(checkpoint, start_date, end_date)? else {
        eprintln!("[mine] Nothing to do: {} is up to date (checkpoint r{})", source.repo_url(), checkpoint);
        return Ok(());
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Cannot install Ctrl-C handler");
    }

    let start = Instant::now();
    let summary = mine_into(&miner, range, &mut sink, &cancelled)?;
    info!(
        stored = summary.stored,
        skipped = summary.skipped,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Mining finished"
    );

    if summary.cancelled {
        eprintln!("[mine] Cancelled after r{}", sink.last_stored_revision());
    }
    eprintln!(
        "[mine] Stored {} revision(s), skipped {} without timestamp, checkpoint r{}",
        summary.stored,
        summary.skipped,
        sink.last_stored_revision()
    );
    Ok(())
}

/// Outcome of one mining run.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct MineSummary {
    pub stored: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

/// Store every valid revision of `range`. Cancellation is checked after each
/// revision, so the one in flight is always persisted.
pub(crate) fn mine_into<S: LogSource + ?Sized>(
    miner: &Miner<'_, S>,
    range: RevisionRange,
    sink: &mut JsonLinesSink,
    cancelled: &AtomicBool,
) -> Result<MineSummary, MineError> {
    let mut summary = MineSummary::default();
    for revision in miner.revisions(range) {
        let revision = revision?;
        if revision.is_valid() {
            sink.store(&revision)?;
            summary.stored += 1;
        } else {
            warn!(revision = revision.number, "Skipping revision without timestamp");
            summary.skipped += 1;
        }
        if cancelled.load(Ordering::SeqCst) {
            summary.cancelled = true;
            break;
        }
    }
    Ok(summary)
}

fn cmd_range(args: RangeArgs, config_path: Option<&Path>) -> Result<(), MineError> {
    let config = load_config(config_path, None)?;
    let source = MemorySource::from_script_file(&args.repo.repo)?;
    let miner = Miner::new(&source, config)?;
    let range = miner.plan(args.checkpoint, args.repo.start_date()?, args.repo.end_date()?)?;
    println!("{}", serde_json::to_string(&range)?);
    Ok(())
}

fn cmd_diffstat(args: DiffstatArgs, config_path: Option<&Path>) -> Result<(), MineError> {
    let config = load_config(config_path, Some(&args.overrides))?;
    let source = MemorySource::from_script_file(&args.repo)?;
    if args.revision == 0 || args.revision > source.head() {
        return Err(MineError::InvalidArgs(format!(
            "Revision {} is outside 1..={}",
            args.revision,
            source.head()
        )));
    }
    let miner = Miner::new(&source, config)?;
    let range = RevisionRange::new(args.revision, args.revision)
        .ok_or_else(|| MineError::InvalidArgs(format!("Invalid revision {}", args.revision)))?;

    let Some(revision) = miner.revisions(range).next().transpose()? else {
        eprintln!("Revision {} does not touch {}", args.revision, source.repo_url());
        return Ok(());
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&revision)?);
    } else {
        print!("{}", render_diffstat(&revision));
    }
    Ok(())
}

/// One line per change entry, then a total.
pub(crate) fn render_diffstat(revision: &Revision) -> String {
    let mut out = String::new();
    let date = revision
        .date
        .map_or_else(|| "(no date)".to_string(), |d| d.format("%Y-%m-%d %H:%M:%S").to_string());
    out.push_str(&format!("r{} | {} | {}\n", revision.number, revision.author, date));
    for entry in &revision.changes {
        let kind = match entry.path_kind {
            Some(revmine::PathKind::File) => "file",
            Some(revmine::PathKind::Directory) => "dir",
            None => "?",
        };
        out.push_str(&format!(
            "{} {:<4} {:>6} {:>6}  {}",
            entry.change.as_action(),
            kind,
            format!("+{}", entry.counts.added),
            format!("-{}", entry.counts.deleted),
            entry.path
        ));
        if let Some(cf) = &entry.copy_from {
            out.push_str(&format!("  (from {}@{})", cf.path, cf.revision));
        }
        out.push('\n');
    }
    let total = revision.total_counts();
    let files = revision.file_counts();
    out.push_str(&format!(
        "{} added, {} changed, {} deleted file(s); +{} -{} lines\n",
        files.added, files.changed, files.deleted, total.added, total.deleted
    ));
    out
}

fn cmd_checkpoint(args: CheckpointArgs) -> Result<(), MineError> {
    let sink = JsonLinesSink::open(&args.out)?;
    println!(
        "{}",
        serde_json::json!({
            "store": sink.path().display().to_string(),
            "last_stored_revision": sink.last_stored_revision(),
            "revisions": sink.revisions_stored(),
            "paths": sink.path_count(),
        })
    );
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
