//! CLI argument structs for all subcommands.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, ValueEnum};

use revmine::revlog::InvalidRevisionPolicy;
use revmine::{MineConfig, MineError};

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Repository script plus the optional date window, shared by every command
/// that reads history.
#[derive(Args, Debug)]
pub struct RepoArgs {
    /// Repository script (JSON) describing the history to mine
    #[arg(short, long)]
    pub repo: PathBuf,

    /// First day to include (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub start: Option<String>,

    /// Last day to include (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub end: Option<String>,
}

impl RepoArgs {
    pub fn start_date(&self) -> Result<Option<DateTime<Utc>>, MineError> {
        self.start.as_deref().map(parse_date).transpose()
    }

    pub fn end_date(&self) -> Result<Option<DateTime<Utc>>, MineError> {
        self.end.as_deref().map(parse_date).transpose()
    }
}

/// Flags that override values from the config file.
#[derive(Args, Debug, Default)]
pub struct MineOverrides {
    /// Detailed log entries per round-trip (default: 50)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Regex of paths to skip; repeatable, added to the config file's list
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Comma-separated binary extensions, replacing the configured list
    #[arg(long)]
    pub binary_ext: Option<String>,

    /// Drop revisions without a timestamp inside the iterator
    #[arg(long)]
    pub skip_invalid: bool,
}

impl MineOverrides {
    pub fn apply(&self, config: &mut MineConfig) -> Result<(), MineError> {
        if let Some(page_size) = self.page_size {
            if page_size == 0 {
                return Err(MineError::InvalidArgs("--page-size must be at least 1".to_string()));
            }
            config.page_size = page_size;
        }
        config.exclude.extend(self.exclude.iter().cloned());
        if let Some(exts) = &self.binary_ext {
            config.binary_extensions = exts
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if self.skip_invalid {
            config.invalid_revisions = InvalidRevisionPolicy::Skip;
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  First run:       revmine mine --repo history.json --out revisions.jsonl
  Resume:          revmine mine --repo history.json --out revisions.jsonl
  Date window:     revmine mine --repo history.json --out r.jsonl --start 2024-01-01 --end 2024-03-31
  Skip generated:  revmine mine --repo history.json --out r.jsonl --exclude '/generated/' --exclude '\.min\.js$'
  Small pages:     revmine mine --repo history.json --out r.jsonl --page-size 10

NOTES:
  - The store is append-only. Each run resumes after the last stored revision.
  - Revisions without a commit timestamp are never stored.
  - Ctrl-C finishes the revision in flight, stores it, and stops.
  - A torn last line (crash during a write) is cut off when the store is opened.
"#)]
pub struct MineArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// JSON-lines revision store to append to (created if missing)
    #[arg(short, long)]
    pub out: PathBuf,

    #[command(flatten)]
    pub overrides: MineOverrides,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  Whole history:   revmine range --repo history.json
  After r120:      revmine range --repo history.json --checkpoint 120
  One quarter:     revmine range --repo history.json --start 2024-01-01 --end 2024-03-31

OUTPUT:
  {"start":121,"end":180} or null when there is nothing to mine.
"#)]
pub struct RangeArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Last stored revision; the range starts after it
    #[arg(long, default_value = "0")]
    pub checkpoint: u64,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  Table:           revmine diffstat --repo history.json 42
  JSON record:     revmine diffstat --repo history.json 42 --json

OUTPUT (table):
  A file      +12     -0  /trunk/src/main.c
  M file       +3     -1  /trunk/README
  A dir        +0     -0  /branches/b1/  (from /trunk/@41)
"#)]
pub struct DiffstatArgs {
    /// Repository script (JSON)
    #[arg(short, long)]
    pub repo: PathBuf,

    /// Revision to count
    pub revision: u64,

    /// Print the enriched revision record as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: MineOverrides,
}

#[derive(Parser, Debug)]
#[command(after_long_help = r#"EXAMPLES:
  revmine checkpoint --out revisions.jsonl

Opening the store truncates a torn last line, exactly as 'mine' would.
"#)]
pub struct CheckpointArgs {
    /// JSON-lines revision store
    #[arg(short, long)]
    pub out: PathBuf,
}

/// Parse `YYYY-MM-DD` as UTC midnight.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, MineError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| MineError::InvalidDate(s.to_string()))
}
