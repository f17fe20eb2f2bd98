//! # revmine: incremental revision-log miner
//!
//! Turns the commit history of a Subversion-style repository into a normalized,
//! incrementally-updatable stream of revisions, changed paths and per-file
//! line churn (lines added / deleted).
//!
//! ## Pipeline
//!
//! ```text
//! checkpoint ──► range::RangeResolver ──► revlog::RevisionLogIter ──► linecount::LineCounter ──► consumer
//!                    (start, end)          (paginated, lazy)          (classify + diff counts)
//! ```
//!
//! The repository itself is reached through the [`source::LogSource`] trait.
//! [`source::memory::MemorySource`] is a complete in-memory implementation used
//! by the tests and the `revmine` binary.

use std::borrow::Cow;

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod linecount;
pub mod miner;
pub mod paths;
pub mod range;
pub mod revlog;
pub mod sink;
pub mod source;

pub use config::{ExcludeFilter, MineConfig};
pub use diff::{parse_diff_counts, DiffCountMap, LineCounts};
pub use error::MineError;
pub use miner::Miner;
pub use paths::normalize_path;
pub use range::RevisionRange;
pub use revlog::{ChangeEntry, ChangeKind, CopyFrom, PathKind, Revision};
pub use source::{LogSource, SourceError};

/// Default number of detailed log entries fetched per server round-trip.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Extensions treated as binary without asking the server.
pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &[
    "doc", "xls", "ppt", "docx", "xlsx", "pptx", "dot", "dotx", "ods", "odm", "odt", "ott", "pdf",
    "o", "a", "obj", "lib", "dll", "so", "exe",
    "jar", "zip", "z", "gz", "tar", "rar", "7z",
    "pdb", "idb", "ilk", "bsc", "ncb", "sbr", "pch",
    "bmp", "dib", "jpg", "jpeg", "png", "gif", "ico", "pcd", "wmf", "emf", "xcf", "tiff", "xpm",
    "gho", "mp3", "wma", "wmv", "wav", "avi",
];

// ─── Text coercion ──────────────────────────────────────────────────

/// Coerce raw bytes to text: UTF-8 when valid, otherwise Latin-1.
///
/// Repository histories routinely mix encodings (old commits in Windows-1252,
/// newer ones in UTF-8). Latin-1 maps every byte to exactly one char, so the
/// fallback never fails and never changes the number of lines.
#[must_use]
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Number of lines in a file's content, as `str::lines` counts them.
///
/// A trailing newline does not start a new line, so the count for a new file
/// equals the number of `+` lines its diff would show. The one exception is a
/// content line starting with `++` or `--`: the diff parser treats its `+++` or
/// `---` form as a file marker and skips it, so a whole-revision diff reports
/// one line fewer per such line than this count.
#[must_use]
pub fn count_lines(bytes: &[u8]) -> u32 {
    decode_text(bytes).lines().count() as u32
}


// ─── Property-based tests (proptest) ─────────────────────────────────
