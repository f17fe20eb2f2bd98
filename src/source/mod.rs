//! Repository log source: the capability the miner consumes.
//!
//! The miner never talks to a VCS server directly. Everything it needs
//! (log pages, diffs, path metadata, file contents) goes through the
//! [`LogSource`] trait, whose errors are explicit [`SourceError`] variants
//! so callers branch on the kind of failure rather than on its message.

pub mod memory;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths;
use crate::revlog::ChangeKind;

// ─── Errors ─────────────────────────────────────────────────────────

/// Failure reported by a log source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The path does not exist at that revision (or never existed there).
    #[error("'{path}' does not exist at revision {revision}")]
    NotFound { path: String, revision: u64 },

    /// Credentials were rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network or server failure; retrying later may succeed.
    #[error("transient failure: {0}")]
    Transient(String),
}

// ─── Raw log types ──────────────────────────────────────────────────

/// One changed path as reported by a detailed log query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChangedPath {
    pub path: String,
    pub action: ChangeKind,
    pub copyfrom_path: Option<String>,
    pub copyfrom_revision: Option<u64>,
}

/// One log entry as reported by the source. Any field except the revision
/// number may be missing in old or damaged histories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogEntry {
    pub revision: u64,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    /// Empty unless the query asked for detailed output.
    #[serde(default)]
    pub changed_paths: Vec<RawChangedPath>,
}

/// Kind of node at a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
}

/// Metadata of a path at one revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathInfo {
    pub kind: NodeKind,
    /// Server-side content-type property (`svn:mime-type`), if set.
    pub content_type: Option<String>,
}

// ─── Queries ────────────────────────────────────────────────────────

/// A revision bound in a log query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevSpec {
    Number(u64),
    /// The last revision committed at or before this instant.
    Date(DateTime<Utc>),
    Head,
}

/// Which URL a log query runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogTarget {
    /// The repository root: every revision.
    Root,
    /// The configured repository path: only revisions touching it.
    Repository,
}

/// A log query. When `start` resolves to a later revision than `end`,
/// entries come back in descending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    pub target: LogTarget,
    pub start: RevSpec,
    pub end: RevSpec,
    pub limit: Option<usize>,
    pub detailed: bool,
}

impl LogQuery {
    /// Non-detailed query over `[start, end]` of `target`.
    pub fn new(target: LogTarget, start: RevSpec, end: RevSpec) -> Self {
        Self {
            target,
            start,
            end,
            limit: None,
            detailed: false,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn detailed(mut self) -> Self {
        self.detailed = true;
        self
    }
}

/// A raw unified-diff request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffRequest {
    /// Whole-tree diff of the repository path between `revision - 1` and `revision`.
    Revision { revision: u64 },
    /// Single-path diff. The previous identity defaults to the same path at
    /// `revision - 1`.
    Path {
        path: String,
        revision: u64,
        prev_path: Option<String>,
        prev_revision: Option<u64>,
    },
}

// ─── The capability ─────────────────────────────────────────────────

/// A repository the miner can read history from.
///
/// All calls are blocking; the miner issues them one at a time.
pub trait LogSource {
    /// URL of the repository root.
    fn root_url(&self) -> Result<String, SourceError>;

    /// URL of the configured repository path (the root or a strict subpath of it).
    fn repo_url(&self) -> &str;

    /// True when the repository lives on the local filesystem (`file://`).
    fn is_local(&self) -> bool;

    /// Log entries matching `query`.
    fn log(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, SourceError>;

    /// Raw unified diff text.
    fn diff(&self, request: &DiffRequest) -> Result<Vec<u8>, SourceError>;

    /// Metadata of an absolute repository path at a revision.
    fn path_info(&self, path: &str, revision: u64) -> Result<PathInfo, SourceError>;

    /// Full content of a file at a revision.
    fn file_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, SourceError>;

    /// Check if a changed path lies under the configured repository path.
    /// Every path qualifies when the repository path is the root.
    fn is_child_path(&self, path: &str) -> Result<bool, SourceError> {
        let full = paths::join_url(&self.root_url()?, path);
        let repo = self.repo_url().trim_end_matches('/');
        Ok(full == repo || full.starts_with(&format!("{}/", repo)) || self.repo_is_root()?)
    }

    /// Check if the configured repository path is the root itself.
    fn repo_is_root(&self) -> Result<bool, SourceError> {
        let root = self.root_url()?;
        Ok(self.repo_url().trim_end_matches('/') == root.trim_end_matches('/'))
    }
}
