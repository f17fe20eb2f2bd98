//! Normalized revision records and their change entries.
//!
//! A [`Revision`] is built once from a [`RawLogEntry`] by
//! [`Revision::from_raw`]: paths are normalized, missing metadata gets its
//! fallback value, and implicit copy-from ancestry is inferred. Later stages
//! (classification, line counting) produce new entries through the
//! by-value `with_*` methods instead of patching shared state.

pub mod copyfrom;
pub mod iter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::LineCounts;
use crate::paths::{dir_form, normalize_path};
use crate::source::{RawChangedPath, RawLogEntry};

pub use iter::{InvalidRevisionPolicy, RevisionLogIter};

// ─── Change entry ───────────────────────────────────────────────────

/// What happened to a path in a revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
    Replaced,
}

impl ChangeKind {
    /// Parse a single-letter log action (`A`, `D`, `M`, `R`).
    pub fn from_action(action: char) -> Option<Self> {
        match action {
            'A' => Some(ChangeKind::Added),
            'D' => Some(ChangeKind::Deleted),
            'M' => Some(ChangeKind::Modified),
            'R' => Some(ChangeKind::Replaced),
            _ => None,
        }
    }

    pub fn as_action(self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
            ChangeKind::Modified => 'M',
            ChangeKind::Replaced => 'R',
        }
    }
}

/// File or directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Directory,
}

/// Where a copy-from reference came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyOrigin {
    /// Reported by the server.
    Explicit,
    /// Derived from a copied ancestor directory in the same revision.
    Inferred,
}

/// Copy-from ancestry of a change entry. The referenced path/revision is not
/// guaranteed to exist: historical repositories have dangling references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyFrom {
    pub path: String,
    pub revision: u64,
    pub origin: CopyOrigin,
}

/// One path's change within a revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Normalized absolute path; ends with `/` once known to be a directory.
    pub path: String,
    pub change: ChangeKind,
    /// `None` until classified.
    pub path_kind: Option<PathKind>,
    pub copy_from: Option<CopyFrom>,
    pub counts: LineCounts,
}

impl ChangeEntry {
    pub fn new(path: &str, change: ChangeKind) -> Self {
        Self {
            path: normalize_path(path),
            change,
            path_kind: None,
            copy_from: None,
            counts: LineCounts::default(),
        }
    }

    /// Normalize a raw changed path. Copy-from data is kept only when both
    /// the path and the revision are present and the path is non-empty.
    pub fn from_raw(raw: &RawChangedPath) -> Self {
        let copy_from = match (&raw.copyfrom_path, raw.copyfrom_revision) {
            (Some(path), Some(revision)) if !path.trim().is_empty() => Some(CopyFrom {
                path: normalize_path(path),
                revision,
                origin: CopyOrigin::Explicit,
            }),
            _ => None,
        };
        Self {
            copy_from,
            ..Self::new(&raw.path, raw.action)
        }
    }

    pub fn with_copy_from(mut self, copy_from: CopyFrom) -> Self {
        self.copy_from = Some(copy_from);
        self
    }

    /// Record the resolved path kind. Directories get the trailing `/` on both
    /// the path and the copy-from path. A kind that is already set is kept.
    pub fn with_path_kind(mut self, kind: PathKind) -> Self {
        if self.path_kind.is_some() {
            return self;
        }
        if kind == PathKind::Directory {
            self.path = dir_form(&self.path);
            if let Some(copy_from) = self.copy_from.as_mut() {
                copy_from.path = dir_form(&copy_from.path);
            }
        }
        self.path_kind = Some(kind);
        self
    }

    pub fn with_counts(mut self, counts: LineCounts) -> Self {
        self.counts = counts;
        self
    }

    pub fn is_directory(&self) -> bool {
        self.path_kind == Some(PathKind::Directory)
    }

    pub fn is_file(&self) -> bool {
        self.path_kind == Some(PathKind::File)
    }

    /// True when the entry was created by copying.
    pub fn is_copied(&self) -> bool {
        self.copy_from.is_some()
    }

    /// True for an addition carrying copy-from data: a branch or a tag.
    pub fn is_branch_tag(&self) -> bool {
        self.change == ChangeKind::Added && self.is_copied()
    }

    /// Path of the entry's previous identity: the copy-from path, else itself.
    pub fn prev_path(&self) -> &str {
        self.copy_from.as_ref().map_or(self.path.as_str(), |c| c.path.as_str())
    }

    /// Revision of the previous identity: the copy-from revision, else `revision - 1`.
    pub fn prev_revision(&self, revision: u64) -> u64 {
        self.copy_from
            .as_ref()
            .map_or(revision.saturating_sub(1), |c| c.revision)
    }

    /// True when the previous identity was inferred rather than reported.
    pub fn has_inferred_ancestry(&self) -> bool {
        self.copy_from
            .as_ref()
            .is_some_and(|c| c.origin == CopyOrigin::Inferred)
    }
}

// ─── Revision ───────────────────────────────────────────────────────

/// File-level change counts of a revision (directories excluded).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFileCounts {
    pub added: u32,
    /// Modified and replaced files.
    pub changed: u32,
    pub deleted: u32,
}

/// One commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub number: u64,
    /// Empty when the history does not record an author.
    pub author: String,
    /// `None` marks the record invalid.
    pub date: Option<DateTime<Utc>>,
    pub message: String,
    pub changes: Vec<ChangeEntry>,
}

impl Revision {
    /// Wrap a raw log entry: normalize paths, apply metadata fallbacks and
    /// infer implicit copy-from ancestry. This is the only place raw data is
    /// interpreted.
    pub fn from_raw(raw: RawLogEntry) -> Self {
        let entries = raw.changed_paths.iter().map(ChangeEntry::from_raw).collect();
        Self {
            number: raw.revision,
            author: raw.author.unwrap_or_default(),
            date: raw.date,
            message: raw.message.unwrap_or_default(),
            changes: copyfrom::infer_copy_from(entries),
        }
    }

    /// A record is valid iff its commit timestamp is present.
    pub fn is_valid(&self) -> bool {
        self.date.is_some()
    }

    /// Entries known to be files.
    pub fn file_changes(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.changes.iter().filter(|c| c.is_file())
    }

    /// Directory entries created by copying (branches, tags, copied trees).
    pub fn copied_dirs(&self) -> Vec<&ChangeEntry> {
        self.changes
            .iter()
            .filter(|c| c.is_copied() && c.is_directory())
            .collect()
    }

    /// Directory entries deleted in this revision.
    pub fn deleted_dirs(&self) -> Vec<&ChangeEntry> {
        self.changes
            .iter()
            .filter(|c| c.is_directory() && c.change == ChangeKind::Deleted)
            .collect()
    }

    /// Added/changed/deleted counts over file entries.
    pub fn file_counts(&self) -> ChangedFileCounts {
        let mut counts = ChangedFileCounts::default();
        for entry in self.file_changes() {
            match entry.change {
                ChangeKind::Added => counts.added += 1,
                ChangeKind::Deleted => counts.deleted += 1,
                ChangeKind::Modified | ChangeKind::Replaced => counts.changed += 1,
            }
        }
        counts
    }

    /// Sum of line counts over all entries.
    pub fn total_counts(&self) -> LineCounts {
        self.changes
            .iter()
            .fold(LineCounts::default(), |acc, c| acc + c.counts)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "revlog_tests.rs"]
mod tests;
