//! Per-entry line counts.
//!
//! For each file entry of a revision the counter decides how many lines were
//! added and deleted, choosing per revision between one whole-revision diff
//! and one request per file. Directories and binary files always count zero.
//!
//! | Change   | Per-file source                                              |
//! |----------|--------------------------------------------------------------|
//! | Added    | full content at the revision, all lines added                |
//! | Deleted  | full content at the previous identity, all lines deleted     |
//! | Replaced | diff against the same path at `revision - 1`                 |
//! | Modified | diff against the previous identity (copy-from or `revision - 1`) |

use tracing::{debug, trace, warn};

use crate::classify::{BinaryDetector, PathClassifier};
use crate::config::WholeRevisionLimits;
use crate::diff::{parse_diff_counts, single_file_counts, DiffCountMap, LineCounts};
use crate::error::MineError;
use crate::revlog::{ChangeEntry, ChangeKind, ChangedFileCounts, Revision};
use crate::source::{DiffRequest, LogSource, SourceError};
use crate::count_lines;

/// How the diffs of one revision are retrieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffStrategy {
    /// One request per file entry.
    PerFile,
    /// One diff for the whole revision, looked up by path.
    WholeRevision,
}

/// Whole-revision diff only when the repository path is the root, the
/// repository is not on the local filesystem, the file counts stay within
/// `limits` and no entry carries copy-from ancestry. A whole-revision diff
/// shows files below a copy as full additions, while per-file counting diffs
/// them against their ancestor.
pub fn choose_strategy<S: LogSource + ?Sized>(
    source: &S,
    counts: ChangedFileCounts,
    has_copies: bool,
    limits: &WholeRevisionLimits,
) -> Result<DiffStrategy, MineError> {
    let small = counts.added <= limits.max_added
        && counts.deleted <= limits.max_deleted
        && counts.changed <= limits.max_changed;
    if small && !has_copies && !source.is_local() && source.repo_is_root()? {
        Ok(DiffStrategy::WholeRevision)
    } else {
        Ok(DiffStrategy::PerFile)
    }
}

/// Entry filter applied before any classification or diff call.
pub type SkipPredicate<'a> = Box<dyn Fn(&str) -> bool + 'a>;

/// Enriches revisions with path kinds and line counts.
pub struct LineCounter<'a, S: LogSource + ?Sized> {
    source: &'a S,
    classifier: PathClassifier<'a, S>,
    binary: BinaryDetector,
    limits: WholeRevisionLimits,
    skip: Option<SkipPredicate<'a>>,
}

impl<'a, S: LogSource + ?Sized> LineCounter<'a, S> {
    pub fn new(source: &'a S, binary: BinaryDetector, limits: WholeRevisionLimits) -> Self {
        Self {
            source,
            classifier: PathClassifier::new(source),
            binary,
            limits,
            skip: None,
        }
    }

    /// Drop entries whose path matches `skip`.
    pub fn with_skip(mut self, skip: impl Fn(&str) -> bool + 'a) -> Self {
        self.skip = Some(Box::new(skip));
        self
    }

    /// Classify every entry and fill in line counts. Entries outside the
    /// repository path or matched by the skip predicate are removed.
    pub fn count_revision(&mut self, revision: Revision) -> Result<Revision, MineError> {
        let Revision {
            number,
            author,
            date,
            message,
            changes,
        } = revision;

        let mut classified = Vec::with_capacity(changes.len());
        for entry in changes {
            if !self.source.is_child_path(&entry.path)? {
                trace!(revision = number, path = %entry.path, "Dropping entry outside repository path");
                continue;
            }
            if self.skip.as_ref().is_some_and(|skip| skip(entry.path.as_str())) {
                trace!(revision = number, path = %entry.path, "Skipping excluded entry");
                continue;
            }
            let kind = self.classifier.classify(&entry, number)?;
            classified.push(entry.with_path_kind(kind));
        }

        let mut revision = Revision {
            number,
            author,
            date,
            message,
            changes: classified,
        };
        let has_copies = revision.changes.iter().any(|c| c.copy_from.is_some());
        let strategy = choose_strategy(self.source, revision.file_counts(), has_copies, &self.limits)?;
        debug!(revision = number, ?strategy, entries = revision.changes.len(), "Counting lines");

        let mut whole: Option<DiffCountMap> = None;
        let mut counted = Vec::with_capacity(revision.changes.len());
        for entry in std::mem::take(&mut revision.changes) {
            if !entry.is_file() || self.binary.is_binary_entry(self.source, &entry, number)? {
                counted.push(entry);
                continue;
            }
            let counts = match strategy {
                DiffStrategy::WholeRevision => {
                    if whole.is_none() {
                        whole = Some(self.revision_diff_counts(number)?);
                    }
                    whole
                        .as_ref()
                        .and_then(|map| map.get(&entry.path))
                        .copied()
                        .unwrap_or_default()
                }
                DiffStrategy::PerFile => self.per_file_counts(&entry, number)?,
            };
            trace!(revision = number, path = %entry.path, added = counts.added, deleted = counts.deleted);
            counted.push(entry.with_counts(counts));
        }
        revision.changes = counted;
        Ok(revision)
    }

    fn revision_diff_counts(&self, revision: u64) -> Result<DiffCountMap, MineError> {
        let raw = self.source.diff(&DiffRequest::Revision { revision })?;
        Ok(parse_diff_counts(&raw))
    }

    fn per_file_counts(&self, entry: &ChangeEntry, revision: u64) -> Result<LineCounts, MineError> {
        match entry.change {
            ChangeKind::Added => self.content_counts(entry, revision),
            ChangeKind::Deleted => self.deleted_counts(entry, revision),
            ChangeKind::Replaced => {
                match self.path_diff(&entry.path, revision, &entry.path, revision.saturating_sub(1)) {
                    Err(MineError::PathNotFound { .. }) => {
                        debug!(revision, path = %entry.path, "Replaced path has no prior version, counting as added");
                        self.content_counts(entry, revision)
                    }
                    other => other,
                }
            }
            ChangeKind::Modified => match self.previous_identity_diff(entry, revision) {
                Err(MineError::AmbiguousAncestry { path, revision: prev }) => {
                    warn!(revision, path = %entry.path, ancestor = %path, ancestor_revision = prev,
                        "Inferred ancestor not found, counting as added");
                    self.content_counts(entry, revision)
                }
                other => other,
            },
        }
    }

    /// Diff against the entry's previous identity. A missing inferred ancestor
    /// is reported as [`MineError::AmbiguousAncestry`].
    fn previous_identity_diff(&self, entry: &ChangeEntry, revision: u64) -> Result<LineCounts, MineError> {
        let prev_path = entry.prev_path();
        let prev_revision = entry.prev_revision(revision);
        match self.path_diff(&entry.path, revision, prev_path, prev_revision) {
            Err(MineError::PathNotFound { .. }) if entry.has_inferred_ancestry() => {
                Err(MineError::AmbiguousAncestry {
                    path: prev_path.to_string(),
                    revision: prev_revision,
                })
            }
            other => other,
        }
    }

    fn path_diff(
        &self,
        path: &str,
        revision: u64,
        prev_path: &str,
        prev_revision: u64,
    ) -> Result<LineCounts, MineError> {
        let raw = self.source.diff(&DiffRequest::Path {
            path: path.to_string(),
            revision,
            prev_path: Some(prev_path.to_string()),
            prev_revision: Some(prev_revision),
        })?;
        Ok(single_file_counts(&parse_diff_counts(&raw)))
    }

    /// Every line of the content at the revision, as added.
    fn content_counts(&self, entry: &ChangeEntry, revision: u64) -> Result<LineCounts, MineError> {
        let content = self.source.file_content(&entry.path, revision)?;
        Ok(LineCounts::new(count_lines(&content), 0))
    }

    /// Every line of the content at the previous identity, as deleted. An
    /// inferred identity that does not exist is retried as the same path at
    /// `revision - 1`; if that fails too the entry counts zero. A missing
    /// explicit or same-path identity is an error.
    fn deleted_counts(&self, entry: &ChangeEntry, revision: u64) -> Result<LineCounts, MineError> {
        match self.source.file_content(entry.prev_path(), entry.prev_revision(revision)) {
            Ok(content) => return Ok(LineCounts::new(0, count_lines(&content))),
            Err(SourceError::NotFound { .. }) if entry.has_inferred_ancestry() => {}
            Err(e) => return Err(e.into()),
        }
        match self.source.file_content(&entry.path, revision.saturating_sub(1)) {
            Ok(content) => Ok(LineCounts::new(0, count_lines(&content))),
            Err(SourceError::NotFound { .. }) => {
                warn!(revision, path = %entry.path, "Deleted file content not found, counting zero lines");
                Ok(LineCounts::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "linecount_tests.rs"]
mod tests;
