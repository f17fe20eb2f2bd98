//! Revision-range resolution.
//!
//! Turns optional start/end dates into an inclusive range of revision
//! numbers for the configured repository path, using as few log queries as
//! possible (at most five).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MineError;
use crate::source::{LogQuery, LogSource, LogTarget, RevSpec};

/// Inclusive range of revision numbers, `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRange {
    pub start: u64,
    pub end: u64,
}

impl RevisionRange {
    /// `None` when `start > end`.
    pub fn new(start: u64, end: u64) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Number of revision numbers covered.
    pub fn revision_count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, revision: u64) -> bool {
        (self.start..=self.end).contains(&revision)
    }

    /// The part of the range after `checkpoint`, if any.
    pub fn after(&self, checkpoint: u64) -> Option<Self> {
        Self::new(self.start.max(checkpoint.saturating_add(1)), self.end)
    }
}

/// Resolves date bounds to revision numbers against a log source.
pub struct RangeResolver<'a, S: LogSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: LogSource + ?Sized> RangeResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    fn no_history(&self) -> MineError {
        MineError::NoHistoryFound {
            path: self.source.repo_url().to_string(),
        }
    }

    /// Head revision of the repository root. With a cutoff date earlier than
    /// the head's commit, the last revision committed within the cutoff day
    /// is returned instead.
    pub fn head_revision(&self, cutoff: Option<DateTime<Utc>>) -> Result<u64, MineError> {
        let head = self
            .source
            .log(&LogQuery::new(LogTarget::Root, RevSpec::Head, RevSpec::Head).limit(1))?
            .into_iter()
            .next()
            .ok_or_else(|| self.no_history())?;

        match (cutoff, head.date) {
            (Some(cutoff), Some(head_date)) if cutoff < head_date => {
                let entries = self.source.log(&LogQuery::new(
                    LogTarget::Root,
                    RevSpec::Date(cutoff),
                    RevSpec::Date(cutoff + Duration::days(1)),
                ))?;
                let last = entries.last().ok_or_else(|| self.no_history())?;
                debug!(head = head.revision, cutoff = %cutoff, revision = last.revision, "Head revision limited by end date");
                Ok(last.revision)
            }
            _ => Ok(head.revision),
        }
    }

    /// First revision of the repository root, or the first revision committed
    /// at or after `start` when revision 1 predates it.
    pub fn first_revision(&self, start: Option<DateTime<Utc>>) -> Result<u64, MineError> {
        let first = self
            .source
            .log(&LogQuery::new(LogTarget::Root, RevSpec::Number(1), RevSpec::Number(1)).limit(1))?
            .into_iter()
            .next()
            .ok_or_else(|| self.no_history())?;

        match (start, first.date) {
            (Some(start), Some(first_date)) if first_date < start => {
                // A date bound resolves to the last revision at or before it,
                // so the one after it may be the first inside the window.
                let entries = self.source.log(
                    &LogQuery::new(LogTarget::Root, RevSpec::Date(start), RevSpec::Head).limit(2),
                )?;
                entries
                    .iter()
                    .find(|e| e.date.is_some_and(|d| d >= start))
                    .map(|e| e.revision)
                    .ok_or_else(|| self.no_history())
            }
            _ => Ok(first.revision),
        }
    }

    /// Resolve the inclusive range for the configured repository path.
    pub fn resolve(
        &self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<RevisionRange, MineError> {
        let end = self.head_revision(end_date)?;
        let mut start = self.first_revision(start_date)?;
        if start > end {
            return Err(self.no_history());
        }

        if !self.source.repo_is_root()? {
            let entries = self.source.log(
                &LogQuery::new(LogTarget::Repository, RevSpec::Number(start), RevSpec::Number(end)).limit(1),
            )?;
            start = entries
                .first()
                .map(|e| e.revision)
                .ok_or_else(|| self.no_history())?;
        }

        let range = RevisionRange::new(start, end).ok_or_else(|| self.no_history())?;
        debug!(start = range.start, end = range.end, url = %self.source.repo_url(), "Resolved revision range");
        Ok(range)
    }
}
