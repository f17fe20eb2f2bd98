//! Pipeline driver: checkpoint → range → paginated log → enriched revisions.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::classify::BinaryDetector;
use crate::config::{ExcludeFilter, MineConfig};
use crate::error::MineError;
use crate::linecount::LineCounter;
use crate::range::{RangeResolver, RevisionRange};
use crate::revlog::{Revision, RevisionLogIter};
use crate::source::LogSource;

/// Mines one repository path of a log source.
pub struct Miner<'a, S: LogSource + ?Sized> {
    source: &'a S,
    config: MineConfig,
    exclude: ExcludeFilter,
}

impl<'a, S: LogSource + ?Sized> Miner<'a, S> {
    /// Fails if an exclusion pattern does not compile.
    pub fn new(source: &'a S, config: MineConfig) -> Result<Self, MineError> {
        let exclude = config.exclude_filter()?;
        Ok(Self {
            source,
            config,
            exclude,
        })
    }

    pub fn config(&self) -> &MineConfig {
        &self.config
    }

    /// Inclusive range for the date window, without regard to a checkpoint.
    pub fn resolve_range(
        &self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<RevisionRange, MineError> {
        RangeResolver::new(self.source).resolve(start_date, end_date)
    }

    /// Revisions still to be mined after `checkpoint` (the last stored
    /// revision, 0 when nothing is stored). `None` means there is nothing to
    /// do, including when the window has no history at all.
    pub fn plan(
        &self,
        checkpoint: u64,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Option<RevisionRange>, MineError> {
        let range = match self.resolve_range(start_date, end_date) {
            Ok(range) => range,
            Err(MineError::NoHistoryFound { path }) => {
                info!(path = %path, "No history in the requested window");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let pending = range.after(checkpoint);
        match pending {
            Some(p) => info!(checkpoint, start = p.start, end = p.end, "Planned revision range"),
            None => info!(checkpoint, end = range.end, "Already up to date"),
        }
        Ok(pending)
    }

    /// Lazy sequence of enriched revisions in `range`, in increasing order.
    pub fn revisions(&self, range: RevisionRange) -> MinedRevisions<'a, S> {
        let exclude = self.exclude.clone();
        let mut counter = LineCounter::new(
            self.source,
            BinaryDetector::new(&self.config.binary_extensions),
            self.config.whole_revision,
        );
        if !exclude.is_empty() {
            counter = counter.with_skip(move |path| exclude.is_excluded(path));
        }
        let log = RevisionLogIter::new(self.source, range.start, range.end, self.config.page_size)
            .with_policy(self.config.invalid_revisions);
        MinedRevisions {
            log,
            counter,
            done: false,
        }
    }
}

/// Iterator returned by [`Miner::revisions`].
///
/// Valid revisions come out classified and counted. Revisions without a
/// timestamp (only yielded under [`crate::revlog::InvalidRevisionPolicy::Yield`])
/// are passed through as read; the consumer must not store them. The first
/// error ends the sequence.
pub struct MinedRevisions<'a, S: LogSource + ?Sized> {
    log: RevisionLogIter<'a, S>,
    counter: LineCounter<'a, S>,
    done: bool,
}

impl<S: LogSource + ?Sized> Iterator for MinedRevisions<'_, S> {
    type Item = Result<Revision, MineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.log.next()? {
            Ok(revision) if !revision.is_valid() => {
                debug!(revision = revision.number, "Passing through revision without timestamp");
                Ok(revision)
            }
            Ok(revision) => self.counter.count_revision(revision),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl<S: LogSource + ?Sized> std::iter::FusedIterator for MinedRevisions<'_, S> {}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "miner_tests.rs"]
mod tests;
