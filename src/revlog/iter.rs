//! Paginated, lazy revision iterator.

use std::collections::VecDeque;

use tracing::debug;

use super::Revision;
use crate::error::MineError;
use crate::source::{LogQuery, LogSource, LogTarget, RawLogEntry, RevSpec};

/// What the iterator does with records lacking a commit timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidRevisionPolicy {
    /// Yield them; the consumer checks [`Revision::is_valid`] and skips.
    #[default]
    Yield,
    /// Drop them inside the iterator.
    Skip,
}

/// Lazy sequence of revisions in `[start, end]` (inclusive), fetched from the
/// source `page_size` detailed entries at a time.
///
/// The cursor and the page buffer are owned by the iterator. Each page starts
/// at the last fetched revision + 1, so no revision is fetched twice; an empty
/// page ends the sequence. After an error has been yielded the iterator stays
/// exhausted.
pub struct RevisionLogIter<'a, S: LogSource + ?Sized> {
    source: &'a S,
    cursor: u64,
    end: u64,
    page_size: usize,
    policy: InvalidRevisionPolicy,
    page: VecDeque<RawLogEntry>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a, S: LogSource + ?Sized> RevisionLogIter<'a, S> {
    pub fn new(source: &'a S, start: u64, end: u64, page_size: usize) -> Self {
        Self {
            source,
            cursor: start,
            end,
            page_size: page_size.max(1),
            policy: InvalidRevisionPolicy::default(),
            page: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    pub fn with_policy(mut self, policy: InvalidRevisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of log pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Fetch the next page. Returns `Ok(false)` at the end of history.
    fn fill_page(&mut self) -> Result<bool, MineError> {
        if self.cursor > self.end {
            return Ok(false);
        }
        debug!(start = self.cursor, end = self.end, limit = self.page_size, "Fetching log page");

        let query = LogQuery::new(
            LogTarget::Repository,
            RevSpec::Number(self.cursor),
            RevSpec::Number(self.end),
        )
        .limit(self.page_size)
        .detailed();
        let entries = self.source.log(&query)?;
        self.pages_fetched += 1;

        let Some(last) = entries.last() else {
            return Ok(false);
        };
        self.cursor = self.cursor.max(last.revision + 1);
        self.page.extend(entries);
        Ok(true)
    }
}

impl<S: LogSource + ?Sized> Iterator for RevisionLogIter<'_, S> {
    type Item = Result<Revision, MineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return None;
            }
            if self.page.is_empty() {
                match self.fill_page() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.exhausted = true;
                        return None;
                    }
                    Err(e) => {
                        self.exhausted = true;
                        return Some(Err(e));
                    }
                }
            }

            let raw = self.page.pop_front()?;
            let revision = Revision::from_raw(raw);
            if self.policy == InvalidRevisionPolicy::Skip && !revision.is_valid() {
                debug!(revision = revision.number, "Skipping revision without timestamp");
                continue;
            }
            return Some(Ok(revision));
        }
    }
}

impl<S: LogSource + ?Sized> std::iter::FusedIterator for RevisionLogIter<'_, S> {}
