//! Fault injection for tests: wraps a [`MemorySource`] and fails selected calls.

use std::cell::Cell;

use super::memory::MemorySource;
use super::{DiffRequest, LogQuery, LogSource, PathInfo, RawLogEntry, SourceError};

pub struct FaultySource {
    inner: MemorySource,
    /// Log calls with this 0-based index or later fail.
    log_fails_from: Option<usize>,
    log_calls: Cell<usize>,
    error: SourceError,
    fail_path_info: bool,
    fail_diff: bool,
    fail_content: bool,
}

impl FaultySource {
    pub fn new(inner: MemorySource, error: SourceError) -> Self {
        Self {
            inner,
            log_fails_from: None,
            log_calls: Cell::new(0),
            error,
            fail_path_info: false,
            fail_diff: false,
            fail_content: false,
        }
    }

    pub fn fail_log_from(mut self, call: usize) -> Self {
        self.log_fails_from = Some(call);
        self
    }

    pub fn fail_path_info(mut self) -> Self {
        self.fail_path_info = true;
        self
    }

    pub fn fail_diff(mut self) -> Self {
        self.fail_diff = true;
        self
    }

    pub fn fail_content(mut self) -> Self {
        self.fail_content = true;
        self
    }

    pub fn log_calls(&self) -> usize {
        self.log_calls.get()
    }
}

impl LogSource for FaultySource {
    fn root_url(&self) -> Result<String, SourceError> {
        self.inner.root_url()
    }

    fn repo_url(&self) -> &str {
        self.inner.repo_url()
    }

    fn is_local(&self) -> bool {
        self.inner.is_local()
    }

    fn log(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, SourceError> {
        let call = self.log_calls.get();
        self.log_calls.set(call + 1);
        if self.log_fails_from.is_some_and(|from| call >= from) {
            return Err(self.error.clone());
        }
        self.inner.log(query)
    }

    fn diff(&self, request: &DiffRequest) -> Result<Vec<u8>, SourceError> {
        if self.fail_diff {
            return Err(self.error.clone());
        }
        self.inner.diff(request)
    }

    fn path_info(&self, path: &str, revision: u64) -> Result<PathInfo, SourceError> {
        if self.fail_path_info {
            return Err(self.error.clone());
        }
        self.inner.path_info(path, revision)
    }

    fn file_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, SourceError> {
        if self.fail_content {
            return Err(self.error.clone());
        }
        self.inner.file_content(path, revision)
    }
}
