//! Unified error type for the log miner.

use thiserror::Error;

use crate::source::SourceError;

/// All errors that can occur while mining a revision log.
#[derive(Error, Debug)]
pub enum MineError {
    /// Network/auth failure reported by the log source. Fatal to the current run.
    #[error("Repository source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),

    /// A path/revision lookup the pipeline cannot recover from.
    #[error("Path '{path}' not found at revision {revision}")]
    PathNotFound { path: String, revision: u64 },

    /// Range resolution found no applicable revisions.
    #[error("No history found for '{path}' in the requested range")]
    NoHistoryFound { path: String },

    /// Diff/content lookup against an inferred previous identity failed.
    /// Recovered locally by the line counter, never returned from a run.
    #[error("Ambiguous ancestry for '{path}' at revision {revision}")]
    AmbiguousAncestry { path: String, revision: u64 },

    /// Revision record has no commit timestamp and must not be persisted.
    #[error("Revision {0} has no commit timestamp")]
    InvalidRevision(u64),

    /// I/O error (sink, config or repository script access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid excluded-path pattern
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Date argument that is not a valid YYYY-MM-DD calendar date
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Repository script op that cannot be applied (missing path, duplicate add, ...)
    #[error("Invalid repository script at revision {revision}: {message}")]
    InvalidScript { revision: u64, message: String },

    /// Failed to load a configuration file
    #[error("Failed to load config from {path}: {message}")]
    Config { path: String, message: String },

    /// Mutually exclusive flags or other argument validation error
    #[error("{0}")]
    InvalidArgs(String),
}

impl From<SourceError> for MineError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound { path, revision } => MineError::PathNotFound { path, revision },
            other => MineError::SourceUnavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_path_not_found() {
        let err: MineError = SourceError::NotFound {
            path: "/trunk/a.c".to_string(),
            revision: 7,
        }
        .into();
        assert!(matches!(err, MineError::PathNotFound { revision: 7, .. }));
        assert!(err.to_string().contains("/trunk/a.c"));
    }

    #[test]
    fn test_unauthorized_maps_to_source_unavailable() {
        let err: MineError = SourceError::Unauthorized("bad credentials".to_string()).into();
        assert!(matches!(err, MineError::SourceUnavailable(_)));
        assert!(err.to_string().contains("bad credentials"));
    }

    #[test]
    fn test_transient_maps_to_source_unavailable() {
        let err: MineError = SourceError::Transient("connection reset".to_string()).into();
        assert!(matches!(err, MineError::SourceUnavailable(SourceError::Transient(_))));
    }

    #[test]
    fn test_no_history_display() {
        let err = MineError::NoHistoryFound {
            path: "/branches/b1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/branches/b1"));
        assert!(msg.contains("No history"));
    }

    #[test]
    fn test_invalid_regex_display() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err = MineError::InvalidRegex {
            pattern: "[invalid".to_string(),
            source: regex_err,
        };
        assert!(err.to_string().contains("[invalid"));
    }

    #[test]
    fn test_io_error_from_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let mine_err: MineError = io_err.into();
        assert!(matches!(mine_err, MineError::Io(_)));
    }
}
