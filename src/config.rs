//! Miner configuration: defaults, JSON config file, excluded-path patterns.
//!
//! Lookup order: explicit `--config` path, then
//! `<config dir>/revmine/config.json` if it exists, then built-in defaults.
//! Command-line flags are applied on top by the CLI.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MineError;
use crate::revlog::InvalidRevisionPolicy;
use crate::{DEFAULT_BINARY_EXTENSIONS, DEFAULT_PAGE_SIZE};

/// Per-revision thresholds above which a whole-revision diff is not used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WholeRevisionLimits {
    pub max_added: u32,
    pub max_deleted: u32,
    pub max_changed: u32,
}

impl Default for WholeRevisionLimits {
    fn default() -> Self {
        Self {
            max_added: 1,
            max_deleted: 1,
            max_changed: 5,
        }
    }
}

/// Everything the miner core can be configured with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MineConfig {
    /// Extensions (with or without the leading dot) treated as binary.
    pub binary_extensions: Vec<String>,
    /// Detailed log entries per server round-trip.
    pub page_size: usize,
    /// Regex patterns; matching change entries are skipped.
    pub exclude: Vec<String>,
    /// Whether the iterator yields or drops timestamp-less revisions.
    pub invalid_revisions: InvalidRevisionPolicy,
    pub whole_revision: WholeRevisionLimits,
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            binary_extensions: DEFAULT_BINARY_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            page_size: DEFAULT_PAGE_SIZE,
            exclude: Vec::new(),
            invalid_revisions: InvalidRevisionPolicy::default(),
            whole_revision: WholeRevisionLimits::default(),
        }
    }
}

impl MineConfig {
    /// Default config file location: `<config dir>/revmine/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("revmine").join("config.json"))
    }

    /// Load a config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, MineError> {
        let text = std::fs::read_to_string(path).map_err(|e| MineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| MineError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if config.page_size == 0 {
            return Err(MineError::Config {
                path: path.display().to_string(),
                message: "page_size must be at least 1".to_string(),
            });
        }
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Explicit path if given (must exist), else the default location if it
    /// exists, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, MineError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Compile the exclusion patterns.
    pub fn exclude_filter(&self) -> Result<ExcludeFilter, MineError> {
        ExcludeFilter::new(&self.exclude)
    }
}

// ─── Excluded paths ─────────────────────────────────────────────────

/// Compiled excluded-path patterns. A path is excluded if any pattern matches
/// anywhere in it.
#[derive(Clone, Debug, Default)]
pub struct ExcludeFilter {
    patterns: Vec<Regex>,
}

impl ExcludeFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, MineError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| MineError::InvalidRegex {
                    pattern: p.as_ref().to_string(),
                    source: e,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }
}
