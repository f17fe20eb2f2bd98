//! Unified-diff line counting.
//!
//! Turns a Subversion-style diff stream (possibly covering many files) into a
//! per-file [`LineCounts`] map keyed by normalized path.
//!
//! ## Format
//!
//! ```text
//! Index: trunk/a.txt
//! ===================================================================
//! --- trunk/a.txt	(revision 4)
//! +++ trunk/a.txt	(revision 5)
//! @@ -1,3 +1,4 @@
//! -old
//! +new
//!
//! Property changes on: trunk/a.txt
//! ___________________________________________________________________
//! Added: svn:eol-style
//! ## -0,0 +1 ##
//! +native
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::decode_text;
use crate::paths::normalize_path;

// ─── Constants ──────────────────────────────────────────────────────

/// Starts a content section.
const INDEX_PREFIX: &str = "Index: ";

/// Starts a property-only section.
const PROPERTY_PREFIX: &str = "Property changes on: ";

/// Structural lines that never count as content.
const MARKER_PREFIXES: [&str; 4] = ["---", "+++", "@@", "==="];

// ─── Types ──────────────────────────────────────────────────────────

/// Lines added and deleted in one file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCounts {
    pub added: u32,
    pub deleted: u32,
}

impl LineCounts {
    pub fn new(added: u32, deleted: u32) -> Self {
        Self { added, deleted }
    }
}

impl Add for LineCounts {
    type Output = LineCounts;

    fn add(self, rhs: LineCounts) -> LineCounts {
        LineCounts {
            added: self.added + rhs.added,
            deleted: self.deleted + rhs.deleted,
        }
    }
}

/// Normalized file path → line counts for one diff stream.
pub type DiffCountMap = BTreeMap<String, LineCounts>;

// ─── Accumulator ────────────────────────────────────────────────────

enum Section {
    /// Before the first header.
    None,
    Content { path: String, counts: LineCounts },
    /// `+`/`-` lines here are property values, not file content.
    Property,
}

/// Accumulates counts while a diff is fed line by line.
/// Converted to a [`DiffCountMap`] by [`DiffCounter::finish`].
pub struct DiffCounter {
    counts: DiffCountMap,
    section: Section,
}

impl Default for DiffCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCounter {
    pub fn new() -> Self {
        Self {
            counts: DiffCountMap::new(),
            section: Section::None,
        }
    }

    /// Commit the current content section, if any.
    fn commit(&mut self) {
        if let Section::Content { path, counts } = std::mem::replace(&mut self.section, Section::None) {
            self.counts.insert(path, counts);
        }
    }

    /// Feed one line (with or without its line terminator).
    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim_end();

        if let Some(path) = line.strip_prefix(INDEX_PREFIX) {
            self.commit();
            self.section = Section::Content {
                path: normalize_path(path),
                counts: LineCounts::default(),
            };
            return;
        }

        if let Some(path) = line.strip_prefix(PROPERTY_PREFIX) {
            self.commit();
            self.counts.entry(normalize_path(path)).or_default();
            self.section = Section::Property;
            return;
        }

        if MARKER_PREFIXES.iter().any(|m| line.starts_with(m)) {
            return;
        }

        if let Section::Content { counts, .. } = &mut self.section {
            if line.starts_with('-') {
                counts.deleted += 1;
            } else if line.starts_with('+') {
                counts.added += 1;
            }
        }
    }

    /// Commit the last section and return the map.
    pub fn finish(mut self) -> DiffCountMap {
        self.commit();
        self.counts
    }
}

// ─── Entry points ───────────────────────────────────────────────────

/// Count added/deleted lines per file in a raw diff.
///
/// Each line is coerced to text on its own (UTF-8, else Latin-1), so one
/// badly encoded file does not garble the rest of the stream.
#[must_use]
pub fn parse_diff_counts(raw: &[u8]) -> DiffCountMap {
    let mut counter = DiffCounter::new();
    for line in raw.split(|&b| b == b'\n') {
        counter.feed_line(&decode_text(line));
    }
    counter.finish()
}

/// Streaming form of [`parse_diff_counts`].
pub fn parse_diff_stream(mut reader: impl BufRead) -> std::io::Result<DiffCountMap> {
    let mut counter = DiffCounter::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        counter.feed_line(&decode_text(&buf));
    }
    Ok(counter.finish())
}

/// Reduce a single-path diff to one count. The section name in a single-path
/// diff is the file's base name, not its repository path, so the sections are
/// summed instead of looked up.
#[must_use]
pub fn single_file_counts(map: &DiffCountMap) -> LineCounts {
    map.values().fold(LineCounts::default(), |acc, c| acc + *c)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
