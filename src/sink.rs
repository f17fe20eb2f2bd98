//! Append-only JSON-lines revision store.
//!
//! Every line is one tagged record:
//!
//! ```text
//! {"type":"path","id":0,"path":"/trunk/a.txt"}
//! {"type":"revision","revision":7,"author":"alice","date":"…","message":"…",
//!  "files":{"added":1,"changed":0,"deleted":0},
//!  "changes":[{"path":0,"change":"added","kind":"file","added":12,"deleted":0}]}
//! ```
//!
//! Path strings are interned: a `path` line is written the first time a path
//! appears and revision lines refer to it by id. All lines of one revision go
//! out in a single write followed by `sync_data`, so the last complete
//! revision line is the resume checkpoint.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::MineError;
use crate::revlog::{ChangeKind, ChangedFileCounts, CopyOrigin, PathKind, Revision};

// ─── Records ────────────────────────────────────────────────────────

/// One line of the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Record {
    Path { id: u32, path: String },
    Revision(StoredRevision),
}

/// A revision as persisted, with paths replaced by ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRevision {
    pub revision: u64,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub files: ChangedFileCounts,
    pub changes: Vec<StoredChange>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChange {
    pub path: u32,
    pub change: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<PathKind>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub copy_from: Option<StoredCopyFrom>,
    pub added: u32,
    pub deleted: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCopyFrom {
    pub path: u32,
    pub revision: u64,
    pub origin: CopyOrigin,
}

// ─── Sink ───────────────────────────────────────────────────────────

/// Open JSON-lines store. Holds the path table and the checkpoint.
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
    path_ids: HashMap<String, u32>,
    last_stored: u64,
    revisions_stored: usize,
}

impl JsonLinesSink {
    /// Open (or create) a store and replay it. A torn or unreadable tail is
    /// cut off at the last complete record.
    pub fn open(path: &Path) -> Result<Self, MineError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut sink = Self {
            path: path.to_path_buf(),
            file,
            path_ids: HashMap::new(),
            last_stored: 0,
            revisions_stored: 0,
        };
        let valid_len = sink.replay(&bytes);
        if valid_len < bytes.len() {
            warn!(
                path = %path.display(),
                kept = valid_len,
                dropped = bytes.len() - valid_len,
                "Truncating incomplete tail of revision store"
            );
            sink.file.set_len(valid_len as u64)?;
            sink.file.sync_data()?;
        }
        sink.file.seek(SeekFrom::End(0))?;

        info!(
            path = %path.display(),
            revisions = sink.revisions_stored,
            paths = sink.path_ids.len(),
            checkpoint = sink.last_stored,
            "Opened revision store"
        );
        Ok(sink)
    }

    /// Rebuild the path table and the checkpoint. Returns the length of the
    /// prefix made of complete, consistent records.
    fn replay(&mut self, bytes: &[u8]) -> usize {
        let mut offset = 0;
        while offset < bytes.len() {
            let Some(newline) = bytes[offset..].iter().position(|&b| b == b'\n') else {
                break;
            };
            let line = &bytes[offset..offset + newline];
            let record = match serde_json::from_slice::<Record>(line) {
                Ok(record) => record,
                Err(e) => {
                    debug!(offset, error = %e, "Unreadable record");
                    break;
                }
            };
            if !self.apply_replayed(record) {
                debug!(offset, "Inconsistent record");
                break;
            }
            offset += newline + 1;
        }
        offset
    }

    fn apply_replayed(&mut self, record: Record) -> bool {
        match record {
            Record::Path { id, path } => {
                if id as usize != self.path_ids.len() || self.path_ids.contains_key(&path) {
                    return false;
                }
                self.path_ids.insert(path, id);
            }
            Record::Revision(stored) => {
                let known = self.path_ids.len() as u32;
                let refs_known = stored.changes.iter().all(|c| {
                    c.path < known && c.copy_from.as_ref().is_none_or(|cf| cf.path < known)
                });
                if stored.revision <= self.last_stored || !refs_known {
                    return false;
                }
                self.last_stored = stored.revision;
                self.revisions_stored += 1;
            }
        }
        true
    }

    /// Persist one revision. Refuses records without a timestamp and
    /// revisions not after the checkpoint.
    pub fn store(&mut self, revision: &Revision) -> Result<(), MineError> {
        let date = revision.date.ok_or(MineError::InvalidRevision(revision.number))?;
        if revision.number <= self.last_stored {
            return Err(MineError::InvalidArgs(format!(
                "Revision {} is not after the last stored revision {}",
                revision.number, self.last_stored
            )));
        }

        let mut new_paths: Vec<(String, u32)> = Vec::new();
        let mut intern = |path: &str| -> u32 {
            if let Some(&id) = self.path_ids.get(path) {
                return id;
            }
            if let Some((_, id)) = new_paths.iter().find(|(p, _)| p == path) {
                return *id;
            }
            let id = (self.path_ids.len() + new_paths.len()) as u32;
            new_paths.push((path.to_string(), id));
            id
        };

        let changes: Vec<StoredChange> = revision
            .changes
            .iter()
            .map(|entry| StoredChange {
                path: intern(&entry.path),
                change: entry.change,
                kind: entry.path_kind,
                copy_from: entry.copy_from.as_ref().map(|cf| StoredCopyFrom {
                    path: intern(&cf.path),
                    revision: cf.revision,
                    origin: cf.origin,
                }),
                added: entry.counts.added,
                deleted: entry.counts.deleted,
            })
            .collect();

        let stored = StoredRevision {
            revision: revision.number,
            author: revision.author.clone(),
            date,
            message: revision.message.clone(),
            files: revision.file_counts(),
            changes,
        };

        let mut buf = Vec::new();
        for (path, id) in &new_paths {
            serde_json::to_writer(&mut buf, &Record::Path { id: *id, path: path.clone() })?;
            buf.push(b'\n');
        }
        serde_json::to_writer(&mut buf, &Record::Revision(stored))?;
        buf.push(b'\n');

        self.file.write_all(&buf)?;
        self.file.flush()?;
        self.file.sync_data()?;

        let added_paths = new_paths.len();
        self.path_ids.extend(new_paths);
        self.last_stored = revision.number;
        self.revisions_stored += 1;
        debug!(revision = revision.number, new_paths = added_paths, bytes = buf.len(), "Stored revision");
        Ok(())
    }

    /// Last stored revision number, 0 for an empty store.
    pub fn last_stored_revision(&self) -> u64 {
        self.last_stored
    }

    pub fn revisions_stored(&self) -> usize {
        self.revisions_stored
    }

    pub fn path_count(&self) -> usize {
        self.path_ids.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every record of a store, stopping at the first incomplete line.
pub fn read_records(path: &Path) -> Result<Vec<Record>, MineError> {
    let text = std::fs::read_to_string(path)?;
    let mut records = Vec::new();
    for line in text.split_inclusive('\n') {
        let Some(line) = line.strip_suffix('\n') else {
            break;
        };
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
