//! In-memory repository with Subversion change semantics.
//!
//! A [`MemorySource`] is built from a [`RepoScript`]: an ordered list of
//! commits, each a list of tree operations. Applying the script produces one
//! immutable tree snapshot per revision (revision 0 is the empty tree) and the
//! changed-path list Subversion would report for each commit. Diffs are
//! rendered in Subversion's `Index:` format from the snapshots.
//!
//! ```json
//! {
//!   "root_url": "svn://example.org/repo",
//!   "repo_path": "/",
//!   "commits": [
//!     { "author": "alice", "date": "2024-01-02T10:00:00Z", "message": "import",
//!       "ops": [ { "op": "mkdir", "path": "/trunk" },
//!                { "op": "put", "path": "/trunk/a.txt", "content": "one\n" } ] },
//!     { "author": "bob", "date": "2024-01-03T10:00:00Z", "message": "branch",
//!       "ops": [ { "op": "copy", "from": "/trunk", "from_rev": 1, "to": "/b1" } ] }
//!   ]
//! }
//! ```

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use tracing::debug;

use super::{
    DiffRequest, LogQuery, LogSource, LogTarget, NodeKind, PathInfo, RawChangedPath, RawLogEntry,
    RevSpec, SourceError,
};
use crate::classify::is_textual_content_type;
use crate::error::MineError;
use crate::paths::{base_name, dir_form, is_strict_descendant, is_within, join_url, normalize_path, rebase};
use crate::revlog::ChangeKind;

/// Content-type property consulted for binary detection.
pub const MIME_TYPE_PROPERTY: &str = "svn:mime-type";

const INDEX_RULE: &str = "===================================================================";
const PROPERTY_RULE: &str = "___________________________________________________________________";

// ─── Script ─────────────────────────────────────────────────────────

/// One tree operation inside a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Op {
    Mkdir { path: String },
    /// Create a file or replace its content.
    Put { path: String, content: String },
    /// Remove a path and everything below it.
    Delete { path: String },
    /// Copy a path (and its subtree) as it was at `from_rev`.
    Copy { from: String, from_rev: u64, to: String },
    /// Set a property; a missing value deletes it.
    Propset {
        path: String,
        name: String,
        value: Option<String>,
    },
}

/// One commit of a [`RepoScript`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitScript {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub ops: Vec<Op>,
}

impl CommitScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn mkdir(mut self, path: &str) -> Self {
        self.ops.push(Op::Mkdir { path: path.to_string() });
        self
    }

    pub fn put(mut self, path: &str, content: &str) -> Self {
        self.ops.push(Op::Put {
            path: path.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn delete(mut self, path: &str) -> Self {
        self.ops.push(Op::Delete { path: path.to_string() });
        self
    }

    pub fn copy(mut self, from: &str, from_rev: u64, to: &str) -> Self {
        self.ops.push(Op::Copy {
            from: from.to_string(),
            from_rev,
            to: to.to_string(),
        });
        self
    }

    pub fn propset(mut self, path: &str, name: &str, value: &str) -> Self {
        self.ops.push(Op::Propset {
            path: path.to_string(),
            name: name.to_string(),
            value: Some(value.to_string()),
        });
        self
    }

    pub fn propdel(mut self, path: &str, name: &str) -> Self {
        self.ops.push(Op::Propset {
            path: path.to_string(),
            name: name.to_string(),
            value: None,
        });
        self
    }
}

fn default_repo_path() -> String {
    "/".to_string()
}

/// A whole repository history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoScript {
    pub root_url: String,
    /// Path the miner is pointed at: the root or a subpath of it.
    #[serde(default = "default_repo_path")]
    pub repo_path: String,
    #[serde(default)]
    pub commits: Vec<CommitScript>,
}

impl RepoScript {
    pub fn new(root_url: &str) -> Self {
        Self {
            root_url: root_url.to_string(),
            repo_path: default_repo_path(),
            commits: Vec::new(),
        }
    }

    pub fn repo_path(mut self, path: &str) -> Self {
        self.repo_path = path.to_string();
        self
    }

    pub fn commit(mut self, commit: CommitScript) -> Self {
        self.commits.push(commit);
        self
    }
}

// ─── Tree model ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
struct Node {
    kind: NodeKind,
    content: String,
    props: BTreeMap<String, String>,
}

impl Node {
    fn dir() -> Self {
        Self {
            kind: NodeKind::Dir,
            content: String::new(),
            props: BTreeMap::new(),
        }
    }

    fn file(content: &str) -> Self {
        Self {
            kind: NodeKind::File,
            content: content.to_string(),
            props: BTreeMap::new(),
        }
    }

    fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    fn is_binary(&self) -> bool {
        self.props
            .get(MIME_TYPE_PROPERTY)
            .is_some_and(|m| !m.is_empty() && !is_textual_content_type(m))
    }
}

/// Normalized path (no trailing `/`, root is `/`) → node.
type Tree = BTreeMap<String, Node>;

/// Tree key form of a path.
fn tree_key(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

fn parent_key(key: &str) -> &str {
    match key.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

/// Change recorded for one path while a commit is being applied.
struct PendingChange {
    action: ChangeKind,
    copy_from: Option<(String, u64)>,
}

/// Applies the ops of one commit on top of the previous snapshot and tracks
/// the changed paths the way Subversion reports them.
struct Transaction<'a> {
    snapshots: &'a [Tree],
    tree: Tree,
    pending: BTreeMap<String, PendingChange>,
}

impl<'a> Transaction<'a> {
    fn new(snapshots: &'a [Tree]) -> Self {
        Self {
            snapshots,
            tree: snapshots.last().cloned().unwrap_or_default(),
            pending: BTreeMap::new(),
        }
    }

    fn apply(&mut self, op: &Op) -> Result<(), String> {
        match op {
            Op::Mkdir { path } => {
                let key = tree_key(path);
                if self.tree.contains_key(&key) {
                    return Err(format!("'{}' already exists", key));
                }
                self.check_parent(&key)?;
                self.tree.insert(key.clone(), Node::dir());
                self.record_add(key, None);
            }
            Op::Put { path, content } => {
                let key = tree_key(path);
                match self.tree.get_mut(&key) {
                    Some(node) if node.is_file() => {
                        node.content = content.clone();
                        self.record_modify(key);
                    }
                    Some(_) => return Err(format!("'{}' is a directory", key)),
                    None => {
                        self.check_parent(&key)?;
                        self.tree.insert(key.clone(), Node::file(content));
                        self.record_add(key, None);
                    }
                }
            }
            Op::Delete { path } => {
                let key = tree_key(path);
                if key == "/" {
                    return Err("cannot delete the repository root".to_string());
                }
                if !self.tree.contains_key(&key) {
                    return Err(format!("'{}' does not exist", key));
                }
                self.tree
                    .retain(|k, _| k != &key && !is_strict_descendant(k, &key));
                self.record_delete(key);
            }
            Op::Copy { from, from_rev, to } => {
                let source = self
                    .snapshots
                    .get(*from_rev as usize)
                    .ok_or_else(|| format!("revision {} does not exist yet", from_rev))?;
                let from = tree_key(from);
                if !source.contains_key(&from) {
                    return Err(format!("'{}' does not exist at revision {}", from, from_rev));
                }
                let to = tree_key(to);
                if self.tree.contains_key(&to) {
                    return Err(format!("'{}' already exists", to));
                }
                self.check_parent(&to)?;
                for (path, node) in source.range(from.clone()..) {
                    if path == &from {
                        self.tree.insert(to.clone(), node.clone());
                    } else if is_strict_descendant(path, &from) {
                        if let Some(target) = rebase(path, &from, &to) {
                            self.tree.insert(target, node.clone());
                        }
                    } else if !path.starts_with(&from) {
                        break;
                    }
                }
                self.record_add(to, Some((from, *from_rev)));
            }
            Op::Propset { path, name, value } => {
                let key = tree_key(path);
                let node = self
                    .tree
                    .get_mut(&key)
                    .ok_or_else(|| format!("'{}' does not exist", key))?;
                match value {
                    Some(value) => node.props.insert(name.clone(), value.clone()),
                    None => node.props.remove(name),
                };
                self.record_modify(key);
            }
        }
        Ok(())
    }

    fn check_parent(&self, key: &str) -> Result<(), String> {
        match self.tree.get(parent_key(key)) {
            Some(node) if node.kind == NodeKind::Dir => Ok(()),
            _ => Err(format!("parent of '{}' is not an existing directory", key)),
        }
    }

    /// A path deleted earlier in the same commit comes back as Replaced.
    fn record_add(&mut self, key: String, copy_from: Option<(String, u64)>) {
        let action = match self.pending.get(&key) {
            Some(p) if p.action == ChangeKind::Deleted => ChangeKind::Replaced,
            _ => ChangeKind::Added,
        };
        self.pending.insert(key, PendingChange { action, copy_from });
    }

    /// Paths already recorded keep their action. Paths below a directory
    /// copied in this commit are reported as Modified without ancestry.
    fn record_modify(&mut self, key: String) {
        self.pending.entry(key).or_insert(PendingChange {
            action: ChangeKind::Modified,
            copy_from: None,
        });
    }

    /// Deleting a path added in the same commit cancels both. Changes recorded
    /// below a deleted path are dropped.
    fn record_delete(&mut self, key: String) {
        let previous = self.pending.remove(&key);
        self.pending.retain(|k, _| !is_strict_descendant(k, &key));
        if previous.is_some_and(|p| p.action == ChangeKind::Added) {
            return;
        }
        self.pending.insert(
            key,
            PendingChange {
                action: ChangeKind::Deleted,
                copy_from: None,
            },
        );
    }

    fn finish(self) -> (Tree, Vec<RawChangedPath>) {
        let changed = self
            .pending
            .into_iter()
            .map(|(path, change)| {
                let (copyfrom_path, copyfrom_revision) = match change.copy_from {
                    Some((p, r)) => (Some(p), Some(r)),
                    None => (None, None),
                };
                RawChangedPath {
                    path,
                    action: change.action,
                    copyfrom_path,
                    copyfrom_revision,
                }
            })
            .collect();
        (self.tree, changed)
    }
}

// ─── Source ─────────────────────────────────────────────────────────

struct Commit {
    author: Option<String>,
    date: Option<DateTime<Utc>>,
    message: Option<String>,
    changed: Vec<RawChangedPath>,
}

/// Number of calls served, per capability method.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallStats {
    pub log: usize,
    pub diff: usize,
    pub path_info: usize,
    pub file_content: usize,
}

/// A complete [`LogSource`] over an in-memory history.
pub struct MemorySource {
    root_url: String,
    repo_path: String,
    repo_url: String,
    /// Index = revision number.
    snapshots: Vec<Tree>,
    /// Index = revision number − 1.
    commits: Vec<Commit>,
    calls: Cell<CallStats>,
}

impl MemorySource {
    /// Apply a script. Fails on the first op that cannot be applied.
    pub fn from_script(script: &RepoScript) -> Result<Self, MineError> {
        let root_url = script.root_url.trim_end_matches('/').to_string();
        let repo_path = tree_key(&script.repo_path);

        let mut empty = Tree::new();
        empty.insert("/".to_string(), Node::dir());
        let mut snapshots = vec![empty];
        let mut commits = Vec::with_capacity(script.commits.len());

        for (index, commit) in script.commits.iter().enumerate() {
            let revision = index as u64 + 1;
            let mut tx = Transaction::new(&snapshots);
            for op in &commit.ops {
                tx.apply(op)
                    .map_err(|message| MineError::InvalidScript { revision, message })?;
            }
            let (tree, changed) = tx.finish();
            snapshots.push(tree);
            commits.push(Commit {
                author: commit.author.clone(),
                date: commit.date,
                message: commit.message.clone(),
                changed,
            });
        }

        debug!(root = %root_url, repo_path = %repo_path, head = commits.len(), "Built in-memory repository");
        Ok(Self {
            repo_url: join_url(&root_url, &repo_path),
            root_url,
            repo_path,
            snapshots,
            commits,
            calls: Cell::new(CallStats::default()),
        })
    }

    /// Load a JSON [`RepoScript`] file and apply it.
    pub fn from_script_file(path: &Path) -> Result<Self, MineError> {
        let text = std::fs::read_to_string(path)?;
        let script: RepoScript = serde_json::from_str(&text)?;
        Self::from_script(&script)
    }

    /// Youngest revision (0 for an empty repository).
    pub fn head(&self) -> u64 {
        self.commits.len() as u64
    }

    pub fn repo_path(&self) -> &str {
        &self.repo_path
    }

    pub fn call_stats(&self) -> CallStats {
        self.calls.get()
    }

    fn count_call(&self, bump: impl FnOnce(&mut CallStats)) {
        let mut stats = self.calls.get();
        bump(&mut stats);
        self.calls.set(stats);
    }

    fn resolve(&self, spec: RevSpec) -> Result<u64, SourceError> {
        let head = self.head();
        match spec {
            RevSpec::Head => Ok(head),
            RevSpec::Number(n) if n <= head => Ok(n),
            RevSpec::Number(n) => Err(SourceError::NotFound {
                path: self.repo_path.clone(),
                revision: n,
            }),
            RevSpec::Date(instant) => Ok(self
                .commits
                .iter()
                .zip(1u64..)
                .filter(|(c, _)| c.date.is_some_and(|d| d <= instant))
                .map(|(_, r)| r)
                .last()
                .unwrap_or(0)),
        }
    }

    fn commit(&self, revision: u64) -> Option<&Commit> {
        revision
            .checked_sub(1)
            .and_then(|i| self.commits.get(i as usize))
    }

    /// Revision changed something at or below the repository path.
    fn touches_repo_path(&self, revision: u64) -> bool {
        self.commit(revision)
            .is_some_and(|c| c.changed.iter().any(|p| is_within(&p.path, &self.repo_path)))
    }

    fn snapshot(&self, revision: u64) -> Result<&Tree, SourceError> {
        self.snapshots
            .get(revision as usize)
            .ok_or_else(|| SourceError::NotFound {
                path: self.repo_path.clone(),
                revision,
            })
    }

    fn node(&self, path: &str, revision: u64) -> Result<&Node, SourceError> {
        let key = tree_key(path);
        self.snapshot(revision)?
            .get(&key)
            .ok_or(SourceError::NotFound { path: key, revision })
    }

    fn revision_diff(&self, revision: u64) -> Result<String, fmt::Error> {
        let (Some(old), Some(new)) = (
            revision.checked_sub(1).and_then(|r| self.snapshots.get(r as usize)),
            self.snapshots.get(revision as usize),
        ) else {
            return Ok(String::new());
        };

        let base = dir_form(&self.repo_path);
        let paths: BTreeSet<&String> = old
            .keys()
            .chain(new.keys())
            .filter(|p| is_within(p, &self.repo_path))
            .collect();

        let mut out = String::new();
        for path in paths {
            let name = match path.strip_prefix(base.as_str()) {
                Some("") | None => ".",
                Some(relative) => relative,
            };
            let sides = DiffSides {
                old: old.get(path),
                old_revision: revision - 1,
                new: new.get(path),
                new_revision: revision,
            };
            write_node_diff(&mut out, name, &sides)?;
        }
        Ok(out)
    }

    fn path_diff(
        &self,
        path: &str,
        revision: u64,
        prev_path: &str,
        prev_revision: u64,
    ) -> Result<String, SourceError> {
        let new = self.node(path, revision)?;
        let old = self.node(prev_path, prev_revision)?;
        let mut out = String::new();
        if new.is_file() && old.is_file() {
            let sides = DiffSides {
                old: Some(old),
                old_revision: prev_revision,
                new: Some(new),
                new_revision: revision,
            };
            write_node_diff(&mut out, base_name(&tree_key(path)), &sides)
                .map_err(|e| SourceError::Transient(e.to_string()))?;
        }
        Ok(out)
    }
}

impl LogSource for MemorySource {
    fn root_url(&self) -> Result<String, SourceError> {
        Ok(self.root_url.clone())
    }

    fn repo_url(&self) -> &str {
        &self.repo_url
    }

    fn is_local(&self) -> bool {
        self.root_url.starts_with("file://")
    }

    fn log(&self, query: &LogQuery) -> Result<Vec<RawLogEntry>, SourceError> {
        self.count_call(|c| c.log += 1);
        let start = self.resolve(query.start)?;
        let end = self.resolve(query.end)?;
        let revisions: Vec<u64> = if start <= end {
            (start..=end).collect()
        } else {
            (end..=start).rev().collect()
        };

        let entries: Vec<RawLogEntry> = revisions
            .into_iter()
            .filter(|&r| r > 0)
            .filter(|&r| query.target == LogTarget::Root || self.touches_repo_path(r))
            .take(query.limit.unwrap_or(usize::MAX))
            .filter_map(|r| {
                let commit = self.commit(r)?;
                Some(RawLogEntry {
                    revision: r,
                    author: commit.author.clone(),
                    date: commit.date,
                    message: commit.message.clone(),
                    changed_paths: if query.detailed {
                        commit.changed.clone()
                    } else {
                        Vec::new()
                    },
                })
            })
            .collect();

        debug!(start, end, target = ?query.target, returned = entries.len(), "log");
        Ok(entries)
    }

    fn diff(&self, request: &DiffRequest) -> Result<Vec<u8>, SourceError> {
        self.count_call(|c| c.diff += 1);
        let text = match request {
            DiffRequest::Revision { revision } => {
                if *revision == 0 || *revision > self.head() {
                    return Err(SourceError::NotFound {
                        path: self.repo_path.clone(),
                        revision: *revision,
                    });
                }
                self.revision_diff(*revision)
                    .map_err(|e| SourceError::Transient(e.to_string()))?
            }
            DiffRequest::Path {
                path,
                revision,
                prev_path,
                prev_revision,
            } => {
                let prev_path = prev_path.as_deref().unwrap_or(path);
                let prev_revision = prev_revision.unwrap_or(revision.saturating_sub(1));
                self.path_diff(path, *revision, prev_path, prev_revision)?
            }
        };
        Ok(text.into_bytes())
    }

    fn path_info(&self, path: &str, revision: u64) -> Result<PathInfo, SourceError> {
        self.count_call(|c| c.path_info += 1);
        let node = self.node(path, revision)?;
        Ok(PathInfo {
            kind: node.kind,
            content_type: node.props.get(MIME_TYPE_PROPERTY).cloned(),
        })
    }

    fn file_content(&self, path: &str, revision: u64) -> Result<Vec<u8>, SourceError> {
        self.count_call(|c| c.file_content += 1);
        let node = self.node(path, revision)?;
        if !node.is_file() {
            return Err(SourceError::NotFound {
                path: tree_key(path),
                revision,
            });
        }
        Ok(node.content.as_bytes().to_vec())
    }
}

// ─── Diff rendering ─────────────────────────────────────────────────

struct DiffSides<'a> {
    old: Option<&'a Node>,
    old_revision: u64,
    new: Option<&'a Node>,
    new_revision: u64,
}

/// Content section (files only) followed by a property section, each emitted
/// only when something changed.
fn write_node_diff(out: &mut String, name: &str, sides: &DiffSides<'_>) -> fmt::Result {
    let old_file = sides.old.filter(|n| n.is_file());
    let new_file = sides.new.filter(|n| n.is_file());
    let content_changed = match (old_file, new_file) {
        (None, None) => false,
        (Some(a), Some(b)) => a.content != b.content,
        _ => true,
    };
    if content_changed {
        write_content_section(out, name, sides, old_file, new_file)?;
    }
    write_property_section(out, name, sides.old, sides.new)
}

fn write_content_section(
    out: &mut String,
    name: &str,
    sides: &DiffSides<'_>,
    old_file: Option<&Node>,
    new_file: Option<&Node>,
) -> fmt::Result {
    writeln!(out, "Index: {}", name)?;
    writeln!(out, "{}", INDEX_RULE)?;

    if old_file.is_some_and(Node::is_binary) || new_file.is_some_and(Node::is_binary) {
        let mime = new_file
            .or(old_file)
            .and_then(|n| n.props.get(MIME_TYPE_PROPERTY))
            .map_or("application/octet-stream", String::as_str);
        writeln!(out, "Cannot display: file marked as a binary type.")?;
        return writeln!(out, "svn:mime-type = {}", mime);
    }

    let label = |node: Option<&Node>, revision: u64| match node {
        Some(_) => format!("(revision {})", revision),
        None => "(nonexistent)".to_string(),
    };
    writeln!(out, "--- {}\t{}", name, label(old_file, sides.old_revision))?;
    writeln!(out, "+++ {}\t{}", name, label(new_file, sides.new_revision))?;

    let old_text = old_file.map_or("", |n| n.content.as_str());
    let new_text = new_file.map_or("", |n| n.content.as_str());
    let diff = TextDiff::from_lines(old_text, new_text);
    let mut unified = diff.unified_diff();
    unified.context_radius(3);
    for hunk in unified.iter_hunks() {
        write!(out, "{}", hunk)?;
    }
    Ok(())
}

fn write_property_section(
    out: &mut String,
    name: &str,
    old: Option<&Node>,
    new: Option<&Node>,
) -> fmt::Result {
    let empty = BTreeMap::new();
    let old = old.map_or(&empty, |n| &n.props);
    let new = new.map_or(&empty, |n| &n.props);
    let changed: Vec<&String> = old
        .keys()
        .chain(new.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|p| old.get(*p) != new.get(*p))
        .collect();
    if changed.is_empty() {
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "Property changes on: {}", name)?;
    writeln!(out, "{}", PROPERTY_RULE)?;
    for prop in changed {
        match (old.get(prop), new.get(prop)) {
            (None, Some(value)) => {
                writeln!(out, "Added: {}", prop)?;
                writeln!(out, "## -0,0 +1 ##")?;
                write_prefixed(out, '+', value)?;
            }
            (Some(before), Some(after)) => {
                writeln!(out, "Modified: {}", prop)?;
                writeln!(out, "## -1 +1 ##")?;
                write_prefixed(out, '-', before)?;
                write_prefixed(out, '+', after)?;
            }
            (Some(before), None) => {
                writeln!(out, "Deleted: {}", prop)?;
                writeln!(out, "## -1 +0,0 ##")?;
                write_prefixed(out, '-', before)?;
            }
            (None, None) => {}
        }
    }
    Ok(())
}

fn write_prefixed(out: &mut String, prefix: char, value: &str) -> fmt::Result {
    for line in value.lines() {
        writeln!(out, "{}{}", prefix, line)?;
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
