//! File/directory classification and binary detection.
//!
//! Both answer questions about a change entry by asking the log source for
//! path metadata. A deleted path no longer exists at its own revision, so it
//! is probed at its previous identity instead (see [`probe_identity`]).

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::MineError;
use crate::paths::extension;
use crate::revlog::{ChangeEntry, ChangeKind, PathKind};
use crate::source::{LogSource, NodeKind, SourceError};

/// Path and revision at which an entry's metadata can be looked up: the
/// previous identity for deletions, the entry itself otherwise.
pub fn probe_identity(entry: &ChangeEntry, revision: u64) -> (&str, u64) {
    if entry.change == ChangeKind::Deleted {
        (entry.prev_path(), entry.prev_revision(revision))
    } else {
        (entry.path.as_str(), revision)
    }
}

/// Check if a content type denotes text, using the VCS's own rule: anything
/// under `text/`, plus the two X bitmap formats.
pub fn is_textual_content_type(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type == "image/x-xbitmap"
        || content_type == "image/x-xpixmap"
}

// ─── File / directory ───────────────────────────────────────────────

/// Decides whether a change entry is a file or a directory.
///
/// A lookup failing with "not found" means "not a directory"; other source
/// failures propagate. Answers are cached per (probed path, probed revision)
/// for the lifetime of the classifier.
pub struct PathClassifier<'a, S: LogSource + ?Sized> {
    source: &'a S,
    cache: HashMap<(String, u64), PathKind>,
}

impl<'a, S: LogSource + ?Sized> PathClassifier<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    pub fn classify(&mut self, entry: &ChangeEntry, revision: u64) -> Result<PathKind, MineError> {
        if let Some(kind) = entry.path_kind {
            return Ok(kind);
        }
        let (path, probe_revision) = probe_identity(entry, revision);
        let key = (path.trim_end_matches('/').to_string(), probe_revision);
        if let Some(kind) = self.cache.get(&key) {
            return Ok(*kind);
        }

        let kind = match self.source.path_info(path, probe_revision) {
            Ok(info) if info.kind == NodeKind::Dir => PathKind::Directory,
            Ok(_) => PathKind::File,
            Err(SourceError::NotFound { .. }) => PathKind::File,
            Err(e) => return Err(e.into()),
        };
        trace!(path, revision = probe_revision, ?kind, "Classified path");
        self.cache.insert(key, kind);
        Ok(kind)
    }

    /// Number of cached answers.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

// ─── Binary detection ───────────────────────────────────────────────

/// Decides whether a file is binary: by extension first, then by the
/// server-side content-type property.
#[derive(Clone, Debug)]
pub struct BinaryDetector {
    /// Lower-cased, with the leading dot.
    extensions: HashSet<String>,
}

impl BinaryDetector {
    /// Extensions may be given with or without the leading dot, in any case.
    pub fn new<T: AsRef<str>>(extensions: &[T]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.as_ref().trim())
            .filter(|e| !e.is_empty())
            .map(|e| {
                if e.starts_with('.') {
                    e.to_lowercase()
                } else {
                    format!(".{}", e.to_lowercase())
                }
            })
            .collect();
        Self { extensions }
    }

    /// Case-insensitive extension match.
    pub fn has_binary_extension(&self, path: &str) -> bool {
        extension(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Extension match, else a non-empty, non-textual content type.
    /// A path missing at that revision is not binary.
    pub fn is_binary<S: LogSource + ?Sized>(
        &self,
        source: &S,
        path: &str,
        revision: u64,
    ) -> Result<bool, MineError> {
        if self.has_binary_extension(path) {
            return Ok(true);
        }
        let info = match source.path_info(path, revision) {
            Ok(info) => info,
            Err(SourceError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        Ok(info
            .content_type
            .as_deref()
            .map(str::trim)
            .is_some_and(|ct| !ct.is_empty() && !is_textual_content_type(ct)))
    }

    /// [`BinaryDetector::is_binary`] at the entry's probe identity.
    pub fn is_binary_entry<S: LogSource + ?Sized>(
        &self,
        source: &S,
        entry: &ChangeEntry,
        revision: u64,
    ) -> Result<bool, MineError> {
        let (path, probe_revision) = probe_identity(entry, revision);
        self.is_binary(source, path, probe_revision)
    }
}

impl Default for BinaryDetector {
    fn default() -> Self {
        Self::new(crate::DEFAULT_BINARY_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::{CommitScript, MemorySource, RepoScript};
    use crate::source::testing::FaultySource;

    fn repo() -> MemorySource {
        let script = RepoScript::new("svn://example.org/repo")
            .commit(
                CommitScript::new()
                    .author("alice")
                    .mkdir("/trunk")
                    .mkdir("/trunk/sub")
                    .put("/trunk/sub/a.txt", "one\n")
                    .put("/trunk/Makefile", "all:\n")
                    .put("/trunk/logo", "\u{1}\u{2}")
                    .propset("/trunk/logo", "svn:mime-type", "application/octet-stream")
                    .put("/trunk/icon", "/* XPM */\n")
                    .propset("/trunk/icon", "svn:mime-type", "image/x-xpixmap"),
            )
            .commit(CommitScript::new().author("bob").delete("/trunk/sub"));
        MemorySource::from_script(&script).unwrap()
    }

    #[test]
    fn test_classify_file_and_directory() {
        let source = repo();
        let mut classifier = PathClassifier::new(&source);
        let dir = ChangeEntry::new("/trunk/sub", ChangeKind::Added);
        let file = ChangeEntry::new("/trunk/sub/a.txt", ChangeKind::Added);
        assert_eq!(classifier.classify(&dir, 1).unwrap(), PathKind::Directory);
        assert_eq!(classifier.classify(&file, 1).unwrap(), PathKind::File);
    }

    #[test]
    fn test_deleted_directory_probed_at_previous_revision() {
        let source = repo();
        let mut classifier = PathClassifier::new(&source);
        let deleted = ChangeEntry::new("/trunk/sub", ChangeKind::Deleted);
        assert_eq!(classifier.classify(&deleted, 2).unwrap(), PathKind::Directory);
    }

    #[test]
    fn test_missing_path_is_not_a_directory() {
        let source = repo();
        let mut classifier = PathClassifier::new(&source);
        let ghost = ChangeEntry::new("/trunk/ghost", ChangeKind::Modified);
        assert_eq!(classifier.classify(&ghost, 1).unwrap(), PathKind::File);
    }

    #[test]
    fn test_classification_is_cached() {
        let source = repo();
        let mut classifier = PathClassifier::new(&source);
        let dir = ChangeEntry::new("/trunk", ChangeKind::Added);
        classifier.classify(&dir, 1).unwrap();
        let calls = source.call_stats().path_info;
        classifier.classify(&dir, 1).unwrap();
        assert_eq!(source.call_stats().path_info, calls);
        assert_eq!(classifier.cached(), 1);
    }

    #[test]
    fn test_known_kind_is_not_resolved_again() {
        let source = repo();
        let mut classifier = PathClassifier::new(&source);
        let entry = ChangeEntry::new("/trunk", ChangeKind::Added).with_path_kind(PathKind::File);
        assert_eq!(classifier.classify(&entry, 1).unwrap(), PathKind::File);
        assert_eq!(source.call_stats().path_info, 0);
    }

    #[test]
    fn test_unauthorized_propagates() {
        let source = FaultySource::new(repo(), SourceError::Unauthorized("denied".to_string()))
            .fail_path_info();
        let mut classifier = PathClassifier::new(&source);
        let entry = ChangeEntry::new("/trunk", ChangeKind::Added);
        let err = classifier.classify(&entry, 1).unwrap_err();
        assert!(matches!(err, MineError::SourceUnavailable(SourceError::Unauthorized(_))));
    }

    #[test]
    fn test_binary_by_extension_without_server_call() {
        let source = repo();
        let detector = BinaryDetector::default();
        assert!(detector.is_binary(&source, "/trunk/setup.exe", 1).unwrap());
        assert!(detector.is_binary(&source, "/trunk/SETUP.EXE", 1).unwrap());
        assert_eq!(source.call_stats().path_info, 0);
    }

    #[test]
    fn test_extensionless_file_without_property_is_text() {
        let source = repo();
        let detector = BinaryDetector::default();
        assert!(!detector.is_binary(&source, "/trunk/Makefile", 1).unwrap());
    }

    #[test]
    fn test_binary_by_content_type() {
        let source = repo();
        let detector = BinaryDetector::default();
        assert!(detector.is_binary(&source, "/trunk/logo", 1).unwrap());
        assert!(!detector.is_binary(&source, "/trunk/icon", 1).unwrap());
    }

    #[test]
    fn test_binary_check_of_deleted_entry_uses_previous_identity() {
        let source = MemorySource::from_script(
            &RepoScript::new("svn://example.org/repo")
                .commit(
                    CommitScript::new()
                        .put("/blob", "x")
                        .propset("/blob", "svn:mime-type", "application/x-thing"),
                )
                .commit(CommitScript::new().delete("/blob")),
        )
        .unwrap();
        let detector = BinaryDetector::default();
        let deleted = ChangeEntry::new("/blob", ChangeKind::Deleted);
        assert!(detector.is_binary_entry(&source, &deleted, 2).unwrap());
    }

    #[test]
    fn test_extension_list_normalization() {
        let detector = BinaryDetector::new(&[".DLL", "psd", " ", "Tar"]);
        assert!(detector.has_binary_extension("/lib/x.dll"));
        assert!(detector.has_binary_extension("/art/cover.PSD"));
        assert!(detector.has_binary_extension("/dist/a.tar"));
        assert!(!detector.has_binary_extension("/src/main.rs"));
    }

    #[test]
    fn test_textual_content_types() {
        assert!(is_textual_content_type("text/plain"));
        assert!(is_textual_content_type("text/x-c"));
        assert!(is_textual_content_type("image/x-xbitmap"));
        assert!(!is_textual_content_type("image/png"));
        assert!(!is_textual_content_type("application/octet-stream"));
    }
}
