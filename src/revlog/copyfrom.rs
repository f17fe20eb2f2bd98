//! Implicit copy-from inference.
//!
//! When a directory is copied (branched/tagged) and some of its files are
//! modified or deleted in the same commit, the log reports those files
//! without ancestry. Their previous identity only exists under the copy
//! source, so it is derived here from the copied ancestor.

use super::{ChangeEntry, ChangeKind, CopyFrom, CopyOrigin};
use crate::paths::{dir_form, is_strict_descendant, rebase};

/// A copy reported in the revision: (path, copy-from path, copy-from revision).
struct CopiedPath {
    path: String,
    from_path: String,
    from_revision: u64,
}

/// Fill in copy-from ancestry for non-added entries lying below a path that
/// was copied in the same revision. The deepest copied ancestor wins.
pub fn infer_copy_from(entries: Vec<ChangeEntry>) -> Vec<ChangeEntry> {
    let mut copied: Vec<CopiedPath> = entries
        .iter()
        .filter_map(|e| {
            let copy_from = e.copy_from.as_ref()?;
            Some(CopiedPath {
                path: dir_form(&e.path),
                from_path: dir_form(&copy_from.path),
                from_revision: copy_from.revision,
            })
        })
        .collect();

    if copied.is_empty() {
        return entries;
    }

    // Descending order puts `/b/sub/` before `/b/`.
    copied.sort_by(|a, b| b.path.cmp(&a.path));

    entries
        .into_iter()
        .map(|entry| {
            if entry.change == ChangeKind::Added || entry.copy_from.is_some() {
                return entry;
            }
            let ancestor = copied
                .iter()
                .find(|c| is_strict_descendant(&entry.path, &c.path));
            match ancestor.and_then(|c| {
                rebase(&entry.path, &c.path, &c.from_path).map(|path| CopyFrom {
                    path,
                    revision: c.from_revision,
                    origin: CopyOrigin::Inferred,
                })
            }) {
                Some(copy_from) => entry.with_copy_from(copy_from),
                None => entry,
            }
        })
        .collect()
}
