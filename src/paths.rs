//! Repository path normalization.
//!
//! Every path that crosses a component boundary (log entries, diff headers,
//! copy-from references) goes through [`normalize_path`] so that paths from
//! different server calls can be joined by exact string match.

// ─── Normalization ──────────────────────────────────────────────────

/// Normalize a repository path.
///
/// Rules:
/// - `.trim()` surrounding whitespace
/// - `\` → `/`
/// - Collapse `//` → `/`
/// - Always absolute (leading `/`)
/// - A trailing `/` is preserved (it marks a directory)
/// - `""` → `"/"` (repository root)
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let mut result = String::with_capacity(path.len() + 1);
    result.push('/');

    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && result.ends_with('/') {
            continue;
        }
        result.push(c);
    }

    result
}

/// Directory form of a normalized path: guaranteed trailing `/`.
#[must_use]
pub fn dir_form(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Check if `path` lies strictly below `ancestor`.
///
/// The ancestor is compared in directory form, so `/trunk/xxx` is never an
/// ancestor of `/trunk/xxxyyy`, and a path is never its own descendant.
#[must_use]
pub fn is_strict_descendant(path: &str, ancestor: &str) -> bool {
    let ancestor = dir_form(ancestor);
    path.len() > ancestor.len() && path.starts_with(&ancestor)
}

/// Check if `path` equals `base` or lies below it (directory-form prefix).
#[must_use]
pub fn is_within(path: &str, base: &str) -> bool {
    let base = dir_form(base);
    path == base.trim_end_matches('/') || path.starts_with(&base) || base == "/"
}

/// Re-root `path` from `from` onto `onto`: `/branch/x/y.c` from `/branch/`
/// onto `/trunk/` becomes `/trunk/x/y.c`. Returns `None` when `path` is not
/// below `from`.
#[must_use]
pub fn rebase(path: &str, from: &str, onto: &str) -> Option<String> {
    let from = dir_form(from);
    let remainder = path.strip_prefix(from.as_str())?;
    Some(normalize_path(&format!("{}{}", dir_form(onto), remainder)))
}

/// Last path component (ignoring a trailing `/`).
#[must_use]
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Lower-cased extension of the last path component, including the dot.
#[must_use]
pub fn extension(path: &str) -> Option<String> {
    let name = base_name(path);
    let dot = name.rfind('.')?;
    Some(name[dot..].to_lowercase())
}

/// Join a repository root URL and an absolute repository path.
#[must_use]
pub fn join_url(root_url: &str, path: &str) -> String {
    let root = root_url.trim_end_matches('/');
    if path == "/" || path.is_empty() {
        return root.to_string();
    }
    format!("{}{}", root, normalize_path(path))
}
