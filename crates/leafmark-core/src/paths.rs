//! Vault path helpers.
//!
//! Paths are vault-relative, `/`-separated strings. Every key the store
//! writes and every path the resolver compares goes through
//! [`normalize_path`] first so that `Books//A.epub`, `./Books/A.epub` and
//! `Books\A.epub` all address the same record.

use unicode_normalization::UnicodeNormalization;

/// Apply the host's path normalization rule.
pub fn normalize_path(path: &str) -> String {
    let unified: String = path
        .nfc()
        .map(|ch| match ch {
            '\\' => '/',
            '\u{00A0}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect();

    let segments: Vec<&str> = unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    segments.join("/")
}

/// Case-insensitive extension check; `ext` is given without the dot.
pub fn has_extension(path: &str, ext: &str) -> bool {
    let Some((_, actual)) = path.rsplit_once('.') else {
        return false;
    };
    !actual.contains('/') && actual.eq_ignore_ascii_case(ext)
}

/// Directory portion of a vault path, empty at the vault root.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Final path segment.
pub fn basename(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Final path segment without its extension.
pub fn stem(path: &str) -> &str {
    let name = basename(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Join a directory and a relative path, then normalize.
pub fn join(dir: &str, rest: &str) -> String {
    if dir.is_empty() || dir == "/" {
        return normalize_path(rest);
    }
    normalize_path(&format!("{dir}/{rest}"))
}

/// Resolve `..` segments in an already-normalized path. Leading `..`
/// segments that would escape the vault root are dropped.
pub fn collapse_parent_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            ".." => {
                out.pop();
            }
            "" | "." => {}
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return "/".to_string();
    }
    out.join("/")
}
