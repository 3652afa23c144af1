//! Filesystem-backed vault index.
//!
//! Walks a directory of Markdown notes, extracts their links and embeds, and
//! serves them through the core's [`VaultIndex`] / [`BacklinkIndex`]
//! interfaces. Hidden entries (`.leafmark/`, `.obsidian/`, dotfiles) are
//! skipped.

use anyhow::{Context, Result};
use leafmark_core::host::{BacklinkIndex, LinkRecord, ResolvedLinks, VaultIndex};
use leafmark_core::link::{is_deep_link, parse_location_link, split_linktext};
use leafmark_core::paths::{basename, collapse_parent_segments, join, normalize_path, parent_dir};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info, warn};

const NOTE_EXTENSION: &str = "md";

static RE_WIKILINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[\[([^\[\]\n]+)\]\]").unwrap());
static RE_MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!?\[([^\]\n]*)\]\(([^)\n]+)\)").unwrap());

#[derive(Debug)]
pub struct FsVault {
    root: PathBuf,
    book_ext: String,
    mtimes: HashMap<String, u64>,
    by_basename: HashMap<String, Vec<String>>,
    records: HashMap<String, Vec<LinkRecord>>,
    resolved: ResolvedLinks,
    reverse: HashMap<String, Vec<String>>,
}

impl FsVault {
    pub fn open(root: &Path, book_ext: &str) -> Result<Self> {
        let mut vault = Self {
            root: root.to_path_buf(),
            book_ext: book_ext.to_string(),
            mtimes: HashMap::new(),
            by_basename: HashMap::new(),
            records: HashMap::new(),
            resolved: ResolvedLinks::new(),
            reverse: HashMap::new(),
        };
        vault.rescan()?;
        Ok(vault)
    }

    #[cfg(test)]
    fn note_count(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    fn contains(&self, path: &str) -> bool {
        self.mtimes.contains_key(path)
    }

    /// Re-read every file. Link resolution needs the full file list, so the
    /// link tables are rebuilt after the walk.
    pub fn rescan(&mut self) -> Result<()> {
        let mut files = Vec::new();
        walk(&self.root, &self.root, &mut files)
            .with_context(|| format!("failed to scan vault {}", self.root.display()))?;

        self.mtimes.clear();
        self.by_basename.clear();
        self.records.clear();
        for (rel, mtime) in files {
            self.by_basename
                .entry(basename(&rel).to_string())
                .or_default()
                .push(rel.clone());
            self.mtimes.insert(rel, mtime);
        }

        let notes: Vec<String> = self
            .mtimes
            .keys()
            .filter(|path| has_note_extension(path))
            .cloned()
            .collect();
        for note in notes {
            let absolute = self.root.join(&note);
            match fs::read_to_string(&absolute) {
                Ok(text) => {
                    self.records.insert(note, extract_link_records(&text));
                }
                Err(err) => {
                    warn!(path = %absolute.display(), "Skipping unreadable note: {err}");
                }
            }
        }

        self.rebuild_link_tables();
        info!(
            root = %self.root.display(),
            files = self.mtimes.len(),
            notes = self.records.len(),
            "Indexed vault"
        );
        Ok(())
    }

    fn rebuild_link_tables(&mut self) {
        let mut resolved = ResolvedLinks::new();
        let mut reverse: HashMap<String, Vec<String>> = HashMap::new();
        for (note, records) in &self.records {
            let mut destinations: HashMap<String, usize> = HashMap::new();
            for record in records {
                let Some(target) = self.link_target(record) else {
                    continue;
                };
                if let Some(resolved_path) = self.resolve(&target, note) {
                    *destinations.entry(resolved_path).or_insert(0) += 1;
                }
            }
            for destination in destinations.keys() {
                reverse
                    .entry(destination.clone())
                    .or_default()
                    .push(note.clone());
            }
            resolved.insert(note.clone(), destinations);
        }
        for sources in reverse.values_mut() {
            sources.sort();
        }
        self.resolved = resolved;
        self.reverse = reverse;
    }

    /// Path part of a link, decoded the way the host reads it.
    fn link_target(&self, record: &LinkRecord) -> Option<String> {
        let link = record.link.trim();
        if is_deep_link(link) {
            return parse_location_link(link, &self.book_ext).map(|parsed| parsed.path);
        }
        let (path, _) = split_linktext(link);
        let decoded = urlencoding::decode(path.trim())
            .map(Cow::into_owned)
            .unwrap_or_else(|_| path.trim().to_string());
        (!decoded.is_empty()).then_some(decoded)
    }

    /// Exact vault path, then relative to the source note, then a unique
    /// basename match. Extensionless links also try `.md`.
    fn resolve(&self, link_path: &str, source_path: &str) -> Option<String> {
        let direct = normalize_path(link_path);
        let relative = collapse_parent_segments(&join(parent_dir(source_path), link_path));
        for candidate in [direct.as_str(), relative.as_str()] {
            if let Some(found) = self.existing(candidate) {
                return Some(found);
            }
        }

        let name = basename(&direct);
        let with_note_ext = format!("{name}.{NOTE_EXTENSION}");
        for key in [name, with_note_ext.as_str()] {
            if let Some([only]) = self.by_basename.get(key).map(Vec::as_slice) {
                return Some(only.clone());
            }
        }
        debug!(link = link_path, source = source_path, "Unresolved link");
        None
    }

    fn existing(&self, path: &str) -> Option<String> {
        if self.mtimes.contains_key(path) {
            return Some(path.to_string());
        }
        let with_note_ext = format!("{path}.{NOTE_EXTENSION}");
        self.mtimes.contains_key(&with_note_ext).then_some(with_note_ext)
    }
}

impl BacklinkIndex for FsVault {
    fn backlinks_for(&self, target_path: &str) -> Vec<String> {
        self.reverse.get(target_path).cloned().unwrap_or_default()
    }
}

impl VaultIndex for FsVault {
    fn file_mtime(&self, path: &str) -> Option<u64> {
        self.mtimes.get(path).copied()
    }

    fn link_records(&self, note_path: &str) -> Vec<LinkRecord> {
        self.records.get(note_path).cloned().unwrap_or_default()
    }

    fn resolve_link(&self, link_path: &str, source_path: &str) -> Option<String> {
        self.resolve(link_path, source_path)
    }

    fn resolved_links(&self) -> &ResolvedLinks {
        &self.resolved
    }

    fn backlink_index(&self) -> Option<&dyn BacklinkIndex> {
        Some(self)
    }
}

/// Wikilinks, embeds and Markdown links in document order. External URLs
/// other than host deep links are ignored.
pub fn extract_link_records(text: &str) -> Vec<LinkRecord> {
    let mut found: Vec<(usize, LinkRecord)> = Vec::new();

    for caps in RE_WIKILINK.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let (link, alias) = match inner.as_str().split_once('|') {
            Some((link, alias)) => (link, Some(alias.trim().to_string())),
            None => (inner.as_str(), None),
        };
        found.push((
            whole.start(),
            LinkRecord {
                link: link.trim().to_string(),
                original: whole.as_str().to_string(),
                display_text: alias,
            },
        ));
    }

    for caps in RE_MARKDOWN_LINK.captures_iter(text) {
        let (Some(whole), Some(label), Some(target)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        let Some(link) = markdown_target(target.as_str()) else {
            continue;
        };
        found.push((
            whole.start(),
            LinkRecord {
                link,
                original: whole.as_str().to_string(),
                display_text: Some(label.as_str().trim().to_string()),
            },
        ));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, record)| record).collect()
}

fn markdown_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let target = match raw.strip_prefix('<') {
        Some(rest) => rest.split_once('>').map(|(inner, _)| inner)?,
        None => raw.split_whitespace().next()?,
    };
    let external = target.contains("://") || target.starts_with("mailto:");
    if target.is_empty() || (external && !is_deep_link(target)) {
        return None;
    }
    Some(target.to_string())
}

fn has_note_extension(path: &str) -> bool {
    leafmark_core::paths::has_extension(path, NOTE_EXTENSION)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, u64)>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let mtime = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        out.push((normalize_path(&rel.to_string_lossy()), mtime));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leafmark_core::codec::encode_location;
    use leafmark_core::resolver::BacklinkResolver;
    use std::time::SystemTime;

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("leafmark_test_{name}_{nanos}"));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("parent dir");
        }
        fs::write(path, contents).expect("write file");
    }

    #[test]
    fn extracts_wikilinks_embeds_and_markdown_links_in_order() {
        let text = "See [[Books/Dune.epub#cfi64=QQ|Fear]] and ![[cover.png]].\n\
                    Also [quote](<../Books/My Book.epub#cfi64=Rw>) and [site](https://example.com) \
                    and [deep](obsidian://open?vault=V&file=Books%2FDune.epub).";
        let records = extract_link_records(text);
        let links: Vec<&str> = records.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "Books/Dune.epub#cfi64=QQ",
                "cover.png",
                "../Books/My Book.epub#cfi64=Rw",
                "obsidian://open?vault=V&file=Books%2FDune.epub",
            ]
        );
        assert_eq!(records[0].display_text.as_deref(), Some("Fear"));
        assert_eq!(records[0].original, "[[Books/Dune.epub#cfi64=QQ|Fear]]");
        assert_eq!(records[1].display_text, None);
        assert_eq!(records[2].display_text.as_deref(), Some("quote"));
    }

    #[test]
    fn indexes_vault_and_resolves_links_the_host_way() {
        let root = unique_temp_dir("vault_index");
        write(&root, "Books/Dune.epub", "not really an epub");
        write(&root, "Notes/reading.md", "[[Dune.epub#cfi64=QQ]] [[ideas]]");
        write(&root, "Notes/ideas.md", "[dune](../Books/Dune.epub)");
        write(&root, "Notes/Sub/deeper.md", "[[../ideas.md]]");
        write(&root, ".leafmark/data.json", "{}");

        let vault = FsVault::open(&root, "epub").expect("vault opens");
        assert_eq!(vault.note_count(), 3);
        assert!(!vault.contains(".leafmark/data.json"));
        assert!(vault.file_mtime("Books/Dune.epub").is_some());

        assert_eq!(
            vault.resolve_link("Dune.epub", "Notes/reading.md").as_deref(),
            Some("Books/Dune.epub")
        );
        assert_eq!(
            vault.resolve_link("ideas", "Notes/reading.md").as_deref(),
            Some("Notes/ideas.md")
        );
        assert_eq!(vault.resolve_link("missing.epub", "Notes/reading.md"), None);

        assert_eq!(
            vault.backlinks_for("Books/Dune.epub"),
            vec!["Notes/ideas.md".to_string(), "Notes/reading.md".to_string()]
        );
        assert_eq!(
            vault.backlinks_for("Notes/ideas.md"),
            vec!["Notes/Sub/deeper.md".to_string(), "Notes/reading.md".to_string()]
        );
        assert_eq!(vault.resolved_links()["Notes/reading.md"]["Books/Dune.epub"], 1);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn ambiguous_basenames_do_not_resolve() {
        let root = unique_temp_dir("vault_ambiguous");
        write(&root, "A/Book.epub", "");
        write(&root, "B/Book.epub", "");
        write(&root, "note.md", "[[Book.epub]]");

        let vault = FsVault::open(&root, "epub").expect("vault opens");
        assert_eq!(vault.resolve_link("Book.epub", "note.md"), None);
        assert_eq!(
            vault.resolve_link("A/Book.epub", "note.md").as_deref(),
            Some("A/Book.epub")
        );

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn resolver_finds_highlights_in_real_notes() {
        let root = unique_temp_dir("vault_highlights");
        let range = "epubcfi(/6/14!/4/2,/1:0,/1:20)";
        let token = encode_location(range);
        write(&root, "Library/Dune.epub", "");
        write(
            &root,
            "Notes/dune.md",
            &format!(
                "> Fear is the mind-killer [[Library/Dune.epub#cfi64={token}|Fear]]\n\
                 [again](../Library/Dune.epub#cfi64={token})\n"
            ),
        );
        write(
            &root,
            "Notes/other.md",
            &format!("[[Dune.epub#cfi64={token}]] [[Dune.epub#cfi64=%%%]]"),
        );

        let vault = FsVault::open(&root, "epub").expect("vault opens");
        let mut resolver = BacklinkResolver::new(&vault, "epub");
        let highlights = resolver.highlights_for_book("Library/Dune.epub", 10);
        let summary: Vec<(&str, &str, &str)> = highlights
            .iter()
            .map(|h| {
                (
                    h.source_note.as_str(),
                    h.location_range.as_str(),
                    h.display_label.as_str(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![("Notes/dune.md", range, "Fear"), ("Notes/other.md", range, "other")]
        );

        let _ = fs::remove_dir_all(&root);
    }
}
