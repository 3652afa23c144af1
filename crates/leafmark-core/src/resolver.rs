//! Backlink resolver.
//!
//! Finds every note that links into a location of a book and turns those
//! links into highlight descriptors. Discovery is two-pass: a coarse
//! candidate set from the host index, then a fine pass over each
//! candidate's link records. Results are cached per book under a
//! fingerprint of the candidates' modification times, so repeated calls
//! with an unchanged vault return the very same `Arc`.

use crate::codec::decode_location;
use crate::host::{LinkRecord, VaultIndex};
use crate::link::{
    LOCATION_MARKER, extract_tokens, is_deep_link, parse_location_link, percent_decode,
    split_linktext,
};
use crate::paths::{normalize_path, stem};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};
use ts_rs::TS;

pub const DEFAULT_HIGHLIGHT_LIMIT: usize = 200;
const FINGERPRINT_REV: &str = "backlinks-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BacklinkHighlight {
    pub location_range: String,
    pub source_note: String,
    pub display_label: String,
}

#[derive(Debug)]
struct CacheEntry {
    fingerprint: String,
    highlights: Arc<Vec<BacklinkHighlight>>,
}

#[derive(Debug)]
pub struct BacklinkResolver<I: VaultIndex> {
    index: I,
    book_ext: String,
    cache: HashMap<String, CacheEntry>,
}

impl<I: VaultIndex> BacklinkResolver<I> {
    pub fn new(index: I, book_ext: impl Into<String>) -> Self {
        Self {
            index,
            book_ext: book_ext.into(),
            cache: HashMap::new(),
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Mutable access for hosts that refresh their index in place. Cached
    /// results stay valid until a candidate's modification time changes.
    pub fn index_mut(&mut self) -> &mut I {
        &mut self.index
    }

    /// Drop the cached result for one book.
    pub fn invalidate(&mut self, book_path: &str) {
        self.cache.remove(&normalize_path(book_path));
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Highlights for every location in `book_path` that some note links to,
    /// at most `limit` of them.
    pub fn highlights_for_book(
        &mut self,
        book_path: &str,
        limit: usize,
    ) -> Arc<Vec<BacklinkHighlight>> {
        let book = normalize_path(book_path);
        let candidates = self.candidates(&book);
        let fingerprint = fingerprint(&book, &candidates, limit);

        if let Some(entry) = self.cache.get(&book) {
            if entry.fingerprint == fingerprint {
                trace!(book = %book, "Backlink cache hit");
                return Arc::clone(&entry.highlights);
            }
        }

        let highlights = Arc::new(self.collect(&book, &candidates, limit));
        debug!(
            book = %book,
            candidates = candidates.len(),
            highlights = highlights.len(),
            "Resolved backlink highlights"
        );
        self.cache.insert(
            book,
            CacheEntry {
                fingerprint,
                highlights: Arc::clone(&highlights),
            },
        );
        highlights
    }

    /// Candidate notes with their modification times, sorted by path.
    fn candidates(&self, book: &str) -> Vec<(String, u64)> {
        let sources: Vec<String> = match self.index.backlink_index() {
            Some(reverse) => reverse.backlinks_for(book),
            None => {
                trace!("Reverse link index unavailable; scanning resolved links");
                self.index
                    .resolved_links()
                    .iter()
                    .filter(|(_, destinations)| {
                        destinations
                            .keys()
                            .any(|destination| normalize_path(destination) == book)
                    })
                    .map(|(source, _)| source.clone())
                    .collect()
            }
        };

        let mut candidates: Vec<(String, u64)> = sources
            .iter()
            .map(|source| normalize_path(source))
            .filter(|source| source != book)
            .filter_map(|source| {
                let mtime = self.index.file_mtime(&source)?;
                Some((source, mtime))
            })
            .collect();
        candidates.sort();
        candidates.dedup_by(|a, b| a.0 == b.0);
        candidates
    }

    fn collect(
        &self,
        book: &str,
        candidates: &[(String, u64)],
        limit: usize,
    ) -> Vec<BacklinkHighlight> {
        let mut highlights = Vec::new();
        if limit == 0 {
            return highlights;
        }
        // Keyed by note as well as token: the same location linked from two
        // notes yields two highlights.
        let mut seen: HashSet<(&str, String)> = HashSet::new();

        for (note, _) in candidates {
            for record in self.index.link_records(note) {
                if !self.targets_book(&record, note, book) {
                    continue;
                }
                for token in record_tokens(&record) {
                    if !seen.insert((note.as_str(), token.clone())) {
                        continue;
                    }
                    let location_range = match decode_location(&token) {
                        Ok(range) => range,
                        Err(err) => {
                            debug!(
                                note = %note,
                                token = %token,
                                "Ignoring malformed location link: {err}"
                            );
                            continue;
                        }
                    };
                    highlights.push(BacklinkHighlight {
                        location_range,
                        source_note: note.clone(),
                        display_label: display_label(&record, note),
                    });
                    if highlights.len() >= limit {
                        debug!(book = %book, limit, "Backlink highlight limit reached");
                        return highlights;
                    }
                }
            }
        }
        highlights
    }

    fn targets_book(&self, record: &LinkRecord, note: &str, book: &str) -> bool {
        let link = record.link.trim();
        let link_path = if is_deep_link(link) {
            match parse_location_link(link, &self.book_ext) {
                Some(parsed) => parsed.path,
                None => return false,
            }
        } else {
            let (path, _) = split_linktext(link);
            percent_decode(path.trim())
        };
        if link_path.is_empty() {
            return false;
        }

        self.index
            .resolve_link(&link_path, note)
            .is_some_and(|resolved| normalize_path(&resolved) == book)
    }
}

/// Tokens from the first field that carries any, in precedence order:
/// link text, original markup, display text, subpath.
///
/// Deep links carry their fragment percent-encoded inside a query value.
fn record_tokens(record: &LinkRecord) -> Vec<String> {
    let link = if is_deep_link(record.link.trim()) {
        percent_decode(record.link.trim())
    } else {
        record.link.clone()
    };
    let (_, subpath) = split_linktext(&link);
    let fields = [
        Some(link.as_str()),
        Some(record.original.as_str()),
        record.display_text.as_deref(),
        subpath,
    ];
    fields
        .into_iter()
        .flatten()
        .map(extract_tokens)
        .find(|tokens| !tokens.is_empty())
        .unwrap_or_default()
}

fn display_label(record: &LinkRecord, note: &str) -> String {
    match record.display_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() && !text.contains(LOCATION_MARKER) => text.to_string(),
        _ => stem(note).to_string(),
    }
}

fn fingerprint(book: &str, candidates: &[(String, u64)], limit: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(FINGERPRINT_REV.as_bytes());
    hasher.update(book.as_bytes());
    hasher.update([0u8]);
    hasher.update(candidates.len().to_le_bytes());
    hasher.update(limit.to_le_bytes());
    for (path, mtime) in candidates {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(mtime.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_location;
    use crate::host::{BacklinkIndex, ResolvedLinks};
    use crate::paths::{basename, collapse_parent_segments, join, parent_dir};
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeVault {
        notes: BTreeMap<String, (u64, Vec<LinkRecord>)>,
        books: Vec<String>,
        resolved: ResolvedLinks,
        reverse_available: bool,
    }

    impl FakeVault {
        fn with_book(book: &str) -> Self {
            Self {
                books: vec![book.to_string()],
                reverse_available: true,
                ..Self::default()
            }
        }

        fn add_note(&mut self, path: &str, mtime: u64, records: Vec<LinkRecord>) {
            let mut destinations = HashMap::new();
            for record in &records {
                let (link_path, _) = split_linktext(&record.link);
                if let Some(target) = self.resolve_link(link_path, path) {
                    *destinations.entry(target).or_insert(0) += 1;
                }
            }
            self.resolved.insert(path.to_string(), destinations);
            self.notes.insert(path.to_string(), (mtime, records));
        }

        fn touch(&mut self, path: &str, mtime: u64) {
            if let Some(note) = self.notes.get_mut(path) {
                note.0 = mtime;
            }
        }

        fn exists(&self, path: &str) -> bool {
            self.books.iter().any(|b| b == path) || self.notes.contains_key(path)
        }
    }

    impl BacklinkIndex for FakeVault {
        fn backlinks_for(&self, target_path: &str) -> Vec<String> {
            self.resolved
                .iter()
                .filter(|(_, dests)| dests.contains_key(target_path))
                .map(|(source, _)| source.clone())
                .collect()
        }
    }

    impl VaultIndex for FakeVault {
        fn file_mtime(&self, path: &str) -> Option<u64> {
            self.notes.get(path).map(|(mtime, _)| *mtime)
        }

        fn link_records(&self, note_path: &str) -> Vec<LinkRecord> {
            self.notes
                .get(note_path)
                .map(|(_, records)| records.clone())
                .unwrap_or_default()
        }

        fn resolve_link(&self, link_path: &str, source_path: &str) -> Option<String> {
            let direct = normalize_path(link_path);
            if self.exists(&direct) {
                return Some(direct);
            }
            let relative = collapse_parent_segments(&join(parent_dir(source_path), link_path));
            if self.exists(&relative) {
                return Some(relative);
            }
            self.books
                .iter()
                .find(|book| basename(book) == link_path)
                .cloned()
        }

        fn resolved_links(&self) -> &ResolvedLinks {
            &self.resolved
        }

        fn backlink_index(&self) -> Option<&dyn BacklinkIndex> {
            if self.reverse_available {
                Some(self)
            } else {
                None
            }
        }
    }

    fn wikilink(target: &str, range: &str, label: Option<&str>) -> LinkRecord {
        let link = format!("{target}#cfi64={}", encode_location(range));
        let original = match label {
            Some(label) => format!("[[{link}|{label}]]"),
            None => format!("[[{link}]]"),
        };
        LinkRecord {
            link,
            original,
            display_text: label.map(str::to_string),
        }
    }

    const BOOK: &str = "Books/Dune.epub";

    #[test]
    fn same_location_from_two_notes_yields_two_highlights() {
        let mut vault = FakeVault::with_book(BOOK);
        vault.add_note("A.md", 1, vec![wikilink(BOOK, "cfi-1", Some("Fear"))]);
        vault.add_note("B.md", 1, vec![wikilink("Dune.epub", "cfi-1", None)]);
        let mut resolver = BacklinkResolver::new(vault, "epub");

        let highlights = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert_eq!(
            *highlights,
            vec![
                BacklinkHighlight {
                    location_range: "cfi-1".to_string(),
                    source_note: "A.md".to_string(),
                    display_label: "Fear".to_string(),
                },
                BacklinkHighlight {
                    location_range: "cfi-1".to_string(),
                    source_note: "B.md".to_string(),
                    display_label: "B".to_string(),
                },
            ]
        );
    }

    #[test]
    fn identical_tokens_within_one_note_collapse() {
        let mut vault = FakeVault::with_book(BOOK);
        vault.add_note(
            "A.md",
            1,
            vec![
                wikilink(BOOK, "cfi-1", Some("first")),
                wikilink(BOOK, "cfi-1", Some("again")),
            ],
        );
        let mut resolver = BacklinkResolver::new(vault, "epub");
        let highlights = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].display_label, "first");
    }

    #[test]
    fn multiple_tokens_in_one_link_and_malformed_tokens() {
        let token_a = encode_location("cfi-a");
        let token_b = encode_location("cfi-b");
        let link = format!("{BOOK}#cfi64={token_a}&cfi64=%%%&cfi64={token_b}&cfi64=A");
        let mut vault = FakeVault::with_book(BOOK);
        vault.add_note(
            "A.md",
            1,
            vec![LinkRecord {
                original: format!("[[{link}]]"),
                link,
                display_text: None,
            }],
        );
        let mut resolver = BacklinkResolver::new(vault, "epub");
        let ranges: Vec<String> = resolver
            .highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT)
            .iter()
            .map(|h| h.location_range.clone())
            .collect();
        assert_eq!(ranges, vec!["cfi-a".to_string(), "cfi-b".to_string()]);
    }

    #[test]
    fn skips_links_to_other_files() {
        let mut vault = FakeVault::with_book(BOOK);
        vault.books.push("Books/Other.epub".to_string());
        vault.add_note(
            "A.md",
            1,
            vec![
                wikilink("Books/Other.epub", "cfi-x", None),
                wikilink(BOOK, "cfi-y", None),
            ],
        );
        let mut resolver = BacklinkResolver::new(vault, "epub");
        let highlights = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].location_range, "cfi-y");
    }

    #[test]
    fn resolves_markdown_and_deep_link_records() {
        let token = encode_location("cfi-md");
        let deep_token = encode_location("cfi-deep");
        let mut vault = FakeVault::with_book("Books/My Book.epub");
        vault.add_note(
            "Notes/A.md",
            1,
            vec![
                LinkRecord {
                    link: format!("../Books/My%20Book.epub#cfi64={token}"),
                    original: format!("[quote](../Books/My%20Book.epub#cfi64={token})"),
                    display_text: Some("quote".to_string()),
                },
                LinkRecord {
                    link: format!(
                        "obsidian://open?vault=V&file=Books%2FMy%20Book.epub%23cfi64%3D{deep_token}"
                    ),
                    original: String::new(),
                    display_text: Some("deep".to_string()),
                },
            ],
        );
        // The forward table is built from raw link text, which is still
        // percent-encoded here.
        vault
            .resolved
            .entry("Notes/A.md".to_string())
            .or_default()
            .insert("Books/My Book.epub".to_string(), 2);

        let mut resolver = BacklinkResolver::new(vault, "epub");
        let labels: Vec<String> = resolver
            .highlights_for_book("Books/My Book.epub", DEFAULT_HIGHLIGHT_LIMIT)
            .iter()
            .map(|h| format!("{}:{}", h.display_label, h.location_range))
            .collect();
        assert_eq!(
            labels,
            vec!["quote:cfi-md".to_string(), "deep:cfi-deep".to_string()]
        );
    }

    #[test]
    fn stops_at_limit() {
        let mut vault = FakeVault::with_book(BOOK);
        let records = (0..10)
            .map(|i| wikilink(BOOK, &format!("cfi-{i}"), None))
            .collect();
        vault.add_note("A.md", 1, records);
        let mut resolver = BacklinkResolver::new(vault, "epub");
        assert_eq!(resolver.highlights_for_book(BOOK, 3).len(), 3);
        assert!(resolver.highlights_for_book(BOOK, 0).is_empty());
    }

    #[test]
    fn cache_returns_same_arc_until_a_candidate_changes() {
        let mut vault = FakeVault::with_book(BOOK);
        vault.add_note("A.md", 1, vec![wikilink(BOOK, "cfi-1", None)]);
        let mut resolver = BacklinkResolver::new(vault, "epub");

        let first = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        let second = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert!(Arc::ptr_eq(&first, &second));

        resolver.index_mut().touch("A.md", 2);
        let third = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(*first, *third);

        resolver.invalidate(BOOK);
        let fourth = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert!(!Arc::ptr_eq(&third, &fourth));
    }

    #[test]
    fn falls_back_to_forward_table_without_reverse_index() {
        let mut vault = FakeVault::with_book(BOOK);
        vault.reverse_available = false;
        vault.add_note("A.md", 1, vec![wikilink(BOOK, "cfi-1", Some("x"))]);
        vault.add_note("Unrelated.md", 1, Vec::new());
        let mut resolver = BacklinkResolver::new(&vault, "epub");
        let highlights = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].source_note, "A.md");
    }

    #[test]
    fn display_text_tokens_are_used_when_link_has_none() {
        let token = encode_location("cfi-label");
        let mut vault = FakeVault::with_book(BOOK);
        vault.add_note(
            "A.md",
            1,
            vec![LinkRecord {
                link: BOOK.to_string(),
                original: format!("[[{BOOK}]]"),
                display_text: Some(format!("jump cfi64={token}")),
            }],
        );
        let mut resolver = BacklinkResolver::new(vault, "epub");
        let highlights = resolver.highlights_for_book(BOOK, DEFAULT_HIGHLIGHT_LIMIT);
        assert_eq!(highlights.len(), 1);
        assert_eq!(highlights[0].location_range, "cfi-label");
        assert_eq!(highlights[0].display_label, "A");
    }
}
