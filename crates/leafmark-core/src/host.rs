//! Capability interfaces for the host application's metadata services.
//!
//! The core never looks these up globally; they are injected so tests and
//! headless hosts can substitute their own index.

use std::collections::HashMap;

/// Forward table: source note path -> (destination path -> link count).
pub type ResolvedLinks = HashMap<String, HashMap<String, usize>>;

/// One parsed link or embed inside a note, as the host's metadata cache
/// reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkRecord {
    /// Link target as written, including any `#subpath`
    /// (`Books/Dune.epub#cfi64=...`).
    pub link: String,
    /// The full original markup (`[[Books/Dune.epub#cfi64=...|Fear]]`).
    pub original: String,
    /// Alias or Markdown label, when the link has one.
    pub display_text: Option<String>,
}

/// Reverse link index: which notes link to a file. Newer hosts expose this
/// directly; older ones only have the forward table.
pub trait BacklinkIndex {
    fn backlinks_for(&self, target_path: &str) -> Vec<String>;
}

pub trait VaultIndex {
    /// Modification time in epoch milliseconds, `None` when the file is gone.
    fn file_mtime(&self, path: &str) -> Option<u64>;

    /// Links and embeds of a note.
    fn link_records(&self, note_path: &str) -> Vec<LinkRecord>;

    /// Resolve link text the way the host does, relative to `source_path`.
    fn resolve_link(&self, link_path: &str, source_path: &str) -> Option<String>;

    fn resolved_links(&self) -> &ResolvedLinks;

    /// Capability probe for the reverse index.
    fn backlink_index(&self) -> Option<&dyn BacklinkIndex> {
        None
    }
}

impl<T: VaultIndex + ?Sized> VaultIndex for &T {
    fn file_mtime(&self, path: &str) -> Option<u64> {
        (**self).file_mtime(path)
    }

    fn link_records(&self, note_path: &str) -> Vec<LinkRecord> {
        (**self).link_records(note_path)
    }

    fn resolve_link(&self, link_path: &str, source_path: &str) -> Option<String> {
        (**self).resolve_link(link_path, source_path)
    }

    fn resolved_links(&self) -> &ResolvedLinks {
        (**self).resolved_links()
    }

    fn backlink_index(&self) -> Option<&dyn BacklinkIndex> {
        (**self).backlink_index()
    }
}
