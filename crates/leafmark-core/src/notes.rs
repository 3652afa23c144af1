//! Companion notes for books.

use crate::paths::{join, normalize_path, parent_dir, stem};
use crate::store::Settings;

/// Where the companion note for `book_path` lives.
pub fn book_note_path(settings: &Settings, book_path: &str) -> String {
    let book = normalize_path(book_path);
    let file_name = format!("{}.md", stem(&book));
    let folder = if settings.use_same_folder {
        parent_dir(&book).to_string()
    } else {
        settings.note_path.clone()
    };
    join(&folder, &file_name)
}

/// Initial contents of a companion note: front matter linking back to the
/// book plus the configured tags.
pub fn book_note_template(settings: &Settings, book_path: &str) -> String {
    let book = normalize_path(book_path);
    let mut out = String::from("---\n");
    out.push_str(&format!("book: \"[[{book}]]\"\n"));
    let tags = settings.tag_list();
    if !tags.is_empty() {
        out.push_str("tags:\n");
        for tag in tags {
            out.push_str(&format!("  - {tag}\n"));
        }
    }
    out.push_str("---\n\n");
    out.push_str(&format!("# {}\n", stem(&book)));
    out
}
