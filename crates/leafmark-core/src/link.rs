//! Location links: `<bookPath>#cfi64=<token>[&cfi64=<token2>...]`.
//!
//! Links reach us in many shapes: wikilink text, Markdown hrefs (possibly
//! percent-encoded or wrapped in `<...>`), and host deep links such as
//! `obsidian://open?vault=V&file=Books%2FA.epub%23cfi64%3D...`. Parsing never
//! fails loudly; anything unrecognized is simply "not one of ours".

use crate::codec::encode_location;
use crate::paths::{has_extension, normalize_path};
use crate::text_utils::sanitize_link_text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use ts_rs::TS;

pub const LOCATION_MARKER: &str = "cfi64=";
pub const DEEP_LINK_SCHEME: &str = "obsidian://";

static RE_LOCATION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"cfi64=([A-Za-z0-9_-]+)").unwrap());

/// A parsed reference to a location inside a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct LocationLink {
    pub path: String,
    pub token: String,
}

/// Parse an href-like string into a book path and location token.
///
/// `book_ext` is the book extension without the dot (`"epub"`).
pub fn parse_location_link(raw: &str, book_ext: &str) -> Option<LocationLink> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('<')
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(trimmed);

    // Deep-link targets arrive already decoded.
    let deep = is_deep_link(trimmed);
    let candidate: Cow<'_, str> = if deep {
        Cow::Owned(deep_link_target(trimmed)?)
    } else {
        Cow::Borrowed(trimmed)
    };

    let (path_part, fragment) = match candidate.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (candidate.as_ref(), None),
    };

    let path = if deep {
        Cow::Borrowed(path_part)
    } else {
        Cow::Owned(percent_decode(path_part))
    };
    if !has_extension(&path, book_ext) {
        return None;
    }
    let token = first_token(fragment?)?;

    Some(LocationLink {
        path: normalize_path(&path),
        token,
    })
}

/// Every `cfi64=<token>` marker in `text`, in order of appearance.
pub fn extract_tokens(text: &str) -> Vec<String> {
    RE_LOCATION_TOKEN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Split host link text into the path and the `#...` subpath.
pub fn split_linktext(link: &str) -> (&str, Option<&str>) {
    match link.find('#') {
        Some(idx) => (&link[..idx], Some(&link[idx..])),
        None => (link, None),
    }
}

/// Build the wikilink pasted into notes for a selection.
pub fn build_location_link(book_path: &str, location_range: &str, label: &str) -> String {
    let path = normalize_path(book_path);
    let token = encode_location(location_range);
    let label = sanitize_link_text(label);
    if label.is_empty() {
        format!("[[{path}#{LOCATION_MARKER}{token}]]")
    } else {
        format!("[[{path}#{LOCATION_MARKER}{token}|{label}]]")
    }
}

/// Percent-decode, keeping the input unchanged when it is not valid UTF-8
/// after decoding.
pub(crate) fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| value.to_string())
}

fn first_token(fragment: &str) -> Option<String> {
    RE_LOCATION_TOKEN
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The `file` query parameter of a deep link, with any URL fragment
/// re-attached.
fn deep_link_target(raw: &str) -> Option<String> {
    let (base, url_fragment) = match raw.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (raw, None),
    };
    let (_, query) = base.split_once('?')?;
    let file = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("file"))
        .map(|(_, value)| percent_decode(&value.replace('+', " ")))?;

    match url_fragment {
        Some(fragment) if !file.contains('#') => Some(format!("{file}#{fragment}")),
        _ => Some(file),
    }
}

/// True for host deep links (`obsidian://...`).
pub fn is_deep_link(value: &str) -> bool {
    value
        .get(..DEEP_LINK_SCHEME.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(DEEP_LINK_SCHEME))
}
