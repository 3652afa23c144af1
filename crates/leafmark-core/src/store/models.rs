use super::defaults;
use crate::color::{MAX_HIGHLIGHT_OPACITY, MIN_HIGHLIGHT_OPACITY, normalize_color};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

pub const DOCUMENT_VERSION: u32 = 1;

/// User settings; always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Settings {
    #[serde(default = "crate::store::defaults::default_scrolled_view")]
    pub scrolled_view: bool,
    #[serde(default = "crate::store::defaults::default_font_size_percent")]
    pub font_size_percent: u32,
    #[serde(default = "crate::store::defaults::default_highlight_color")]
    pub highlight_color: String,
    #[serde(default = "crate::store::defaults::default_highlight_opacity")]
    pub highlight_opacity: u32,
    #[serde(default = "crate::store::defaults::default_follow_host_theme")]
    pub follow_host_theme: bool,
    #[serde(default = "crate::store::defaults::default_follow_host_font")]
    pub follow_host_font: bool,
    #[serde(default = "crate::store::defaults::default_note_path")]
    pub note_path: String,
    #[serde(default = "crate::store::defaults::default_use_same_folder")]
    pub use_same_folder: bool,
    #[serde(default = "crate::store::defaults::default_tags")]
    pub tags: String,
    /// Keys this version does not recognize; written back untouched.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            scrolled_view: defaults::default_scrolled_view(),
            font_size_percent: defaults::default_font_size_percent(),
            highlight_color: defaults::default_highlight_color(),
            highlight_opacity: defaults::default_highlight_opacity(),
            follow_host_theme: defaults::default_follow_host_theme(),
            follow_host_font: defaults::default_follow_host_font(),
            note_path: defaults::default_note_path(),
            use_same_folder: defaults::default_use_same_folder(),
            tags: defaults::default_tags(),
            extra: serde_json::Map::new(),
        }
    }
}

impl Settings {
    /// Clamp ranges and normalize the highlight color.
    pub fn sanitized(mut self) -> Self {
        self.font_size_percent = self.font_size_percent.clamp(
            defaults::MIN_FONT_SIZE_PERCENT,
            defaults::MAX_FONT_SIZE_PERCENT,
        );
        self.highlight_opacity = self
            .highlight_opacity
            .clamp(MIN_HIGHLIGHT_OPACITY, MAX_HIGHLIGHT_OPACITY);
        self.highlight_color = normalize_color(&self.highlight_color)
            .unwrap_or_else(defaults::default_highlight_color);
        self.note_path = self.note_path.trim().to_string();
        self
    }

    /// Tags split on commas and whitespace, without leading `#`.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .map(|tag| tag.trim_start_matches('#'))
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Position understood only by the rendering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum Location {
    Cfi(String),
    Offset(f64),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Cfi(cfi) => write!(f, "{cfi}"),
            Location::Offset(offset) => write!(f, "{offset}"),
        }
    }
}

/// Per-book progress and reading statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BookProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "de_millis")]
    #[ts(type = "number")]
    pub updated_at: u64,
    #[serde(default, deserialize_with = "de_millis")]
    #[ts(type = "number")]
    pub total_read_time_ms: u64,
    #[serde(default, deserialize_with = "de_millis")]
    #[ts(type = "number")]
    pub session_count: u64,
    #[serde(default, deserialize_with = "de_opt_millis")]
    #[ts(type = "number | null")]
    pub last_opened_at: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_millis")]
    #[ts(type = "number | null")]
    pub last_read_at: Option<u64>,
    /// Per-book keys written by other versions; carried through unchanged.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BookProgress {
    /// True when reading was ever tracked for this book, as opposed to a
    /// record that only carries a synced position.
    pub fn has_activity(&self) -> bool {
        self.total_read_time_ms > 0
            || self.session_count > 0
            || self.last_opened_at.is_some()
            || self.last_read_at.is_some()
    }

    pub fn stats(&self) -> ReadingStats {
        ReadingStats {
            total_read_time_ms: self.total_read_time_ms,
            session_count: self.session_count,
            last_opened_at: self.last_opened_at,
            last_read_at: self.last_read_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReadingStats {
    #[ts(type = "number")]
    pub total_read_time_ms: u64,
    #[ts(type = "number")]
    pub session_count: u64,
    #[ts(type = "number | null")]
    pub last_opened_at: Option<u64>,
    #[ts(type = "number | null")]
    pub last_read_at: Option<u64>,
}

impl ReadingStats {
    pub fn last_activity_at(&self) -> Option<u64> {
        self.last_read_at.max(self.last_opened_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct ReadingStatsEntry {
    pub path: String,
    pub stats: ReadingStats,
}

/// The versioned on-disk record.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PersistedDocument {
    pub version: u32,
    pub settings: Settings,
    pub progress: BTreeMap<String, BookProgress>,
}

fn clamp_millis(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

// Hosts written in JavaScript may persist fractional or negative numbers.
fn de_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(clamp_millis).unwrap_or(0))
}

fn de_opt_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite() && *v > 0.0).map(clamp_millis))
}
