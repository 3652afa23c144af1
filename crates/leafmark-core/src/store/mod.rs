//! Persistent reading store.
//!
//! Owns the versioned document: user settings plus a map from normalized
//! book path to progress and reading statistics. All operations are
//! synchronous over in-memory state; the store never performs I/O. Every
//! effective mutation calls the injected save hook and the caller decides
//! when to write [`ReadingStore::export_data`] out.

mod defaults;
mod models;

pub use defaults::{MAX_FONT_SIZE_PERCENT, MIN_FONT_SIZE_PERCENT};
pub use models::{
    BookProgress, DOCUMENT_VERSION, Location, PersistedDocument, ReadingStats, ReadingStatsEntry,
    Settings,
};

use crate::clock::Clock;
use crate::paths::normalize_path;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Progress and statistics surface consumed by the view layer and the
/// reading time tracker.
pub trait ProgressProvider {
    fn get_progress(&self, path: &str) -> Option<Location>;
    fn set_progress(&mut self, path: &str, location: Location);
    fn get_reading_stats(&self, path: &str) -> ReadingStats;
    fn record_reading_session(&mut self, path: &str);
    fn add_reading_time(&mut self, path: &str, delta_ms: f64);
    fn list_reading_stats(&self) -> Vec<ReadingStatsEntry>;
}

type SaveHook = Box<dyn FnMut()>;

pub struct ReadingStore {
    settings: Settings,
    progress: BTreeMap<String, BookProgress>,
    clock: Box<dyn Clock>,
    save_hook: Option<SaveHook>,
}

impl std::fmt::Debug for ReadingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingStore")
            .field("settings", &self.settings)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl ReadingStore {
    /// Empty store with default settings.
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            settings: Settings::default(),
            progress: BTreeMap::new(),
            clock: Box::new(clock),
            save_hook: None,
        }
    }

    /// Load a persisted document, migrating legacy shapes.
    ///
    /// A document with `version: 1` contributes its settings and progress
    /// map. Anything else is a legacy flat settings object and starts with
    /// empty progress. Unknown settings keys survive the upgrade.
    pub fn load(raw: &Value, clock: impl Clock + 'static) -> Self {
        let mut store = Self::new(clock);
        let Some(object) = raw.as_object() else {
            if !raw.is_null() {
                warn!("Persisted data is not an object; starting from defaults");
            }
            return store;
        };

        let is_current = object
            .get("version")
            .and_then(Value::as_u64)
            .is_some_and(|version| version == u64::from(DOCUMENT_VERSION));
        if is_current {
            let empty = Map::new();
            let settings = object
                .get("settings")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            store.settings = merge_settings(settings);
            if let Some(progress) = object.get("progress").and_then(Value::as_object) {
                store.progress = load_progress(progress);
            }
            debug!(books = store.progress.len(), "Loaded v1 reading data");
        } else {
            store.settings = merge_settings(object);
            info!("Migrated legacy settings-only data to v1");
        }
        store
    }

    /// Install the hook called after every effective mutation.
    pub fn set_save_hook(&mut self, hook: impl FnMut() + 'static) {
        self.save_hook = Some(Box::new(hook));
    }

    /// Snapshot for persistence.
    pub fn export_data(&self) -> PersistedDocument {
        PersistedDocument {
            version: DOCUMENT_VERSION,
            settings: self.settings.clone(),
            progress: self.progress.clone(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) {
        let mut next = self.settings.clone();
        update(&mut next);
        let next = next.sanitized();
        if next != self.settings {
            self.settings = next;
            self.request_save();
        }
    }

    /// Full record for a book, if one exists.
    pub fn book(&self, path: &str) -> Option<&BookProgress> {
        self.progress.get(&normalize_path(path))
    }

    pub fn progress_paths(&self) -> impl Iterator<Item = &str> {
        self.progress.keys().map(String::as_str)
    }

    /// Re-key progress after a host rename.
    ///
    /// For folders every entry under `old_path/` moves under `new_path/`.
    /// An existing destination entry wins over the moved one. Renaming a
    /// path without an entry is a silent no-op, so repeated calls are
    /// harmless.
    pub fn rename_progress(&mut self, old_path: &str, new_path: &str, is_folder: bool) {
        let old_path = normalize_path(old_path);
        let new_path = normalize_path(new_path);
        if old_path == new_path {
            return;
        }

        let moves: Vec<(String, String)> = if is_folder {
            let prefix = format!("{old_path}/");
            self.progress
                .keys()
                .filter_map(|key| {
                    key.strip_prefix(&prefix)
                        .map(|rest| (key.clone(), format!("{new_path}/{rest}")))
                })
                .collect()
        } else if self.progress.contains_key(&old_path) {
            vec![(old_path.clone(), new_path.clone())]
        } else {
            Vec::new()
        };

        if moves.is_empty() {
            return;
        }
        for (from, to) in &moves {
            let Some(entry) = self.progress.remove(from) else {
                continue;
            };
            if self.progress.contains_key(to) {
                debug!(from = %from, to = %to, "Rename destination exists; keeping it");
                continue;
            }
            self.progress.insert(to.clone(), entry);
        }
        info!(
            from = %old_path,
            to = %new_path,
            is_folder,
            moved = moves.len(),
            "Re-keyed reading progress"
        );
        self.request_save();
    }

    fn entry_mut(&mut self, path: &str) -> &mut BookProgress {
        self.progress.entry(normalize_path(path)).or_default()
    }

    fn request_save(&mut self) {
        if let Some(hook) = self.save_hook.as_mut() {
            hook();
        }
    }
}

impl ProgressProvider for ReadingStore {
    fn get_progress(&self, path: &str) -> Option<Location> {
        self.book(path).and_then(|book| book.location.clone())
    }

    fn set_progress(&mut self, path: &str, location: Location) {
        let now = self.clock.now_ms();
        let entry = self.entry_mut(path);
        entry.location = Some(location);
        entry.updated_at = now;
        self.request_save();
    }

    /// Zero-valued stats for unseen books; does not create a record.
    fn get_reading_stats(&self, path: &str) -> ReadingStats {
        self.book(path).map(BookProgress::stats).unwrap_or_default()
    }

    fn record_reading_session(&mut self, path: &str) {
        let now = self.clock.now_ms();
        let entry = self.entry_mut(path);
        entry.session_count = entry.session_count.saturating_add(1);
        entry.last_opened_at = Some(now);
        self.request_save();
    }

    fn add_reading_time(&mut self, path: &str, delta_ms: f64) {
        if !delta_ms.is_finite() || delta_ms <= 0.0 {
            debug!(path, delta_ms, "Ignoring non-positive reading time");
            return;
        }
        let now = self.clock.now_ms();
        let entry = self.entry_mut(path);
        entry.total_read_time_ms = entry
            .total_read_time_ms
            .saturating_add(delta_ms.round() as u64);
        entry.last_read_at = Some(now);
        self.request_save();
    }

    /// Books with any tracked activity, most recent first.
    fn list_reading_stats(&self) -> Vec<ReadingStatsEntry> {
        let mut entries: Vec<ReadingStatsEntry> = self
            .progress
            .iter()
            .filter(|(_, book)| book.has_activity())
            .map(|(path, book)| ReadingStatsEntry {
                path: path.clone(),
                stats: book.stats(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.stats
                .last_activity_at()
                .cmp(&a.stats.last_activity_at())
                .then_with(|| a.path.cmp(&b.path))
        });
        entries
    }
}

/// Merge stored settings over defaults one key at a time, so a single
/// mistyped value cannot discard the rest.
fn merge_settings(raw: &Map<String, Value>) -> Settings {
    merge_fields::<Settings>(raw, "settings").sanitized()
}

/// Overlay `raw` onto the serialized defaults of `T` key by key. A key whose
/// value does not fit is dropped with a warning and the default kept.
fn merge_fields<T>(raw: &Map<String, Value>, record: &str) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let mut merged = match serde_json::to_value(T::default()) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    for (key, value) in raw {
        let previous = merged.insert(key.clone(), value.clone());
        if serde_json::from_value::<T>(Value::Object(merged.clone())).is_err() {
            warn!(record, key = %key, "Dropping field with unexpected type");
            match previous {
                Some(previous) => merged.insert(key.clone(), previous),
                None => merged.remove(key),
            };
        }
    }

    serde_json::from_value::<T>(Value::Object(merged)).unwrap_or_default()
}

fn load_progress(raw: &Map<String, Value>) -> BTreeMap<String, BookProgress> {
    let mut progress = BTreeMap::new();
    for (path, value) in raw {
        let Some(fields) = value.as_object() else {
            warn!(path = %path, "Skipping progress entry that is not an object");
            continue;
        };
        let key = normalize_path(path);
        if progress.contains_key(&key) {
            warn!(path = %path, key = %key, "Duplicate progress entry after normalization");
            continue;
        }
        progress.insert(key, merge_fields::<BookProgress>(fields, path));
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn store_with_counter(raw: Value) -> (ReadingStore, ManualClock, Rc<Cell<usize>>) {
        let clock = ManualClock::new(1_000);
        let mut store = ReadingStore::load(&raw, clock.clone());
        let saves = Rc::new(Cell::new(0));
        let counter = Rc::clone(&saves);
        store.set_save_hook(move || counter.set(counter.get() + 1));
        (store, clock, saves)
    }

    #[test]
    fn load_v1_merges_settings_over_defaults() {
        let (store, _, _) = store_with_counter(json!({
            "version": 1,
            "settings": { "scrolledView": true, "fontSizePercent": 120 },
            "progress": {
                "Books/A.epub": { "location": "epubcfi(/6/2!/4)", "updatedAt": 5 }
            }
        }));
        assert!(store.settings().scrolled_view);
        assert_eq!(store.settings().font_size_percent, 120);
        assert_eq!(store.settings().tags, "book");
        assert_eq!(
            store.get_progress("Books/A.epub"),
            Some(Location::Cfi("epubcfi(/6/2!/4)".to_string()))
        );
    }

    #[test]
    fn load_migrates_legacy_flat_settings_and_keeps_unknown_keys() {
        let (store, _, _) = store_with_counter(json!({
            "highlightColor": "rgb(255, 0, 0)",
            "notePath": "Reading",
            "legacyFlag": "keep-me"
        }));
        assert_eq!(store.settings().highlight_color, "#ff0000");
        assert_eq!(store.settings().note_path, "Reading");
        assert_eq!(store.progress_paths().count(), 0);

        let exported = serde_json::to_value(store.export_data()).expect("export");
        assert_eq!(exported["version"], json!(1));
        assert_eq!(exported["settings"]["legacyFlag"], json!("keep-me"));
        assert_eq!(exported["progress"], json!({}));
    }

    #[test]
    fn load_drops_mistyped_fields_and_clamps_ranges() {
        let (store, _, _) = store_with_counter(json!({
            "version": 1,
            "settings": {
                "scrolledView": "yes",
                "fontSizePercent": 400,
                "highlightOpacity": 1,
                "highlightColor": "not a color"
            }
        }));
        let settings = store.settings();
        assert!(!settings.scrolled_view);
        assert_eq!(settings.font_size_percent, MAX_FONT_SIZE_PERCENT);
        assert_eq!(settings.highlight_opacity, 10);
        assert_eq!(settings.highlight_color, "#ffeb3b");
        assert!(settings.extra.is_empty());
    }

    #[test]
    fn load_normalizes_keys_and_skips_malformed_entries() {
        let (store, _, _) = store_with_counter(json!({
            "version": 1,
            "settings": {},
            "progress": {
                "./Books//A.epub": { "location": 42.5, "totalReadTimeMs": 1200.4 },
                "Books/B.epub": "garbage"
            }
        }));
        let book = store.book("Books/A.epub").expect("normalized key");
        assert_eq!(book.location, Some(Location::Offset(42.5)));
        assert_eq!(book.total_read_time_ms, 1200);
        assert!(store.book("Books/B.epub").is_none());
    }

    #[test]
    fn load_keeps_unknown_progress_fields() {
        let (store, _, _) = store_with_counter(json!({
            "version": 1,
            "settings": {},
            "progress": {
                "A.epub": { "location": "epubcfi(/6/2)", "updatedAt": 5, "percentage": 0.4 }
            }
        }));
        let exported = serde_json::to_value(store.export_data()).expect("serialize");
        let entry = &exported["progress"]["A.epub"];
        assert_eq!(entry["percentage"], json!(0.4));
        assert_eq!(entry["location"], json!("epubcfi(/6/2)"));
        assert_eq!(entry["updatedAt"], json!(5));
    }

    #[test]
    fn mistyped_progress_field_keeps_rest_of_entry() {
        let (store, _, _) = store_with_counter(json!({
            "version": 1,
            "settings": {},
            "progress": {
                "B.epub": {
                    "location": "epubcfi(/6/4)",
                    "totalReadTimeMs": 3_600_000,
                    "sessionCount": "3"
                }
            }
        }));
        let book = store.book("B.epub").expect("entry survives");
        assert_eq!(book.location, Some(Location::Cfi("epubcfi(/6/4)".to_string())));
        assert_eq!(book.total_read_time_ms, 3_600_000);
        assert_eq!(book.session_count, 0);
        assert!(!book.extra.contains_key("sessionCount"));
    }

    #[test]
    fn non_object_input_yields_defaults() {
        let (store, _, _) = store_with_counter(json!(null));
        assert_eq!(store.settings(), &Settings::default());
        let (store, _, _) = store_with_counter(json!([1, 2]));
        assert_eq!(store.progress_paths().count(), 0);
    }

    #[test]
    fn set_progress_stamps_and_requests_save() {
        let (mut store, clock, saves) = store_with_counter(json!({}));
        clock.set(7_000);
        store.set_progress("Books/A.epub", Location::Cfi("cfi".to_string()));
        assert_eq!(store.book("Books/A.epub").map(|b| b.updated_at), Some(7_000));
        assert_eq!(saves.get(), 1);
    }

    #[test]
    fn reading_stats_default_to_zero_without_creating_records() {
        let (store, _, saves) = store_with_counter(json!({}));
        assert_eq!(store.get_reading_stats("Unseen.epub"), ReadingStats::default());
        assert!(store.book("Unseen.epub").is_none());
        assert_eq!(saves.get(), 0);
    }

    #[test]
    fn sessions_and_reading_time_accumulate() {
        let (mut store, clock, saves) = store_with_counter(json!({}));
        store.record_reading_session("A.epub");
        clock.advance(10_000);
        store.add_reading_time("A.epub", 4_000.0);
        store.add_reading_time("A.epub", 1_000.0);

        let stats = store.get_reading_stats("A.epub");
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.total_read_time_ms, 5_000);
        assert_eq!(stats.last_opened_at, Some(1_000));
        assert_eq!(stats.last_read_at, Some(11_000));
        assert_eq!(saves.get(), 3);
    }

    #[test]
    fn add_reading_time_ignores_invalid_deltas() {
        let (mut store, _, saves) = store_with_counter(json!({}));
        for delta in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            store.add_reading_time("A.epub", delta);
        }
        assert!(store.book("A.epub").is_none());
        assert_eq!(saves.get(), 0);
    }

    #[test]
    fn list_reading_stats_excludes_progress_only_entries() {
        let (mut store, clock, _) = store_with_counter(json!({
            "version": 1,
            "settings": {},
            "progress": { "Zero.epub": { "updatedAt": 0 } }
        }));
        store.set_progress("Synced.epub", Location::Offset(0.3));
        store.record_reading_session("Opened.epub");
        clock.advance(5_000);
        store.add_reading_time("Read.epub", 2_000.0);

        let listed: Vec<String> = store
            .list_reading_stats()
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        assert_eq!(listed, vec!["Read.epub".to_string(), "Opened.epub".to_string()]);
    }

    #[test]
    fn file_rename_is_idempotent() {
        let (mut store, _, saves) = store_with_counter(json!({}));
        store.set_progress("Old.epub", Location::Offset(1.0));
        store.rename_progress("Old.epub", "New.epub", false);
        let after_first = store.export_data();
        store.rename_progress("Old.epub", "New.epub", false);

        assert_eq!(store.export_data(), after_first);
        assert!(store.book("Old.epub").is_none());
        assert_eq!(store.get_progress("New.epub"), Some(Location::Offset(1.0)));
        assert_eq!(saves.get(), 2, "only the effective rename saves");
    }

    #[test]
    fn rename_without_entry_leaves_store_unchanged() {
        let (mut store, _, saves) = store_with_counter(json!({}));
        store.set_progress("Other.epub", Location::Offset(1.0));
        let before = store.export_data();
        store.rename_progress("Missing.epub", "Elsewhere.epub", false);
        store.rename_progress("MissingFolder", "Elsewhere", true);
        assert_eq!(store.export_data(), before);
        assert_eq!(saves.get(), 1);
    }

    #[test]
    fn folder_rename_rewrites_prefix() {
        let (mut store, _, _) = store_with_counter(json!({}));
        store.set_progress("Folder/A.epub", Location::Offset(1.0));
        store.set_progress("Folder/Sub/B.epub", Location::Offset(2.0));
        store.set_progress("FolderSibling/C.epub", Location::Offset(3.0));

        store.rename_progress("Folder", "Moved", true);

        let paths: Vec<&str> = store.progress_paths().collect();
        assert_eq!(
            paths,
            vec!["FolderSibling/C.epub", "Moved/A.epub", "Moved/Sub/B.epub"]
        );
        assert!(!paths.iter().any(|p| p.starts_with("Folder/")));
    }

    #[test]
    fn rename_collision_keeps_existing_destination() {
        let (mut store, _, _) = store_with_counter(json!({}));
        store.set_progress("Folder/A.epub", Location::Offset(1.0));
        store.set_progress("Moved/A.epub", Location::Offset(9.0));
        store.rename_progress("Folder", "Moved", true);
        assert_eq!(store.get_progress("Moved/A.epub"), Some(Location::Offset(9.0)));
        assert!(store.book("Folder/A.epub").is_none());
    }

    #[test]
    fn update_settings_sanitizes_and_skips_noop_saves() {
        let (mut store, _, saves) = store_with_counter(json!({}));
        store.update_settings(|settings| settings.font_size_percent = 10);
        assert_eq!(store.settings().font_size_percent, MIN_FONT_SIZE_PERCENT);
        store.update_settings(|settings| settings.font_size_percent = 80);
        assert_eq!(saves.get(), 1);
    }
}
