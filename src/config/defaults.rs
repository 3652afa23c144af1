use leafmark_core::resolver::DEFAULT_HIGHLIGHT_LIMIT;
use leafmark_core::scheduler::DEFAULT_SAVE_DEBOUNCE_MS;
use leafmark_core::session::DEFAULT_REFRESH_DEBOUNCE_MS;
use leafmark_core::tracker::TrackerConfig;

pub(crate) const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";
pub(crate) const CONFIG_PATH_ENV: &str = "LEAFMARK_CONFIG_PATH";

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

pub(crate) fn default_tick_interval_ms() -> u64 {
    TrackerConfig::default().tick_interval_ms
}

pub(crate) fn default_activity_timeout_ms() -> u64 {
    TrackerConfig::default().activity_timeout_ms
}

pub(crate) fn default_max_tick_ms() -> u64 {
    TrackerConfig::default().max_tick_ms
}

pub(crate) fn default_flush_threshold_ms() -> u64 {
    TrackerConfig::default().flush_threshold_ms
}

pub(crate) fn default_save_debounce_ms() -> u64 {
    DEFAULT_SAVE_DEBOUNCE_MS
}

pub(crate) fn default_data_path() -> String {
    ".leafmark/data.json".to_string()
}

pub(crate) fn default_highlight_limit() -> usize {
    DEFAULT_HIGHLIGHT_LIMIT
}

pub(crate) fn default_refresh_debounce_ms() -> u64 {
    DEFAULT_REFRESH_DEBOUNCE_MS
}

pub(crate) fn default_book_extension() -> String {
    "epub".to_string()
}
