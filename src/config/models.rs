use leafmark_core::session::SessionConfig;
use leafmark_core::tracker::TrackerConfig;
use serde::Deserialize;

/// Flattened driver configuration; the TOML file groups these into tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_activity_timeout_ms")]
    pub activity_timeout_ms: u64,
    #[serde(default = "crate::config::defaults::default_max_tick_ms")]
    pub max_tick_ms: u64,
    #[serde(default = "crate::config::defaults::default_flush_threshold_ms")]
    pub flush_threshold_ms: u64,
    #[serde(default = "crate::config::defaults::default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// Data file location, relative to the vault root unless absolute.
    #[serde(default = "crate::config::defaults::default_data_path")]
    pub data_path: String,
    #[serde(default = "crate::config::defaults::default_highlight_limit")]
    pub highlight_limit: usize,
    #[serde(default = "crate::config::defaults::default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,
    /// Book extension without the dot.
    #[serde(default = "crate::config::defaults::default_book_extension")]
    pub book_extension: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            tick_interval_ms: crate::config::defaults::default_tick_interval_ms(),
            activity_timeout_ms: crate::config::defaults::default_activity_timeout_ms(),
            max_tick_ms: crate::config::defaults::default_max_tick_ms(),
            flush_threshold_ms: crate::config::defaults::default_flush_threshold_ms(),
            save_debounce_ms: crate::config::defaults::default_save_debounce_ms(),
            data_path: crate::config::defaults::default_data_path(),
            highlight_limit: crate::config::defaults::default_highlight_limit(),
            refresh_debounce_ms: crate::config::defaults::default_refresh_debounce_ms(),
            book_extension: crate::config::defaults::default_book_extension(),
        }
    }
}

impl AppConfig {
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            tick_interval_ms: self.tick_interval_ms,
            activity_timeout_ms: self.activity_timeout_ms,
            max_tick_ms: self.max_tick_ms,
            flush_threshold_ms: self.flush_threshold_ms,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tracker: self.tracker_config(),
            highlight_limit: self.highlight_limit,
            refresh_debounce_ms: self.refresh_debounce_ms,
            save_debounce_ms: self.save_debounce_ms,
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Default, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
