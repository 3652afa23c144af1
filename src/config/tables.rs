use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

/// On-disk layout of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    tracker: TrackerTable,
    #[serde(default)]
    persistence: PersistenceConfig,
    #[serde(default)]
    backlinks: BacklinksConfig,
    #[serde(default)]
    vault: VaultConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            tick_interval_ms: tables.tracker.tick_interval_ms,
            activity_timeout_ms: tables.tracker.activity_timeout_ms,
            max_tick_ms: tables.tracker.max_tick_ms,
            flush_threshold_ms: tables.tracker.flush_threshold_ms,
            save_debounce_ms: tables.persistence.save_debounce_ms,
            data_path: tables.persistence.data_path,
            highlight_limit: tables.backlinks.limit,
            refresh_debounce_ms: tables.backlinks.refresh_debounce_ms,
            book_extension: tables.vault.book_extension,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            tracker: TrackerTable {
                tick_interval_ms: config.tick_interval_ms,
                activity_timeout_ms: config.activity_timeout_ms,
                max_tick_ms: config.max_tick_ms,
                flush_threshold_ms: config.flush_threshold_ms,
            },
            persistence: PersistenceConfig {
                save_debounce_ms: config.save_debounce_ms,
                data_path: config.data_path.clone(),
            },
            backlinks: BacklinksConfig {
                limit: config.highlight_limit,
                refresh_debounce_ms: config.refresh_debounce_ms,
            },
            vault: VaultConfig {
                book_extension: config.book_extension.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TrackerTable {
    #[serde(default = "defaults::default_tick_interval_ms")]
    tick_interval_ms: u64,
    #[serde(default = "defaults::default_activity_timeout_ms")]
    activity_timeout_ms: u64,
    #[serde(default = "defaults::default_max_tick_ms")]
    max_tick_ms: u64,
    #[serde(default = "defaults::default_flush_threshold_ms")]
    flush_threshold_ms: u64,
}

impl Default for TrackerTable {
    fn default() -> Self {
        TrackerTable {
            tick_interval_ms: defaults::default_tick_interval_ms(),
            activity_timeout_ms: defaults::default_activity_timeout_ms(),
            max_tick_ms: defaults::default_max_tick_ms(),
            flush_threshold_ms: defaults::default_flush_threshold_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PersistenceConfig {
    #[serde(default = "defaults::default_save_debounce_ms")]
    save_debounce_ms: u64,
    #[serde(default = "defaults::default_data_path")]
    data_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            save_debounce_ms: defaults::default_save_debounce_ms(),
            data_path: defaults::default_data_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct BacklinksConfig {
    #[serde(default = "defaults::default_highlight_limit")]
    limit: usize,
    #[serde(default = "defaults::default_refresh_debounce_ms")]
    refresh_debounce_ms: u64,
}

impl Default for BacklinksConfig {
    fn default() -> Self {
        BacklinksConfig {
            limit: defaults::default_highlight_limit(),
            refresh_debounce_ms: defaults::default_refresh_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct VaultConfig {
    #[serde(default = "defaults::default_book_extension")]
    book_extension: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        VaultConfig {
            book_extension: defaults::default_book_extension(),
        }
    }
}
