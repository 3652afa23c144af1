use super::defaults::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use super::models::AppConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// `LEAFMARK_CONFIG_PATH` when set, else `conf/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Load configuration from the given path, falling back to defaults on error.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            AppConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let tables: ConfigTables = toml::from_str(contents).context("failed to parse config TOML")?;
    Ok(tables.into())
}

pub fn serialize_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(&ConfigTables::from(config)).context("failed to serialize config")
}
