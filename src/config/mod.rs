//! Configuration loading for the leafmark driver.
//!
//! Settings are read from `conf/config.toml` (or `LEAFMARK_CONFIG_PATH`) if
//! present. Missing or invalid entries fall back to defaults so commands
//! still run against a vault.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{config_path, load_config, serialize_config};
pub use models::{AppConfig, LogLevel};
