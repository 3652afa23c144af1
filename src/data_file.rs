//! The plugin data file: `<vault>/.leafmark/data.json` by default.
//!
//! Reads never fail: a missing or corrupt file yields `Value::Null`, which
//! the store treats as "start from defaults". Write errors are logged and
//! swallowed; at most one debounce window of progress is lost.

use anyhow::{Context, Result};
use leafmark_core::store::PersistedDocument;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Resolve the configured data path against the vault root.
pub fn data_file_path(vault_root: &Path, configured: &str) -> PathBuf {
    let configured = Path::new(configured);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        vault_root.join(configured)
    }
}

pub fn load_document(path: &Path) -> Value {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => {
            debug!(path = %path.display(), "No readable data file: {err}");
            return Value::Null;
        }
    };
    match serde_json::from_str(&data) {
        Ok(value) => {
            info!(path = %path.display(), "Loaded reading data");
            value
        }
        Err(err) => {
            warn!(path = %path.display(), "Ignoring corrupt data file: {err}");
            Value::Null
        }
    }
}

pub fn save_document(path: &Path, document: &PersistedDocument) {
    if let Err(err) = write_document(path, document) {
        warn!(path = %path.display(), "Failed to save reading data: {err:#}");
    }
}

fn write_document(path: &Path, document: &PersistedDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents =
        serde_json::to_string_pretty(document).context("failed to serialize reading data")?;
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), books = document.progress.len(), "Saved reading data");
    Ok(())
}
