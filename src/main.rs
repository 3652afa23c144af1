//! Headless driver for the leafmark core.
//!
//! Backs the core with a real vault directory and the JSON data file:
//! - Parse command-line arguments.
//! - Load configuration from `conf/config.toml` (or `LEAFMARK_CONFIG_PATH`).
//! - Run one command against the vault and persist any store changes.

mod config;
mod data_file;
mod vault;

use crate::config::{AppConfig, config_path, load_config, serialize_config};
use crate::data_file::{data_file_path, load_document, save_document};
use crate::vault::FsVault;
use anyhow::{Context, Result, anyhow};
use leafmark_core::clock::SystemClock;
use leafmark_core::notes::{book_note_path, book_note_template};
use leafmark_core::text_utils::format_duration;
use leafmark_core::{
    BacklinkResolver, ProgressProvider, ReaderSession, ReadingStore, build_location_link,
};
use std::cell::RefCell;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage:
  leafmark backlinks <vault> <book>
  leafmark stats <vault>
  leafmark rename <vault> <old-path> <new-path> [--folder]
  leafmark link <book> <location> [label]
  leafmark note <vault> <book>
  leafmark session <vault> <book>
  leafmark config";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Backlinks { vault: PathBuf, book: String },
    Stats { vault: PathBuf },
    Rename {
        vault: PathBuf,
        old_path: String,
        new_path: String,
        is_folder: bool,
    },
    Link {
        book: String,
        location: String,
        label: String,
    },
    Note { vault: PathBuf, book: String },
    Session { vault: PathBuf, book: String },
    Config,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let command = parse_args(env::args().skip(1))?;
    let config = load_config(&config_path());
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(level = %config.log_level, "Starting leafmark");

    match command {
        Command::Backlinks { vault, book } => print_backlinks(&config, &vault, &book),
        Command::Stats { vault } => print_stats(&config, &vault),
        Command::Rename {
            vault,
            old_path,
            new_path,
            is_folder,
        } => rename(&config, &vault, &old_path, &new_path, is_folder),
        Command::Link {
            book,
            location,
            label,
        } => {
            println!("{}", build_location_link(&book, &location, &label));
            Ok(())
        }
        Command::Note { vault, book } => create_note(&config, &vault, &book),
        Command::Session { vault, book } => record_session(&config, &vault, &book),
        Command::Config => {
            print!("{}", serialize_config(&config)?);
            Ok(())
        }
    }
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args: Vec<String> = args.into_iter().collect();
    let is_folder = match args.iter().position(|arg| arg == "--folder") {
        Some(idx) => {
            args.remove(idx);
            true
        }
        None => false,
    };
    let usage = || anyhow!("{USAGE}");
    let mut args = args.into_iter();
    let name = args.next().ok_or_else(usage)?;
    let mut next = || args.next().ok_or_else(usage);

    let command = match name.as_str() {
        "backlinks" => Command::Backlinks {
            vault: PathBuf::from(next()?),
            book: next()?,
        },
        "stats" => Command::Stats {
            vault: PathBuf::from(next()?),
        },
        "rename" => Command::Rename {
            vault: PathBuf::from(next()?),
            old_path: next()?,
            new_path: next()?,
            is_folder,
        },
        "link" => Command::Link {
            book: next()?,
            location: next()?,
            label: next().unwrap_or_default(),
        },
        "note" => Command::Note {
            vault: PathBuf::from(next()?),
            book: next()?,
        },
        "session" => Command::Session {
            vault: PathBuf::from(next()?),
            book: next()?,
        },
        "config" => Command::Config,
        other => return Err(anyhow!("Unknown command '{other}'\n{USAGE}")),
    };
    Ok(command)
}

fn open_store(config: &AppConfig, vault: &Path) -> (ReadingStore, PathBuf) {
    let path = data_file_path(vault, &config.data_path);
    let store = ReadingStore::load(&load_document(&path), SystemClock);
    (store, path)
}

fn ensure_vault(vault: &Path) -> Result<()> {
    if !vault.is_dir() {
        return Err(anyhow!("Vault not found: {}", vault.display()));
    }
    Ok(())
}

fn print_backlinks(config: &AppConfig, vault: &Path, book: &str) -> Result<()> {
    ensure_vault(vault)?;
    let index = FsVault::open(vault, &config.book_extension)?;
    let mut resolver = BacklinkResolver::new(&index, config.book_extension.as_str());
    let highlights = resolver.highlights_for_book(book, config.highlight_limit);
    let json = serde_json::to_string_pretty(&*highlights)
        .context("failed to serialize highlights")?;
    println!("{json}");
    Ok(())
}

fn print_stats(config: &AppConfig, vault: &Path) -> Result<()> {
    ensure_vault(vault)?;
    let (store, _) = open_store(config, vault);
    let entries = store.list_reading_stats();
    if entries.is_empty() {
        println!("No reading activity recorded");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{:>8}  {:>4} sessions  {}",
            format_duration(entry.stats.total_read_time_ms),
            entry.stats.session_count,
            entry.path
        );
    }
    Ok(())
}

fn rename(
    config: &AppConfig,
    vault: &Path,
    old_path: &str,
    new_path: &str,
    is_folder: bool,
) -> Result<()> {
    ensure_vault(vault)?;
    let (mut store, data_path) = open_store(config, vault);
    let before = store.export_data();
    store.rename_progress(old_path, new_path, is_folder);
    if store.export_data() == before {
        warn!(old_path, "No reading progress recorded under that path");
        return Ok(());
    }
    save_document(&data_path, &store.export_data());
    Ok(())
}

fn create_note(config: &AppConfig, vault: &Path, book: &str) -> Result<()> {
    ensure_vault(vault)?;
    let (store, _) = open_store(config, vault);
    let note = book_note_path(store.settings(), book);
    let absolute = vault.join(&note);
    if absolute.exists() {
        println!("{note}");
        return Ok(());
    }
    if let Some(parent) = absolute.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&absolute, book_note_template(store.settings(), book))
        .with_context(|| format!("failed to write {}", absolute.display()))?;
    info!(note = %note, "Created book note");
    println!("{note}");
    Ok(())
}

/// Open and immediately close a book: counts a session and prints what the
/// reader view would restore.
fn record_session(config: &AppConfig, vault: &Path, book: &str) -> Result<()> {
    ensure_vault(vault)?;
    let index = FsVault::open(vault, &config.book_extension)?;
    let (store, data_path) = open_store(config, vault);
    let store = Rc::new(RefCell::new(store));
    let mut session = ReaderSession::new(
        Rc::clone(&store),
        &index,
        &config.book_extension,
        SystemClock,
        config.session_config(),
    );
    store.borrow_mut().set_save_hook(session.save_hook());

    let opened = session.open_book(book);
    match &opened.location {
        Some(location) => println!("{}: resume at {location}", opened.path),
        None => println!("{}: no saved position", opened.path),
    }
    println!("{} highlight(s) from linked notes", opened.highlights.len());
    let stats = store.borrow().get_reading_stats(&opened.path);
    println!(
        "{} read over {} session(s)",
        format_duration(stats.total_read_time_ms),
        stats.session_count
    );

    session.close();
    if session.flush_save() {
        save_document(&data_path, &store.borrow().export_data());
    }
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    }
}
