//! Command implementations.

pub mod completions;
pub mod habit;
pub mod history;
pub mod init;
pub mod objective;
pub mod recompute;
pub mod task;
pub mod version;

use crate::config::{busy_timeout_ms, default_owner, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open the resolved database, failing if `ht init` has not been run.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    SqliteStorage::open_with_timeout(&db_path, Some(busy_timeout_ms()))
}

/// The `--owner` flag, falling back to the configured default.
pub(crate) fn resolve_owner(owner: Option<&str>) -> String {
    owner.map(ToString::to_string).unwrap_or_else(default_owner)
}

/// Print a preview of a write and report whether the caller should stop.
pub(crate) fn dry_run(action: &str, id: Option<&str>, summary: &str, json: bool) -> bool {
    if !crate::is_dry_run() {
        return false;
    }
    if json {
        let output = serde_json::json!({
            "dry_run": true,
            "action": action,
            "id": id,
        });
        println!("{output}");
    } else {
        println!("Would {summary}");
    }
    true
}

/// Split a comma-separated flag value, dropping empty entries.
pub(crate) fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub(crate) fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Shorten text for one-line table output.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
