//! Configuration management.
//!
//! Resolves where the habitrack database lives, who the current owner is
//! and how long a writer waits for the SQLite write lock.
//!
//! Everything comes from flags and environment variables; there is no
//! config file.

use std::path::{Path, PathBuf};

/// Busy timeout used when `HT_BUSY_TIMEOUT_MS` is unset or unparsable.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Get the global habitrack directory (`~/.habitrack/`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".habitrack"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `HT_TEST_DB=1` (or any non-empty value
/// other than `0`/`false`). It redirects the database to an isolated file.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("HT_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path: `~/.habitrack/test/habitrack.db`.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("test").join("habitrack.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag or `HT_DB`)
/// 2. `HT_TEST_DB` → test database
/// 3. `HABITRACK_DB` environment variable
/// 4. `~/.habitrack/data/habitrack.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var("HABITRACK_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_dir().map(|dir| dir.join("data").join("habitrack.db"))
}

/// Get the default owner.
///
/// Priority:
/// 1. `HT_OWNER` environment variable
/// 2. Git user name
/// 3. System username
/// 4. "unknown"
#[must_use]
pub fn default_owner() -> String {
    if let Ok(owner) = std::env::var("HT_OWNER") {
        if !owner.trim().is_empty() {
            return owner;
        }
    }

    if let Ok(output) = std::process::Command::new("git")
        .args(["config", "user.name"])
        .output()
    {
        if output.status.success() {
            let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    if let Ok(user) = std::env::var("USER") {
        return user;
    }

    "unknown".to_string()
}

/// SQLite busy timeout in milliseconds, from `HT_BUSY_TIMEOUT_MS`.
#[must_use]
pub fn busy_timeout_ms() -> u64 {
    std::env::var("HT_BUSY_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_owner() {
        assert!(!default_owner().is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_default() {
        let path = resolve_db_path(None).unwrap();
        assert!(path.ends_with("habitrack.db"));
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_dir().unwrap();
        let test = test_db_path().unwrap();

        assert!(test.to_string_lossy().contains("test"));
        assert!(test.ends_with("habitrack.db"));
        assert_ne!(global.join("data").join("habitrack.db"), test);
    }

    #[test]
    fn test_truthy_values() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
    }
}
