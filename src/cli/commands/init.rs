//! Initialize the habitrack database.
//!
//! The database lives at the resolved path (`--db`, `HT_DB`, test mode,
//! `HABITRACK_DB`, then `~/.habitrack/data/habitrack.db`). Opening it
//! applies the schema, so init only needs to create the file once.

use crate::config::{global_dir, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    reinitialized: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the directory or database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path()))
        .ok_or_else(|| Error::Config("Could not determine the habitrack directory".to_string()))?;

    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if crate::is_dry_run() {
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "init",
                "database": db_path,
            });
            println!("{output}");
        } else {
            println!("Would initialize database at {}", db_path.display());
        }
        return Ok(());
    }

    create_database(&db_path, existed)?;

    // Keep a default-location database out of version control.
    if let Some(base_dir) = global_dir() {
        if db_path.starts_with(&base_dir) {
            let gitignore_path = base_dir.join(".gitignore");
            if !gitignore_path.exists() {
                fs::write(&gitignore_path, "# Everything in habitrack is local-only\n*\n")?;
            }
        }
    }

    if crate::is_silent() {
        println!("{}", db_path.display());
        return Ok(());
    }

    if json {
        let output = InitOutput {
            database: db_path,
            reinitialized: existed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized habitrack database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: ht objective create \"<title>\"");
    }

    Ok(())
}

/// Create (or recreate) the database file and apply the schema.
fn create_database(db_path: &Path, existed: bool) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    if existed {
        fs::remove_file(db_path)?;
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db_path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                fs::remove_file(&sidecar)?;
            }
        }
    }

    SqliteStorage::open(db_path)?;
    info!(path = %db_path.display(), reinitialized = existed, "database initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("nested").join("ht.db");

        assert!(execute(Some(&db), false, true).is_ok());
        assert!(db.exists());
        assert!(SqliteStorage::open(&db).is_ok());
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("ht.db");

        assert!(execute(Some(&db), false, true).is_ok());
        let result = execute(Some(&db), false, true);
        assert!(matches!(result, Err(Error::AlreadyInitialized { .. })));
    }

    #[test]
    fn test_init_force_recreates() {
        let temp_dir = TempDir::new().unwrap();
        let db = temp_dir.path().join("ht.db");

        assert!(execute(Some(&db), false, true).is_ok());
        {
            let mut storage = SqliteStorage::open(&db).unwrap();
            let objective =
                crate::model::Objective::new("ana".to_string(), "Learn piano".to_string());
            storage.create_objective(&objective, "ana").unwrap();
        }

        assert!(execute(Some(&db), true, true).is_ok());
        let storage = SqliteStorage::open(&db).unwrap();
        let objectives = storage
            .list_objectives("ana", &crate::storage::ObjectiveFilter::default())
            .unwrap();
        assert!(objectives.is_empty());
    }
}
