//! Database migrations embedded at compile time.
//!
//! Migrations are sourced from `/migrations/` at the repo root and
//! embedded into the binary using `include_str!`.

use rusqlite::{Connection, Result};
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order, embedded at compile time.
///
/// Version names match the SQL filenames (without .sql extension).
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_drop_task_objective_link",
        sql: include_str!("../../migrations/001_drop_task_objective_link.sql"),
    },
    Migration {
        version: "002_add_habit_period_start",
        sql: include_str!("../../migrations/002_add_habit_period_start.sql"),
    },
];

/// Run all pending migrations on the database.
///
/// Already-applied migrations (tracked in `schema_migrations`) are skipped,
/// so this is safe to call on every open.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. Column changes that the
/// base DDL already reflects (duplicate column on add, missing column on
/// drop) are logged and the migration is marked complete.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        if let Err(e) = conn.execute_batch(migration.sql) {
            let err_str = e.to_string();
            if err_str.contains("duplicate column name") {
                warn!(
                    version = migration.version,
                    "Migration partially applied (column exists), marking complete"
                );
            } else if err_str.contains("no such column") {
                warn!(
                    version = migration.version,
                    "Column already absent, marking complete"
                );
            } else {
                return Err(e);
            }
        }

        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;

        info!(version = migration.version, "Migration complete");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::{column_exists, SCHEMA_SQL};

    fn migration_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version NOT LIKE 'v%'",
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_run_migrations_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        run_migrations(&conn).expect("Migrations should apply to fresh database");
        assert_eq!(migration_count(&conn), 2);
    }

    #[test]
    fn test_run_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).expect("Second run should succeed");
        assert_eq!(migration_count(&conn), 2);
    }

    #[test]
    fn test_legacy_task_table_loses_objective_link() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE habits (
                 id TEXT PRIMARY KEY, owner TEXT NOT NULL, objective_id TEXT NOT NULL,
                 title TEXT NOT NULL, frequency TEXT NOT NULL, target_per_period INTEGER NOT NULL,
                 occurrences_in_period INTEGER NOT NULL DEFAULT 0, status TEXT NOT NULL DEFAULT 'active',
                 progress REAL NOT NULL DEFAULT 0, created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL
             );
             CREATE TABLE tasks (
                 id TEXT PRIMARY KEY, owner TEXT NOT NULL, objective_id TEXT, habit_id TEXT NOT NULL,
                 title TEXT NOT NULL
             );
             CREATE INDEX idx_tasks_objective ON tasks(objective_id);",
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        assert!(!column_exists(&conn, "tasks", "objective_id").unwrap());
        assert!(column_exists(&conn, "habits", "period_start").unwrap());
    }
}
