//! Database schema definitions and migration logic.
//!
//! This module contains the complete SQLite schema for habitrack.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the habitrack database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds), calendar dates as
/// TEXT (`YYYY-MM-DD`) and progress as REAL with two decimals.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Objectives: top-level goals, progress derived from habits
CREATE TABLE IF NOT EXISTS objectives (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'planned'
        CHECK (status IN ('planned', 'in_progress', 'done', 'archived')),
    progress REAL NOT NULL DEFAULT 0
        CHECK (progress >= 0 AND progress <= 100),
    start_date TEXT,
    end_date TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_objectives_owner ON objectives(owner);
CREATE INDEX IF NOT EXISTS idx_objectives_owner_status ON objectives(owner, status);

-- Habits: recurring actions counted per cycle
CREATE TABLE IF NOT EXISTS habits (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    objective_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    frequency TEXT NOT NULL
        CHECK (frequency IN ('daily', 'weekly', 'monthly')),
    target_per_period INTEGER NOT NULL CHECK (target_per_period >= 1),
    occurrences_in_period INTEGER NOT NULL DEFAULT 0 CHECK (occurrences_in_period >= 0),
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'paused', 'done')),
    progress REAL NOT NULL DEFAULT 0
        CHECK (progress >= 0 AND progress <= 100),
    period_start TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (objective_id) REFERENCES objectives(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_habits_objective ON habits(objective_id);
CREATE INDEX IF NOT EXISTS idx_habits_owner ON habits(owner);

-- Occurrences: append-only log of habit performances
CREATE TABLE IF NOT EXISTS occurrences (
    id TEXT PRIMARY KEY,
    habit_id TEXT NOT NULL,
    owner TEXT NOT NULL,
    occurred_on TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
    note TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_occurrences_habit ON occurrences(habit_id, occurred_on DESC);

-- Tasks: kanban work items, always under a habit
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    habit_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    priority TEXT CHECK (priority IS NULL OR priority IN ('low', 'medium', 'high')),
    status TEXT NOT NULL DEFAULT 'backlog'
        CHECK (status IN ('backlog', 'todo', 'doing', 'blocked', 'done')),
    progress REAL NOT NULL DEFAULT 0
        CHECK (progress >= 0 AND progress <= 100),
    estimate_hours REAL,
    hours_spent REAL NOT NULL DEFAULT 0,
    due_date TEXT,
    position INTEGER,
    tags TEXT NOT NULL DEFAULT '[]',
    completed_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tasks_habit ON tasks(habit_id);
CREATE INDEX IF NOT EXISTS idx_tasks_owner_status ON tasks(owner, status);
CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);

-- ====================
-- Audit Trail
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id, created_at DESC);
";

/// Apply the schema to a connection.
///
/// # Errors
///
/// Returns an error if a pragma, the DDL or a migration fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    // Run migrations for existing databases
    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Check if a column exists in a table.
#[cfg(test)]
pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?1");
    conn.prepare(&sql)?.exists([column])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for table in ["objectives", "habits", "occurrences", "tasks", "events"] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_apply_schema_twice() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).expect("Schema should be idempotent");
    }

    #[test]
    fn test_tasks_have_no_objective_column() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        assert!(column_exists(&conn, "tasks", "habit_id").unwrap());
        assert!(!column_exists(&conn, "tasks", "objective_id").unwrap());
    }
}
