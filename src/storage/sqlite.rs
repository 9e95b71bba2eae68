//! SQLite storage implementation.
//!
//! This module provides the storage backend for habitrack using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::model::{
    Frequency, Habit, HabitPatch, HabitStatus, Objective, ObjectivePatch, ObjectiveStats,
    ObjectiveStatus, Occurrence, Progress, Task, TaskPriority, TaskStatus,
};
use crate::progress::store::ProgressStore;
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Storage format for calendar dates.
const DATE_FORMAT: &str = "%Y-%m-%d";

const OBJECTIVE_COLUMNS: &str =
    "id, owner, title, description, status, progress, start_date, end_date, created_at, updated_at";

const HABIT_COLUMNS: &str = "id, owner, objective_id, title, description, frequency, \
     target_per_period, occurrences_in_period, status, progress, period_start, created_at, updated_at";

const TASK_COLUMNS: &str = "id, owner, habit_id, title, description, priority, status, progress, \
     estimate_hours, hours_spent, due_date, position, tags, completed_at, created_at, updated_at";

const OCCURRENCE_COLUMNS: &str = "id, habit_id, owner, occurred_on, quantity, note, created_at";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures to collect audit events, which are written
/// in the same transaction just before commit.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Owner performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value)
                .with_comment(&self.op_name),
        );
    }
}

/// Filters for listing objectives.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveFilter {
    pub status: Option<ObjectiveStatus>,
    /// Case-insensitive substring of title or description
    pub search: Option<String>,
    pub limit: Option<u32>,
}

/// Filters for listing habits.
#[derive(Debug, Clone, Default)]
pub struct HabitFilter {
    pub objective_id: Option<String>,
    pub status: Option<HabitStatus>,
    pub frequency: Option<Frequency>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

/// Filters for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub habit_id: Option<String>,
    /// Empty means any status
    pub statuses: Vec<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub due_before: Option<NaiveDate>,
    pub due_after: Option<NaiveDate>,
    pub limit: Option<u32>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// Writers on the same habit serialize on SQLite's write lock; the busy
    /// timeout bounds how long a second writer waits for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        // Dropping `tx` on an early return rolls back
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        debug!(op, events = ctx.events.len(), "mutation committed");

        Ok(result)
    }

    // ====================
    // Objective Operations
    // ====================

    /// Insert a new objective.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if validation fails or an error if the insert fails.
    pub fn create_objective(&mut self, objective: &Objective, actor: &str) -> Result<()> {
        objective.validate()?;

        self.mutate("create_objective", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO objectives (id, owner, title, description, status, progress, start_date, end_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    objective.id,
                    objective.owner,
                    objective.title,
                    objective.description,
                    objective.status.as_str(),
                    objective.progress.as_f64(),
                    format_date(objective.start_date),
                    format_date(objective.end_date),
                    objective.created_at,
                    objective.updated_at,
                ],
            )?;

            ctx.record_event("objective", &objective.id, EventType::ObjectiveCreated);
            Ok(())
        })?;

        info!(id = %objective.id, owner = %objective.owner, "objective created");
        Ok(())
    }

    /// Get an objective by ID, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_objective(&self, id: &str, owner: &str) -> Result<Option<Objective>> {
        ProgressStore::get_objective(&self.conn, id, Some(owner))
    }

    /// List an owner's objectives, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_objectives(&self, owner: &str, filter: &ObjectiveFilter) -> Result<Vec<Objective>> {
        let mut conditions = vec!["owner = ?".to_string()];
        let mut values = vec![Value::Text(owner.to_string())];

        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            values.push(Value::Text(status.as_str().to_string()));
        }
        push_search(&mut conditions, &mut values, filter.search.as_deref());
        values.push(Value::Integer(i64::from(filter.limit.unwrap_or(100))));

        let sql = format!(
            "SELECT {OBJECTIVE_COLUMNS} FROM objectives WHERE {} ORDER BY updated_at DESC, id LIMIT ?",
            conditions.join(" AND ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let objectives = stmt
            .query_map(params_from_iter(values), map_objective_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(objectives)
    }

    /// Apply a patch to an objective's editable fields.
    ///
    /// Progress is not touched here.
    ///
    /// # Errors
    ///
    /// Returns `ObjectiveNotFound` if the objective is missing or not owned,
    /// `InvalidInput` if the patched objective fails validation.
    pub fn update_objective(
        &mut self,
        id: &str,
        owner: &str,
        patch: &ObjectivePatch,
        actor: &str,
    ) -> Result<Objective> {
        self.mutate("update_objective", actor, |tx, ctx| {
            let mut objective = tx
                .get_objective(id, Some(owner))?
                .ok_or_else(|| Error::ObjectiveNotFound { id: id.to_string() })?;
            let old_status = objective.status;

            patch.apply(&mut objective);
            objective.validate()?;
            objective.updated_at = chrono::Utc::now().timestamp_millis();

            tx.execute(
                "UPDATE objectives
                 SET title = ?1, description = ?2, status = ?3, start_date = ?4, end_date = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    objective.title,
                    objective.description,
                    objective.status.as_str(),
                    format_date(objective.start_date),
                    format_date(objective.end_date),
                    objective.updated_at,
                    id,
                ],
            )?;

            if old_status == objective.status {
                ctx.record_event("objective", id, EventType::ObjectiveUpdated);
            } else {
                ctx.record_change(
                    "objective",
                    id,
                    EventType::ObjectiveUpdated,
                    Some(old_status.as_str().to_string()),
                    Some(objective.status.as_str().to_string()),
                );
            }
            Ok(objective)
        })
    }

    /// Delete an objective. Its habits, their tasks and occurrences go with it.
    ///
    /// # Errors
    ///
    /// Returns `ObjectiveNotFound` if the objective is missing or not owned.
    pub fn delete_objective(&mut self, id: &str, owner: &str, actor: &str) -> Result<Objective> {
        let objective = self.mutate("delete_objective", actor, |tx, ctx| {
            let objective = tx
                .get_objective(id, Some(owner))?
                .ok_or_else(|| Error::ObjectiveNotFound { id: id.to_string() })?;

            tx.execute("DELETE FROM objectives WHERE id = ?1", [id])?;

            ctx.record_event("objective", id, EventType::ObjectiveDeleted);
            Ok(objective)
        })?;

        info!(id, "objective deleted");
        Ok(objective)
    }

    /// Summary counts for one objective.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn get_objective_stats(&self, objective_id: &str) -> Result<ObjectiveStats> {
        let habits = self.conn.list_habits_by_objective(objective_id)?;

        let mut stmt = self.conn.prepare(
            "SELECT t.status, t.progress
             FROM tasks t JOIN habits h ON t.habit_id = h.id
             WHERE h.objective_id = ?1",
        )?;
        let tasks = stmt
            .query_map([objective_id], |row| {
                let status: String = row.get(0)?;
                let progress: f64 = row.get(1)?;
                Ok((TaskStatus::from_str(&status), Progress::from_percent_lossy(progress)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ObjectiveStats {
            total_habits: habits.len(),
            active_habits: habits
                .iter()
                .filter(|h| h.status == HabitStatus::Active)
                .count(),
            total_tasks: tasks.len(),
            done_tasks: tasks.iter().filter(|(status, _)| status.is_done()).count(),
            mean_habit_progress: Progress::mean(habits.iter().map(|h| h.progress)),
            mean_task_progress: Progress::mean(tasks.iter().map(|(_, p)| *p)),
        })
    }

    /// IDs of every objective an owner has.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_objective_ids(&self, owner: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM objectives WHERE owner = ?1 ORDER BY created_at, id")?;
        let ids = stmt
            .query_map([owner], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ================
    // Habit Operations
    // ================

    /// Insert a new habit under one of the owner's objectives.
    ///
    /// # Errors
    ///
    /// Returns `ObjectiveNotFound` if the parent is missing or owned by
    /// someone else, `InvalidInput` if validation fails.
    pub fn create_habit(&mut self, habit: &Habit, actor: &str) -> Result<()> {
        habit.validate()?;

        self.mutate("create_habit", actor, |tx, ctx| {
            if tx.get_objective(&habit.objective_id, Some(&habit.owner))?.is_none() {
                return Err(Error::ObjectiveNotFound {
                    id: habit.objective_id.clone(),
                });
            }

            tx.execute(
                "INSERT INTO habits (id, owner, objective_id, title, description, frequency, target_per_period,
                                     occurrences_in_period, status, progress, period_start, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    habit.id,
                    habit.owner,
                    habit.objective_id,
                    habit.title,
                    habit.description,
                    habit.frequency.as_str(),
                    habit.target_per_period,
                    habit.occurrences_in_period,
                    habit.status.as_str(),
                    habit.progress.as_f64(),
                    format_date(habit.period_start),
                    habit.created_at,
                    habit.updated_at,
                ],
            )?;

            ctx.record_event("habit", &habit.id, EventType::HabitCreated);
            Ok(())
        })?;

        info!(id = %habit.id, objective = %habit.objective_id, "habit created");
        Ok(())
    }

    /// Get a habit by ID, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_habit(&self, id: &str, owner: &str) -> Result<Option<Habit>> {
        ProgressStore::get_habit(&self.conn, id, Some(owner))
    }

    /// List an owner's habits.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_habits(&self, owner: &str, filter: &HabitFilter) -> Result<Vec<Habit>> {
        let mut conditions = vec!["owner = ?".to_string()];
        let mut values = vec![Value::Text(owner.to_string())];

        if let Some(ref objective_id) = filter.objective_id {
            conditions.push("objective_id = ?".to_string());
            values.push(Value::Text(objective_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?".to_string());
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(frequency) = filter.frequency {
            conditions.push("frequency = ?".to_string());
            values.push(Value::Text(frequency.as_str().to_string()));
        }
        push_search(&mut conditions, &mut values, filter.search.as_deref());
        values.push(Value::Integer(i64::from(filter.limit.unwrap_or(100))));

        let sql = format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE {} ORDER BY created_at, id LIMIT ?",
            conditions.join(" AND ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let habits = stmt
            .query_map(params_from_iter(values), map_habit_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    /// Apply a patch to a habit's editable fields.
    ///
    /// Progress is left stale; callers recompute it afterwards.
    ///
    /// # Errors
    ///
    /// Returns `HabitNotFound` if the habit is missing or not owned,
    /// `InvalidInput` if the patched habit fails validation.
    pub fn update_habit(
        &mut self,
        id: &str,
        owner: &str,
        patch: &HabitPatch,
        actor: &str,
    ) -> Result<Habit> {
        self.mutate("update_habit", actor, |tx, ctx| {
            let mut habit = tx
                .get_habit(id, Some(owner))?
                .ok_or_else(|| Error::HabitNotFound { id: id.to_string() })?;
            let old_target = habit.target_per_period;

            patch.apply(&mut habit);
            habit.validate()?;
            habit.updated_at = chrono::Utc::now().timestamp_millis();

            tx.execute(
                "UPDATE habits
                 SET title = ?1, description = ?2, frequency = ?3, target_per_period = ?4,
                     occurrences_in_period = ?5, status = ?6, updated_at = ?7
                 WHERE id = ?8",
                params![
                    habit.title,
                    habit.description,
                    habit.frequency.as_str(),
                    habit.target_per_period,
                    habit.occurrences_in_period,
                    habit.status.as_str(),
                    habit.updated_at,
                    id,
                ],
            )?;

            if old_target == habit.target_per_period {
                ctx.record_event("habit", id, EventType::HabitUpdated);
            } else {
                ctx.record_change(
                    "habit",
                    id,
                    EventType::HabitUpdated,
                    Some(old_target.to_string()),
                    Some(habit.target_per_period.to_string()),
                );
            }
            Ok(habit)
        })
    }

    /// Delete a habit together with its tasks and occurrences.
    ///
    /// Returns the deleted habit so the caller can recompute its objective.
    ///
    /// # Errors
    ///
    /// Returns `HabitNotFound` if the habit is missing or not owned.
    pub fn delete_habit(&mut self, id: &str, owner: &str, actor: &str) -> Result<Habit> {
        let habit = self.mutate("delete_habit", actor, |tx, ctx| {
            let habit = tx
                .get_habit(id, Some(owner))?
                .ok_or_else(|| Error::HabitNotFound { id: id.to_string() })?;

            tx.execute("DELETE FROM habits WHERE id = ?1", [id])?;

            ctx.record_event("habit", id, EventType::HabitDeleted);
            Ok(habit)
        })?;

        info!(id, objective = %habit.objective_id, "habit deleted");
        Ok(habit)
    }

    /// A habit's occurrence log, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_occurrences(&self, habit_id: &str, limit: Option<u32>) -> Result<Vec<Occurrence>> {
        let sql = format!(
            "SELECT {OCCURRENCE_COLUMNS} FROM occurrences
             WHERE habit_id = ?1
             ORDER BY occurred_on DESC, created_at DESC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let occurrences = stmt
            .query_map(params![habit_id, limit.unwrap_or(50)], map_occurrence_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(occurrences)
    }

    /// IDs of every habit an owner has.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_habit_ids(&self, owner: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM habits WHERE owner = ?1 ORDER BY created_at, id")?;
        let ids = stmt
            .query_map([owner], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ===============
    // Task Operations
    // ===============

    /// Insert a new task under one of the owner's habits.
    ///
    /// # Errors
    ///
    /// Returns `HabitNotFound` if the parent habit is missing or owned by
    /// someone else, `InvalidInput` if validation fails.
    pub fn create_task(&mut self, task: &Task, actor: &str) -> Result<()> {
        task.validate()?;
        let tags = serde_json::to_string(&task.tags)?;

        self.mutate("create_task", actor, |tx, ctx| {
            if tx.get_habit(&task.habit_id, Some(&task.owner))?.is_none() {
                return Err(Error::HabitNotFound {
                    id: task.habit_id.clone(),
                });
            }

            tx.execute(
                "INSERT INTO tasks (id, owner, habit_id, title, description, priority, status, progress,
                                    estimate_hours, hours_spent, due_date, position, tags, completed_at,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    task.id,
                    task.owner,
                    task.habit_id,
                    task.title,
                    task.description,
                    task.priority.map(|p| p.as_str()),
                    task.status.as_str(),
                    task.progress.as_f64(),
                    task.estimate_hours,
                    task.hours_spent,
                    format_date(task.due_date),
                    task.position,
                    tags,
                    task.completed_at,
                    task.created_at,
                    task.updated_at,
                ],
            )?;

            ctx.record_event("task", &task.id, EventType::TaskCreated);
            Ok(())
        })?;

        info!(id = %task.id, habit = %task.habit_id, "task created");
        Ok(())
    }

    /// Get a task by ID, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_task(&self, id: &str, owner: &str) -> Result<Option<Task>> {
        ProgressStore::get_task(&self.conn, id, Some(owner))
    }

    /// List an owner's tasks in board order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_tasks(&self, owner: &str, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut conditions = vec!["owner = ?".to_string()];
        let mut values = vec![Value::Text(owner.to_string())];

        if let Some(ref habit_id) = filter.habit_id {
            conditions.push("habit_id = ?".to_string());
            values.push(Value::Text(habit_id.clone()));
        }
        if !filter.statuses.is_empty() {
            let placeholders = vec!["?"; filter.statuses.len()].join(", ");
            conditions.push(format!("status IN ({placeholders})"));
            values.extend(
                filter
                    .statuses
                    .iter()
                    .map(|s| Value::Text(s.as_str().to_string())),
            );
        }
        if let Some(priority) = filter.priority {
            conditions.push("priority = ?".to_string());
            values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(before) = filter.due_before {
            conditions.push("due_date IS NOT NULL AND due_date <= ?".to_string());
            values.push(Value::Text(before.format(DATE_FORMAT).to_string()));
        }
        if let Some(after) = filter.due_after {
            conditions.push("due_date IS NOT NULL AND due_date >= ?".to_string());
            values.push(Value::Text(after.format(DATE_FORMAT).to_string()));
        }
        push_search(&mut conditions, &mut values, filter.search.as_deref());
        values.push(Value::Integer(i64::from(filter.limit.unwrap_or(200))));

        // Unpositioned tasks sort after positioned ones
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE {}
             ORDER BY position IS NULL, position, created_at, id
             LIMIT ?",
            conditions.join(" AND ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params_from_iter(values), map_task_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Delete a task.
    ///
    /// Returns the deleted task so the caller can recompute its habit.
    ///
    /// # Errors
    ///
    /// Returns `TaskNotFound` if the task is missing or not owned.
    pub fn delete_task(&mut self, id: &str, owner: &str, actor: &str) -> Result<Task> {
        let task = self.mutate("delete_task", actor, |tx, ctx| {
            let task = tx
                .get_task(id, Some(owner))?
                .ok_or_else(|| Error::TaskNotFound { id: id.to_string() })?;

            tx.execute("DELETE FROM tasks WHERE id = ?1", [id])?;

            ctx.record_event("task", id, EventType::TaskDeleted);
            Ok(task)
        })?;

        info!(id, habit = %task.habit_id, "task deleted");
        Ok(task)
    }

    /// IDs of every task an owner has.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_task_ids(&self, owner: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM tasks WHERE owner = ?1 ORDER BY created_at, id")?;
        let ids = stmt
            .query_map([owner], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ======
    // Events
    // ======

    /// Audit history of one entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_history(&self, entity_type: &str, entity_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, entity_type, entity_id, limit)?)
    }
}

// ===========================
// Progress engine persistence
// ===========================

impl ProgressStore for Connection {
    fn get_habit(&self, id: &str, owner: Option<&str>) -> Result<Option<Habit>> {
        let habit = self
            .query_row(
                &format!(
                    "SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1 AND (?2 IS NULL OR owner = ?2)"
                ),
                params![id, owner],
                map_habit_row,
            )
            .optional()?;
        Ok(habit)
    }

    fn update_habit_progress(&self, id: &str, progress: Progress) -> Result<()> {
        let updated = self.execute(
            "UPDATE habits SET progress = ?1, updated_at = ?2 WHERE id = ?3",
            params![progress.as_f64(), chrono::Utc::now().timestamp_millis(), id],
        )?;
        if updated == 0 {
            return Err(Error::HabitNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn increment_habit_occurrences(&self, id: &str, quantity: i64) -> Result<i64> {
        self.query_row(
            "UPDATE habits
             SET occurrences_in_period = occurrences_in_period + ?1, updated_at = ?2
             WHERE id = ?3
             RETURNING occurrences_in_period",
            params![quantity, chrono::Utc::now().timestamp_millis(), id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| Error::HabitNotFound { id: id.to_string() })
    }

    fn reset_habit_cycle(&self, id: &str, period_start: NaiveDate) -> Result<()> {
        let updated = self.execute(
            "UPDATE habits
             SET occurrences_in_period = 0, progress = 0, period_start = ?1, updated_at = ?2
             WHERE id = ?3",
            params![
                period_start.format(DATE_FORMAT).to_string(),
                chrono::Utc::now().timestamp_millis(),
                id
            ],
        )?;
        if updated == 0 {
            return Err(Error::HabitNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn list_habits_by_objective(&self, objective_id: &str) -> Result<Vec<Habit>> {
        let mut stmt = self.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE objective_id = ?1 ORDER BY created_at, id"
        ))?;
        let habits = stmt
            .query_map([objective_id], map_habit_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(habits)
    }

    fn get_objective(&self, id: &str, owner: Option<&str>) -> Result<Option<Objective>> {
        let objective = self
            .query_row(
                &format!(
                    "SELECT {OBJECTIVE_COLUMNS} FROM objectives WHERE id = ?1 AND (?2 IS NULL OR owner = ?2)"
                ),
                params![id, owner],
                map_objective_row,
            )
            .optional()?;
        Ok(objective)
    }

    fn update_objective_progress(&self, id: &str, progress: Progress) -> Result<()> {
        let updated = self.execute(
            "UPDATE objectives SET progress = ?1, updated_at = ?2 WHERE id = ?3",
            params![progress.as_f64(), chrono::Utc::now().timestamp_millis(), id],
        )?;
        if updated == 0 {
            return Err(Error::ObjectiveNotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn insert_occurrence(&self, occurrence: &Occurrence) -> Result<()> {
        self.execute(
            "INSERT INTO occurrences (id, habit_id, owner, occurred_on, quantity, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                occurrence.id,
                occurrence.habit_id,
                occurrence.owner,
                occurrence.occurred_on.format(DATE_FORMAT).to_string(),
                occurrence.quantity,
                occurrence.note,
                occurrence.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_task(&self, id: &str, owner: Option<&str>) -> Result<Option<Task>> {
        let task = self
            .query_row(
                &format!(
                    "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND (?2 IS NULL OR owner = ?2)"
                ),
                params![id, owner],
                map_task_row,
            )
            .optional()?;
        Ok(task)
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        let tags = serde_json::to_string(&task.tags)?;
        let updated = self.execute(
            "UPDATE tasks
             SET habit_id = ?1, title = ?2, description = ?3, priority = ?4, status = ?5, progress = ?6,
                 estimate_hours = ?7, hours_spent = ?8, due_date = ?9, position = ?10, tags = ?11,
                 completed_at = ?12, updated_at = ?13
             WHERE id = ?14",
            params![
                task.habit_id,
                task.title,
                task.description,
                task.priority.map(|p| p.as_str()),
                task.status.as_str(),
                task.progress.as_f64(),
                task.estimate_hours,
                task.hours_spent,
                format_date(task.due_date),
                task.position,
                tags,
                task.completed_at,
                task.updated_at,
                task.id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::TaskNotFound {
                id: task.id.clone(),
            });
        }
        Ok(())
    }
}

// ===========
// Row helpers
// ===========

fn push_search(conditions: &mut Vec<String>, values: &mut Vec<Value>, search: Option<&str>) {
    if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
        conditions.push(
            "(title LIKE ? COLLATE NOCASE OR COALESCE(description, '') LIKE ? COLLATE NOCASE)"
                .to_string(),
        );
        let pattern = format!("%{term}%");
        values.push(Value::Text(pattern.clone()));
        values.push(Value::Text(pattern));
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn date_column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn progress_column(row: &Row, idx: usize) -> rusqlite::Result<Progress> {
    let raw: f64 = row.get(idx)?;
    Ok(Progress::from_percent_lossy(raw))
}

fn map_objective_row(row: &Row) -> rusqlite::Result<Objective> {
    let status: String = row.get(4)?;
    Ok(Objective {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: ObjectiveStatus::from_str(&status),
        progress: progress_column(row, 5)?,
        start_date: date_column(row, 6)?,
        end_date: date_column(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn map_habit_row(row: &Row) -> rusqlite::Result<Habit> {
    let frequency: String = row.get(5)?;
    let status: String = row.get(8)?;
    Ok(Habit {
        id: row.get(0)?,
        owner: row.get(1)?,
        objective_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        frequency: Frequency::from_str(&frequency),
        target_per_period: row.get(6)?,
        occurrences_in_period: row.get(7)?,
        status: HabitStatus::from_str(&status),
        progress: progress_column(row, 9)?,
        period_start: date_column(row, 10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: Option<String> = row.get(5)?;
    let status: String = row.get(6)?;
    let tags: String = row.get(12)?;
    let tags: Vec<String> = serde_json::from_str(&tags)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;

    Ok(Task {
        id: row.get(0)?,
        owner: row.get(1)?,
        habit_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority: priority.as_deref().map(TaskPriority::from_str),
        status: TaskStatus::from_str(&status),
        progress: progress_column(row, 7)?,
        estimate_hours: row.get(8)?,
        hours_spent: row.get(9)?,
        due_date: date_column(row, 10)?,
        position: row.get(11)?,
        tags,
        completed_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn map_occurrence_row(row: &Row) -> rusqlite::Result<Occurrence> {
    let occurred_on = date_column(row, 3)?.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Null, "occurred_on is NULL".into())
    })?;
    Ok(Occurrence {
        id: row.get(0)?,
        habit_id: row.get(1)?,
        owner: row.get(2)?,
        occurred_on,
        quantity: row.get(4)?,
        note: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(storage: &mut SqliteStorage) -> (Objective, Habit) {
        let objective = Objective::new("ana".to_string(), "Get fit".to_string());
        storage.create_objective(&objective, "ana").unwrap();
        let habit = Habit::new(
            "ana".to_string(),
            objective.id.clone(),
            "Run".to_string(),
            Frequency::Weekly,
            4,
        );
        storage.create_habit(&habit, "ana").unwrap();
        (objective, habit)
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_objective_crud() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let objective = Objective::new("ana".to_string(), "Learn Rust".to_string())
            .with_description("Ship a CLI");
        storage.create_objective(&objective, "ana").unwrap();

        let loaded = storage.get_objective(&objective.id, "ana").unwrap().unwrap();
        assert_eq!(loaded.title, "Learn Rust");
        assert_eq!(loaded.description.as_deref(), Some("Ship a CLI"));

        // Scoped to the owner
        assert!(storage.get_objective(&objective.id, "bob").unwrap().is_none());

        let patch = ObjectivePatch {
            status: Some(ObjectiveStatus::InProgress),
            ..ObjectivePatch::default()
        };
        let updated = storage
            .update_objective(&objective.id, "ana", &patch, "ana")
            .unwrap();
        assert_eq!(updated.status, ObjectiveStatus::InProgress);

        let listed = storage
            .list_objectives(
                "ana",
                &ObjectiveFilter {
                    search: Some("rust".to_string()),
                    ..ObjectiveFilter::default()
                },
            )
            .unwrap();
        assert_eq!(listed.len(), 1);

        storage.delete_objective(&objective.id, "ana", "ana").unwrap();
        assert!(storage.get_objective(&objective.id, "ana").unwrap().is_none());
    }

    #[test]
    fn test_update_objective_wrong_owner() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (objective, _) = seed(&mut storage);

        let err = storage
            .update_objective(&objective.id, "bob", &ObjectivePatch::default(), "bob")
            .unwrap_err();
        assert!(matches!(err, Error::ObjectiveNotFound { .. }));
    }

    #[test]
    fn test_habit_requires_owned_objective() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (objective, _) = seed(&mut storage);

        let foreign = Habit::new(
            "bob".to_string(),
            objective.id,
            "Swim".to_string(),
            Frequency::Daily,
            1,
        );
        let err = storage.create_habit(&foreign, "bob").unwrap_err();
        assert!(matches!(err, Error::ObjectiveNotFound { .. }));
    }

    #[test]
    fn test_task_requires_owned_habit() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        seed(&mut storage);

        let task = Task::new("ana".to_string(), "hab_missing".to_string(), "Buy shoes".to_string());
        let err = storage.create_task(&task, "ana").unwrap_err();
        assert!(matches!(err, Error::HabitNotFound { .. }));
    }

    #[test]
    fn test_task_round_trip_keeps_tags_and_dates() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (_, habit) = seed(&mut storage);

        let mut task = Task::new("ana".to_string(), habit.id.clone(), "Buy shoes".to_string())
            .with_priority(TaskPriority::High)
            .with_tags(vec!["gear".to_string(), "shopping".to_string()]);
        task.due_date = NaiveDate::from_ymd_opt(2026, 5, 1);
        storage.create_task(&task, "ana").unwrap();

        let loaded = storage.get_task(&task.id, "ana").unwrap().unwrap();
        assert_eq!(loaded.tags, vec!["gear", "shopping"]);
        assert_eq!(loaded.priority, Some(TaskPriority::High));
        assert_eq!(loaded.due_date, task.due_date);
    }

    #[test]
    fn test_list_tasks_by_status() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (_, habit) = seed(&mut storage);

        for (title, status) in [
            ("a", TaskStatus::Todo),
            ("b", TaskStatus::Doing),
            ("c", TaskStatus::Todo),
        ] {
            let task = Task::new("ana".to_string(), habit.id.clone(), title.to_string())
                .with_status(status);
            storage.create_task(&task, "ana").unwrap();
        }

        let todo = storage
            .list_tasks(
                "ana",
                &TaskFilter {
                    statuses: vec![TaskStatus::Todo],
                    ..TaskFilter::default()
                },
            )
            .unwrap();
        assert_eq!(todo.len(), 2);
        assert!(storage.list_tasks("bob", &TaskFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_objective_cascades() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (objective, habit) = seed(&mut storage);
        let task = Task::new("ana".to_string(), habit.id.clone(), "Buy shoes".to_string());
        storage.create_task(&task, "ana").unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        storage
            .conn()
            .insert_occurrence(&Occurrence::new(habit.id.clone(), "ana".to_string(), day, 1))
            .unwrap();

        storage.delete_objective(&objective.id, "ana", "ana").unwrap();

        assert!(storage.get_habit(&habit.id, "ana").unwrap().is_none());
        assert!(storage.get_task(&task.id, "ana").unwrap().is_none());
        assert!(storage.list_occurrences(&habit.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_increment_returns_new_count() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (_, habit) = seed(&mut storage);

        assert_eq!(storage.conn().increment_habit_occurrences(&habit.id, 2).unwrap(), 2);
        assert_eq!(storage.conn().increment_habit_occurrences(&habit.id, 3).unwrap(), 5);

        let err = storage
            .conn()
            .increment_habit_occurrences("hab_missing", 1)
            .unwrap_err();
        assert!(matches!(err, Error::HabitNotFound { .. }));
    }

    #[test]
    fn test_mutation_rolls_back_on_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (_, habit) = seed(&mut storage);

        let result: Result<()> = storage.mutate("failing", "ana", |tx, _ctx| {
            tx.increment_habit_occurrences(&habit.id, 3)?;
            Err(Error::Other("boom".to_string()))
        });
        assert!(result.is_err());

        let reloaded = storage.get_habit(&habit.id, "ana").unwrap().unwrap();
        assert_eq!(reloaded.occurrences_in_period, 0);
    }

    #[test]
    fn test_objective_stats() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (objective, habit) = seed(&mut storage);
        storage
            .conn()
            .update_habit_progress(&habit.id, Progress::from_hundredths(5_000))
            .unwrap();

        let done = Task::new("ana".to_string(), habit.id.clone(), "Done one".to_string())
            .with_status(TaskStatus::Done);
        let open = Task::new("ana".to_string(), habit.id.clone(), "Open one".to_string());
        storage.create_task(&done, "ana").unwrap();
        storage.create_task(&open, "ana").unwrap();

        let stats = storage.get_objective_stats(&objective.id).unwrap();
        assert_eq!(stats.total_habits, 1);
        assert_eq!(stats.active_habits, 1);
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.done_tasks, 1);
        assert_eq!(stats.mean_habit_progress.hundredths(), 5_000);
    }

    #[test]
    fn test_history_records_events() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let (_, habit) = seed(&mut storage);

        let history = storage.get_history("habit", &habit.id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, EventType::HabitCreated);
    }
}
