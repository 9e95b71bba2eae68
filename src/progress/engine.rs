//! Public progress operations.
//!
//! Each operation runs level by level: the entity that changed (task,
//! occurrence, habit counter) is written in one transaction, then the
//! parent habit and objective are recomputed in transactions of their own.
//! A failure while recomputing the objective is returned to the caller,
//! but the lower level stays committed.

use crate::error::{Error, Result};
use crate::model::{
    Habit, HabitPatch, Objective, ObjectivePatch, Progress, Task, TaskPatch, TaskStatus,
};
use crate::progress::aggregate::{
    apply_status_transition, recompute_habit_in, recompute_objective_in, settle_task_in,
};
use crate::progress::cycle::{record_occurrence_in, reset_cycle_in};
use crate::progress::store::ProgressStore;
use crate::storage::SqliteStorage;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

/// Counts from a [`ProgressEngine::recompute_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub habits: usize,
    pub objectives: usize,
}

/// Drives the habit cycle tracker and the aggregator against storage.
///
/// `owner` on every operation is both the ownership scope and the actor
/// recorded in the audit trail.
pub struct ProgressEngine<'a> {
    storage: &'a mut SqliteStorage,
}

impl<'a> ProgressEngine<'a> {
    pub fn new(storage: &'a mut SqliteStorage) -> Self {
        Self { storage }
    }

    // ===========
    // Habit cycle
    // ===========

    /// Log `quantity` performances of a habit on `occurred_on`.
    ///
    /// The occurrence row, the counter bump and the habit's progress commit
    /// together; the objective is recomputed afterwards.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `quantity < 1`, `HabitNotFound` if the habit is
    /// missing or not owned, `Database` if a write fails.
    pub fn record_occurrence(
        &mut self,
        habit_id: &str,
        owner: &str,
        occurred_on: NaiveDate,
        quantity: i64,
        note: Option<&str>,
    ) -> Result<Habit> {
        let habit = self.storage.mutate("record_occurrence", owner, |tx, ctx| {
            let conn: &Connection = tx;
            record_occurrence_in(conn, ctx, habit_id, owner, occurred_on, quantity, note)
        })?;
        info!(
            habit_id,
            quantity,
            occurrences = habit.occurrences_in_period,
            progress = %habit.progress,
            "occurrence recorded"
        );

        self.cascade_objective(&habit.objective_id, owner)?;
        Ok(habit)
    }

    /// Start a new cycle for a habit today.
    ///
    /// # Errors
    ///
    /// `HabitNotFound` if the habit is missing or not owned.
    pub fn reset_cycle(&mut self, habit_id: &str, owner: &str) -> Result<Habit> {
        let today = chrono::Local::now().date_naive();
        let habit = self.storage.mutate("reset_cycle", owner, |tx, ctx| {
            let conn: &Connection = tx;
            reset_cycle_in(conn, ctx, habit_id, owner, today)
        })?;
        info!(habit_id, %today, "habit cycle reset");

        self.cascade_objective(&habit.objective_id, owner)?;
        Ok(habit)
    }

    // ==========
    // Aggregator
    // ==========

    /// Recompute a habit's progress, then its objective's.
    ///
    /// # Errors
    ///
    /// `HabitNotFound` if the habit is missing or not owned.
    pub fn recompute_habit_progress(&mut self, habit_id: &str, owner: &str) -> Result<Progress> {
        let habit = self
            .storage
            .mutate("recompute_habit_progress", owner, |tx, ctx| {
                let conn: &Connection = tx;
                recompute_habit_in(conn, ctx, habit_id, Some(owner))?.ok_or_else(|| {
                    Error::HabitNotFound {
                        id: habit_id.to_string(),
                    }
                })
            })?;

        self.cascade_objective(&habit.objective_id, owner)?;
        Ok(habit.progress)
    }

    /// Recompute an objective's progress as the mean of its habits.
    ///
    /// # Errors
    ///
    /// `ObjectiveNotFound` if the objective is missing or not owned.
    pub fn recompute_objective_progress(
        &mut self,
        objective_id: &str,
        owner: &str,
    ) -> Result<Progress> {
        let objective =
            self.storage
                .mutate("recompute_objective_progress", owner, |tx, ctx| {
                    let conn: &Connection = tx;
                    recompute_objective_in(conn, ctx, objective_id, Some(owner))?.ok_or_else(
                        || Error::ObjectiveNotFound {
                            id: objective_id.to_string(),
                        },
                    )
                })?;
        Ok(objective.progress)
    }

    /// Settle a task whose status was changed from `previous_status`, then
    /// recompute its habit and objective.
    ///
    /// A missing parent habit skips the recompute instead of failing.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` if the task is missing or not owned.
    pub fn on_task_mutated(
        &mut self,
        task_id: &str,
        owner: &str,
        previous_status: Option<TaskStatus>,
    ) -> Result<Task> {
        let task = self.storage.mutate("on_task_mutated", owner, |tx, ctx| {
            let conn: &Connection = tx;
            let mut task = conn
                .get_task(task_id, Some(owner))?
                .ok_or_else(|| Error::TaskNotFound {
                    id: task_id.to_string(),
                })?;
            settle_task_in(conn, ctx, &mut task, previous_status)?;
            Ok(task)
        })?;

        self.cascade_habit(&task.habit_id, owner)?;
        Ok(task)
    }

    /// Recompute every habit, then every objective, of one owner.
    ///
    /// Each entity is its own unit of work.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure; earlier recomputes stay committed.
    pub fn recompute_all(&mut self, owner: &str) -> Result<RecomputeSummary> {
        let mut summary = RecomputeSummary::default();

        for habit_id in self.storage.list_habit_ids(owner)? {
            let recomputed = self.storage.mutate("recompute_all", owner, |tx, ctx| {
                let conn: &Connection = tx;
                recompute_habit_in(conn, ctx, &habit_id, Some(owner))
            })?;
            if recomputed.is_some() {
                summary.habits += 1;
            }
        }

        for objective_id in self.storage.list_objective_ids(owner)? {
            let recomputed = self.storage.mutate("recompute_all", owner, |tx, ctx| {
                let conn: &Connection = tx;
                recompute_objective_in(conn, ctx, &objective_id, Some(owner))
            })?;
            if recomputed.is_some() {
                summary.objectives += 1;
            }
        }

        info!(owner, habits = summary.habits, objectives = summary.objectives, "recomputed all progress");
        Ok(summary)
    }

    // ===========================
    // Mutations that cascade up
    // ===========================

    /// Insert a task and recompute its habit.
    ///
    /// # Errors
    ///
    /// `HabitNotFound` if the parent habit is missing or not owned,
    /// `InvalidInput` if validation fails.
    pub fn create_task(&mut self, mut task: Task) -> Result<Task> {
        let created_at = task.created_at;
        apply_status_transition(&mut task, None, created_at);
        let owner = task.owner.clone();
        self.storage.create_task(&task, &owner)?;

        self.cascade_habit(&task.habit_id, &owner)?;
        Ok(task)
    }

    /// Edit a task in one unit of work and cascade.
    ///
    /// When the patch moves the task to another habit, both the old and the
    /// new habit are recomputed.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` if the task is missing or not owned, `HabitNotFound`
    /// if the target habit is, `InvalidInput` if validation fails.
    pub fn update_task(&mut self, task_id: &str, owner: &str, patch: &TaskPatch) -> Result<Task> {
        let (task, old_habit_id) = self.storage.mutate("update_task", owner, |tx, ctx| {
            let conn: &Connection = tx;
            let mut task = conn
                .get_task(task_id, Some(owner))?
                .ok_or_else(|| Error::TaskNotFound {
                    id: task_id.to_string(),
                })?;
            let previous = task.status;
            let old_habit_id = task.habit_id.clone();

            patch.apply(&mut task);
            if task.habit_id != old_habit_id && conn.get_habit(&task.habit_id, Some(owner))?.is_none()
            {
                return Err(Error::HabitNotFound {
                    id: task.habit_id.clone(),
                });
            }
            task.validate()?;

            settle_task_in(conn, ctx, &mut task, Some(previous))?;
            Ok((task, old_habit_id))
        })?;
        info!(task_id, status = task.status.as_str(), "task updated");

        self.cascade_habit(&task.habit_id, owner)?;
        if old_habit_id != task.habit_id {
            self.cascade_habit(&old_habit_id, owner)?;
        }
        Ok(task)
    }

    /// Move a task to another board column.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_task`].
    pub fn move_task(&mut self, task_id: &str, owner: &str, status: TaskStatus) -> Result<Task> {
        let patch = TaskPatch {
            status: Some(status),
            ..TaskPatch::default()
        };
        self.update_task(task_id, owner, &patch)
    }

    /// Delete a task and recompute the habit it belonged to.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` if the task is missing or not owned.
    pub fn delete_task(&mut self, task_id: &str, owner: &str) -> Result<Task> {
        let task = self.storage.delete_task(task_id, owner, owner)?;
        self.cascade_habit(&task.habit_id, owner)?;
        Ok(task)
    }

    /// Insert a habit and recompute its objective.
    ///
    /// # Errors
    ///
    /// `ObjectiveNotFound` if the parent is missing or not owned,
    /// `InvalidInput` if validation fails.
    pub fn create_habit(&mut self, habit: Habit) -> Result<Habit> {
        let owner = habit.owner.clone();
        self.storage.create_habit(&habit, &owner)?;
        self.cascade_objective(&habit.objective_id, &owner)?;
        Ok(habit)
    }

    /// Edit a habit, then recompute it and its objective.
    ///
    /// # Errors
    ///
    /// `HabitNotFound` if the habit is missing or not owned,
    /// `InvalidInput` if validation fails.
    pub fn update_habit(&mut self, habit_id: &str, owner: &str, patch: &HabitPatch) -> Result<Habit> {
        let mut habit = self.storage.update_habit(habit_id, owner, patch, owner)?;
        habit.progress = self.recompute_habit_progress(habit_id, owner)?;
        info!(habit_id, progress = %habit.progress, "habit updated");
        Ok(habit)
    }

    /// Delete a habit (with its tasks and occurrences) and recompute its objective.
    ///
    /// # Errors
    ///
    /// `HabitNotFound` if the habit is missing or not owned.
    pub fn delete_habit(&mut self, habit_id: &str, owner: &str) -> Result<Habit> {
        let habit = self.storage.delete_habit(habit_id, owner, owner)?;
        self.cascade_objective(&habit.objective_id, owner)?;
        Ok(habit)
    }

    /// Edit an objective, then recompute its progress.
    ///
    /// # Errors
    ///
    /// `ObjectiveNotFound` if the objective is missing or not owned,
    /// `InvalidInput` if validation fails.
    pub fn update_objective(
        &mut self,
        objective_id: &str,
        owner: &str,
        patch: &ObjectivePatch,
    ) -> Result<Objective> {
        let mut objective = self
            .storage
            .update_objective(objective_id, owner, patch, owner)?;
        objective.progress = self.recompute_objective_progress(objective_id, owner)?;
        info!(objective_id, progress = %objective.progress, "objective updated");
        Ok(objective)
    }

    // =======
    // Cascade
    // =======

    /// Recompute a habit and its objective after a task change.
    fn cascade_habit(&mut self, habit_id: &str, actor: &str) -> Result<()> {
        let habit = self.storage.mutate("cascade_habit", actor, |tx, ctx| {
            let conn: &Connection = tx;
            recompute_habit_in(conn, ctx, habit_id, None)
        })?;

        let Some(habit) = habit else {
            warn!(habit_id, "parent habit not found, skipping recompute");
            return Ok(());
        };
        self.cascade_objective(&habit.objective_id, actor)
    }

    fn cascade_objective(&mut self, objective_id: &str, actor: &str) -> Result<()> {
        let objective = self.storage.mutate("cascade_objective", actor, |tx, ctx| {
            let conn: &Connection = tx;
            recompute_objective_in(conn, ctx, objective_id, None)
        })?;

        if objective.is_none() {
            warn!(objective_id, "parent objective not found, skipping recompute");
        }
        Ok(())
    }
}
