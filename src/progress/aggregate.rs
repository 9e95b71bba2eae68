//! Progress aggregator.
//!
//! Every recompute is a full recompute from persisted state. Nothing here
//! is incremental, so running any of these twice changes nothing.

use crate::error::Result;
use crate::model::{Habit, Objective, Progress, Task, TaskStatus};
use crate::progress::cycle::compute_progress;
use crate::progress::store::ProgressStore;
use crate::storage::{EventType, MutationContext};
use tracing::debug;

/// Apply the side effects of a task status change.
///
/// Entering `done` stamps `completed_at` and forces progress to 100.
/// Leaving `done` clears `completed_at` and leaves progress alone.
/// `previous = None` means the task is new. Returns the event to record,
/// if the change crossed the `done` boundary.
pub fn apply_status_transition(
    task: &mut Task,
    previous: Option<TaskStatus>,
    now: i64,
) -> Option<EventType> {
    let was_done = previous.is_some_and(|s| s.is_done());
    match (was_done, task.status.is_done()) {
        (false, true) => {
            task.completed_at = Some(now);
            task.progress = Progress::FULL;
            Some(EventType::TaskCompleted)
        }
        (true, false) => {
            task.completed_at = None;
            Some(EventType::TaskReopened)
        }
        _ => None,
    }
}

/// Apply the status rule to an edited task and persist it.
pub(crate) fn settle_task_in<S: ProgressStore + ?Sized>(
    store: &S,
    ctx: &mut MutationContext,
    task: &mut Task,
    previous: Option<TaskStatus>,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let transition = apply_status_transition(task, previous, now);
    task.updated_at = now;
    store.update_task(task)?;

    match transition {
        Some(event_type) => ctx.record_change(
            "task",
            &task.id,
            event_type,
            previous.map(|s| s.as_str().to_string()),
            Some(task.status.as_str().to_string()),
        ),
        None => ctx.record_event("task", &task.id, EventType::TaskUpdated),
    }
    Ok(())
}

/// Recompute and persist one habit's progress from its cycle counter.
///
/// Task progress does not contribute. Returns `None` when the habit does
/// not exist (or is not visible to `owner`).
pub(crate) fn recompute_habit_in<S: ProgressStore + ?Sized>(
    store: &S,
    ctx: &mut MutationContext,
    habit_id: &str,
    owner: Option<&str>,
) -> Result<Option<Habit>> {
    let Some(mut habit) = store.get_habit(habit_id, owner)? else {
        return Ok(None);
    };

    let progress = compute_progress(habit.target_per_period, habit.occurrences_in_period);
    store.update_habit_progress(habit_id, progress)?;

    if progress != habit.progress {
        ctx.record_change(
            "habit",
            habit_id,
            EventType::ProgressRecomputed,
            Some(habit.progress.to_string()),
            Some(progress.to_string()),
        );
    }
    debug!(habit_id, %progress, "habit progress recomputed");

    habit.progress = progress;
    Ok(Some(habit))
}

/// Recompute and persist an objective's progress as the mean of its habits.
///
/// An objective without habits gets 0. Returns `None` when the objective
/// does not exist (or is not visible to `owner`).
pub(crate) fn recompute_objective_in<S: ProgressStore + ?Sized>(
    store: &S,
    ctx: &mut MutationContext,
    objective_id: &str,
    owner: Option<&str>,
) -> Result<Option<Objective>> {
    let Some(mut objective) = store.get_objective(objective_id, owner)? else {
        return Ok(None);
    };

    let habits = store.list_habits_by_objective(objective_id)?;
    let progress = Progress::mean(habits.iter().map(|h| h.progress));
    store.update_objective_progress(objective_id, progress)?;

    if progress != objective.progress {
        ctx.record_change(
            "objective",
            objective_id,
            EventType::ProgressRecomputed,
            Some(objective.progress.to_string()),
            Some(progress.to_string()),
        );
    }
    debug!(objective_id, habits = habits.len(), %progress, "objective progress recomputed");

    objective.progress = progress;
    Ok(Some(objective))
}
