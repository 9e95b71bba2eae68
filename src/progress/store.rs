//! Persistence operations the progress engine consumes.
//!
//! # Responsibility
//! - Name the reads and writes the cycle tracker and aggregator need.
//! - Keep SQL out of the engine.
//!
//! # Invariants
//! - Every read returns current persisted state; nothing is cached.
//! - Implementations run inside the caller's unit of work. A
//!   `rusqlite::Transaction` derefs to the `Connection` implementation, so
//!   the same code runs transactionally.
//! - `owner = None` is an internal, unscoped lookup. Caller-facing
//!   operations always pass `Some(owner)`.

use crate::error::Result;
use crate::model::{Habit, Objective, Occurrence, Progress, Task};
use chrono::NaiveDate;

pub trait ProgressStore {
    fn get_habit(&self, id: &str, owner: Option<&str>) -> Result<Option<Habit>>;

    fn update_habit_progress(&self, id: &str, progress: Progress) -> Result<()>;

    /// Atomically add `quantity` to the cycle counter and return the new count.
    fn increment_habit_occurrences(&self, id: &str, quantity: i64) -> Result<i64>;

    /// Zero the counter and progress and start a new cycle on `period_start`.
    fn reset_habit_cycle(&self, id: &str, period_start: NaiveDate) -> Result<()>;

    fn list_habits_by_objective(&self, objective_id: &str) -> Result<Vec<Habit>>;

    fn get_objective(&self, id: &str, owner: Option<&str>) -> Result<Option<Objective>>;

    fn update_objective_progress(&self, id: &str, progress: Progress) -> Result<()>;

    fn insert_occurrence(&self, occurrence: &Occurrence) -> Result<()>;

    fn get_task(&self, id: &str, owner: Option<&str>) -> Result<Option<Task>>;

    /// Persist every mutable field of `task`, including progress and
    /// completion time.
    fn update_task(&self, task: &Task) -> Result<()>;
}
