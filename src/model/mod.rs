//! Data models for habitrack.
//!
//! This module contains all domain models:
//! - Objective
//! - Habit / Occurrence
//! - Task
//! - Progress (fixed-point percentage)

pub mod habit;
pub mod objective;
pub mod progress;
pub mod task;

pub use habit::{Frequency, Habit, HabitPatch, HabitStatus, Occurrence};
pub use objective::{Objective, ObjectivePatch, ObjectiveStats, ObjectiveStatus};
pub use progress::Progress;
pub use task::{Task, TaskPatch, TaskPriority, TaskStatus};

use crate::error::{Error, Result};

/// Longest accepted title, in characters.
pub const MAX_TITLE_LEN: usize = 255;

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::invalid("title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::invalid(format!(
            "title is longer than {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}
