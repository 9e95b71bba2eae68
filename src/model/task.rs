//! Task model for habitrack.
//!
//! Tasks are discrete pieces of work under exactly one habit, tracked on a
//! kanban board. Their progress is persisted and reported but does not feed
//! the habit's own progress.

use crate::error::{Error, Result};
use crate::model::Progress;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kanban status values.
///
/// Any status may move to any other. Only entering or leaving `Done` has
/// side effects (see `progress::aggregate::apply_status_transition`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    Doing,
    Blocked,
    Done,
}

impl TaskStatus {
    /// Board column order.
    pub const ALL: [Self; 5] = [
        Self::Backlog,
        Self::Todo,
        Self::Doing,
        Self::Blocked,
        Self::Done,
    ];

    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "todo" => Self::Todo,
            "doing" => Self::Doing,
            "blocked" => Self::Blocked,
            "done" => Self::Done,
            _ => Self::Backlog,
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Task priority values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }
}

/// A task in habitrack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (`task_` prefix)
    pub id: String,

    pub owner: String,

    /// Parent habit. Always set: tasks never attach to an objective directly.
    pub habit_id: String,

    pub title: String,

    pub description: Option<String>,

    pub priority: Option<TaskPriority>,

    pub status: TaskStatus,

    pub progress: Progress,

    pub estimate_hours: Option<f64>,

    pub hours_spent: f64,

    pub due_date: Option<NaiveDate>,

    /// Manual ordering within a board column
    pub position: Option<i64>,

    pub tags: Vec<String>,

    /// Set when the status enters `done`, cleared when it leaves
    pub completed_at: Option<i64>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    /// Create a new backlog task.
    pub fn new(owner: String, habit_id: String, title: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("task_{}", &uuid::Uuid::new_v4().to_string()[..12]);

        Self {
            id,
            owner,
            habit_id,
            title,
            description: None,
            priority: None,
            status: TaskStatus::Backlog,
            progress: Progress::ZERO,
            estimate_hours: None,
            hours_spent: 0.0,
            due_date: None,
            position: None,
            tags: Vec::new(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Check write-path invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad title, a missing habit or negative
    /// hour figures.
    pub fn validate(&self) -> Result<()> {
        super::validate_title(&self.title)?;
        if self.habit_id.trim().is_empty() {
            return Err(Error::invalid("a task must belong to a habit"));
        }
        if self.estimate_hours.is_some_and(|h| !h.is_finite() || h < 0.0) {
            return Err(Error::invalid("estimate hours cannot be negative"));
        }
        if !self.hours_spent.is_finite() || self.hours_spent < 0.0 {
            return Err(Error::invalid("hours spent cannot be negative"));
        }
        Ok(())
    }
}

/// Caller-editable task fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// Move the task under another habit
    pub habit_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub progress: Option<Progress>,
    pub estimate_hours: Option<f64>,
    pub hours_spent: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub position: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    /// Copy the set fields onto `task`.
    ///
    /// Status side effects (completion stamp, forced progress) are applied
    /// afterwards by the aggregator, not here.
    pub fn apply(&self, task: &mut Task) {
        if let Some(ref habit_id) = self.habit_id {
            task.habit_id.clone_from(habit_id);
        }
        if let Some(ref title) = self.title {
            task.title.clone_from(title);
        }
        if let Some(ref description) = self.description {
            task.description = Some(description.clone());
        }
        if self.priority.is_some() {
            task.priority = self.priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(progress) = self.progress {
            task.progress = progress;
        }
        if self.estimate_hours.is_some() {
            task.estimate_hours = self.estimate_hours;
        }
        if let Some(hours) = self.hours_spent {
            task.hours_spent = hours;
        }
        if self.due_date.is_some() {
            task.due_date = self.due_date;
        }
        if self.position.is_some() {
            task.position = self.position;
        }
        if let Some(ref tags) = self.tags {
            task.tags.clone_from(tags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task() {
        let task = Task::new("ana".to_string(), "hab_1".to_string(), "Buy shoes".to_string());

        assert!(task.id.starts_with("task_"));
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(task.completed_at.is_none());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_task_requires_habit() {
        let task = Task::new("ana".to_string(), "  ".to_string(), "Orphan".to_string());
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_negative_hours_rejected() {
        let mut task = Task::new("ana".to_string(), "hab_1".to_string(), "Plan".to_string());
        task.hours_spent = -1.0;
        assert!(task.validate().is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(TaskStatus::from_str("doing"), TaskStatus::Doing);
        assert_eq!(TaskStatus::from_str("DONE"), TaskStatus::Done);
        assert_eq!(TaskStatus::from_str("???"), TaskStatus::Backlog);
        assert_eq!(TaskPriority::from_str("high"), TaskPriority::High);
    }

    #[test]
    fn test_default_status_is_backlog() {
        assert_eq!(TaskStatus::default(), TaskStatus::Backlog);
        assert_eq!(TaskPatch::default().status, None);
    }
}
