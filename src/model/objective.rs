//! Objective model for habitrack.
//!
//! Objectives are the top-level goals. They own habits, and their progress
//! is always the mean of their habits' progress.

use crate::error::{Error, Result};
use crate::model::Progress;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Objective status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveStatus {
    Planned,
    InProgress,
    Done,
    Archived,
}

impl ObjectiveStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "in_progress" => Self::InProgress,
            "done" => Self::Done,
            "archived" => Self::Archived,
            _ => Self::Planned,
        }
    }
}

impl Default for ObjectiveStatus {
    fn default() -> Self {
        Self::Planned
    }
}

/// An objective in habitrack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    /// Unique identifier (`obj_` prefix)
    pub id: String,

    /// Owning user
    pub owner: String,

    pub title: String,

    pub description: Option<String>,

    pub status: ObjectiveStatus,

    /// Derived from habits, never set by a user action
    pub progress: Progress,

    pub start_date: Option<NaiveDate>,

    pub end_date: Option<NaiveDate>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Objective {
    /// Create a new objective with default values.
    pub fn new(owner: String, title: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("obj_{}", &uuid::Uuid::new_v4().to_string()[..12]);

        Self {
            id,
            owner,
            title,
            description: None,
            status: ObjectiveStatus::Planned,
            progress: Progress::ZERO,
            start_date: None,
            end_date: None,
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
    pub fn with_status(mut self, status: ObjectiveStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Check write-path invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or oversized title, or an end
    /// date before the start date.
    pub fn validate(&self) -> Result<()> {
        super::validate_title(&self.title)?;
        ensure_date_order(self.start_date, self.end_date)
    }
}

/// Caller-editable objective fields. `None` leaves a field unchanged.
///
/// Progress is deliberately absent: only the aggregator writes it.
#[derive(Debug, Clone, Default)]
pub struct ObjectivePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ObjectiveStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ObjectivePatch {
    pub fn apply(&self, objective: &mut Objective) {
        if let Some(ref title) = self.title {
            objective.title.clone_from(title);
        }
        if let Some(ref description) = self.description {
            objective.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            objective.status = status;
        }
        if self.start_date.is_some() {
            objective.start_date = self.start_date;
        }
        if self.end_date.is_some() {
            objective.end_date = self.end_date;
        }
    }
}

/// Aggregate counts shown alongside an objective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectiveStats {
    pub total_habits: usize,
    pub active_habits: usize,
    pub total_tasks: usize,
    pub done_tasks: usize,
    pub mean_habit_progress: Progress,
    pub mean_task_progress: Progress,
}

fn ensure_date_order(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match (start, end) {
        (Some(s), Some(e)) if e < s => Err(Error::invalid(format!(
            "end date {e} is before start date {s}"
        ))),
        _ => Ok(()),
    }
}
