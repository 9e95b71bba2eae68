//! Habit and occurrence models for habitrack.
//!
//! A habit belongs to one objective and counts how many times it was
//! performed in the current cycle against `target_per_period`. Each time
//! it is performed an [`Occurrence`] is appended to its log.

use crate::error::{Error, Result};
use crate::model::Progress;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Length of a habit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            _ => Self::Daily,
        }
    }
}

/// Habit status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HabitStatus {
    Active,
    Paused,
    Done,
}

impl HabitStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Done => "done",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "paused" => Self::Paused,
            "done" => Self::Done,
            _ => Self::Active,
        }
    }
}

impl Default for HabitStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// A habit in habitrack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    /// Unique identifier (`hab_` prefix)
    pub id: String,

    pub owner: String,

    /// Parent objective
    pub objective_id: String,

    pub title: String,

    pub description: Option<String>,

    pub frequency: Frequency,

    /// Occurrences expected per cycle (>= 1)
    pub target_per_period: i64,

    /// Occurrences logged in the current cycle. Not clamped to the target.
    pub occurrences_in_period: i64,

    pub status: HabitStatus,

    /// Occurrence ratio of the current cycle
    pub progress: Progress,

    /// Day the current cycle started, set by a cycle reset
    pub period_start: Option<NaiveDate>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Habit {
    /// Create a new habit with an empty cycle.
    pub fn new(
        owner: String,
        objective_id: String,
        title: String,
        frequency: Frequency,
        target_per_period: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let id = format!("hab_{}", &uuid::Uuid::new_v4().to_string()[..12]);

        Self {
            id,
            owner,
            objective_id,
            title,
            description: None,
            frequency,
            target_per_period,
            occurrences_in_period: 0,
            status: HabitStatus::Active,
            progress: Progress::ZERO,
            period_start: None,
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
    pub fn with_status(mut self, status: HabitStatus) -> Self {
        self.status = status;
        self
    }

    /// Check write-path invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad title, a target below 1 or a
    /// negative occurrence counter.
    pub fn validate(&self) -> Result<()> {
        super::validate_title(&self.title)?;
        ensure_target(self.target_per_period)?;
        if self.occurrences_in_period < 0 {
            return Err(Error::invalid("occurrences in period cannot be negative"));
        }
        Ok(())
    }
}

/// Caller-editable habit fields. `None` leaves a field unchanged.
///
/// `occurrences_in_period` allows a manual correction of the counter; the
/// engine recomputes progress after any habit update.
#[derive(Debug, Clone, Default)]
pub struct HabitPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub target_per_period: Option<i64>,
    pub occurrences_in_period: Option<i64>,
    pub status: Option<HabitStatus>,
}

impl HabitPatch {
    pub fn apply(&self, habit: &mut Habit) {
        if let Some(ref title) = self.title {
            habit.title.clone_from(title);
        }
        if let Some(ref description) = self.description {
            habit.description = Some(description.clone());
        }
        if let Some(frequency) = self.frequency {
            habit.frequency = frequency;
        }
        if let Some(target) = self.target_per_period {
            habit.target_per_period = target;
        }
        if let Some(occurrences) = self.occurrences_in_period {
            habit.occurrences_in_period = occurrences;
        }
        if let Some(status) = self.status {
            habit.status = status;
        }
    }
}

fn ensure_target(target: i64) -> Result<()> {
    if target < 1 {
        return Err(Error::invalid(format!(
            "target per period must be at least 1, got {target}"
        )));
    }
    Ok(())
}

/// One logged performance of a habit. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    /// Unique identifier (`occ_` prefix)
    pub id: String,

    pub habit_id: String,

    pub owner: String,

    pub occurred_on: NaiveDate,

    /// How many times the habit was performed (>= 1)
    pub quantity: i64,

    pub note: Option<String>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Occurrence {
    pub fn new(habit_id: String, owner: String, occurred_on: NaiveDate, quantity: i64) -> Self {
        Self {
            id: format!("occ_{}", &uuid::Uuid::new_v4().to_string()[..12]),
            habit_id,
            owner,
            occurred_on,
            quantity,
            note: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: Option<&str>) -> Self {
        self.note = note.map(ToString::to_string);
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidInput` when the quantity is below 1.
    pub fn validate(&self) -> Result<()> {
        if self.quantity < 1 {
            return Err(Error::invalid(format!(
                "quantity must be at least 1, got {}",
                self.quantity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn habit(target: i64) -> Habit {
        Habit::new(
            "ana".to_string(),
            "obj_1".to_string(),
            "Stretch".to_string(),
            Frequency::Daily,
            target,
        )
    }

    #[test]
    fn test_new_habit_starts_empty() {
        let h = habit(4);
        assert!(h.id.starts_with("hab_"));
        assert_eq!(h.occurrences_in_period, 0);
        assert_eq!(h.progress, Progress::ZERO);
        assert_eq!(h.status, HabitStatus::Active);
        assert!(h.validate().is_ok());
    }

    #[test]
    fn test_zero_target_rejected() {
        assert!(habit(0).validate().is_err());
        assert!(habit(-3).validate().is_err());
    }

    #[test]
    fn test_occurrence_quantity() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let ok = Occurrence::new("hab_1".to_string(), "ana".to_string(), day, 1);
        let bad = Occurrence::new("hab_1".to_string(), "ana".to_string(), day, 0);
        assert!(ok.validate().is_ok());
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_frequency_parsing() {
        assert_eq!(Frequency::from_str("weekly"), Frequency::Weekly);
        assert_eq!(Frequency::from_str("MONTHLY"), Frequency::Monthly);
        assert_eq!(Frequency::from_str("whatever"), Frequency::Daily);
    }
}
