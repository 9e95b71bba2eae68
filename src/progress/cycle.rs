//! Habit cycle tracker.
//!
//! A habit counts occurrences in its current cycle against
//! `target_per_period`. The counter may overshoot the target; progress
//! clamps at 100.

use crate::error::{Error, Result};
use crate::model::{Habit, Occurrence, Progress};
use crate::progress::store::ProgressStore;
use crate::storage::{EventType, MutationContext};
use chrono::NaiveDate;
use tracing::debug;

/// `min(100, occurrences / target * 100)`, or 0 when `target` is not positive.
///
/// A negative counter is treated as zero.
#[must_use]
pub fn compute_progress(target: i64, occurrences: i64) -> Progress {
    let Ok(target) = u64::try_from(target) else {
        return Progress::ZERO;
    };
    let occurrences = u64::try_from(occurrences).unwrap_or(0);
    Progress::from_ratio(occurrences, target)
}

/// Append an occurrence, bump the counter and persist the habit's progress.
///
/// All three writes go through `store`, so they commit or roll back
/// together with the caller's transaction.
pub(crate) fn record_occurrence_in<S: ProgressStore + ?Sized>(
    store: &S,
    ctx: &mut MutationContext,
    habit_id: &str,
    owner: &str,
    occurred_on: NaiveDate,
    quantity: i64,
    note: Option<&str>,
) -> Result<Habit> {
    let occurrence = Occurrence::new(habit_id.to_string(), owner.to_string(), occurred_on, quantity)
        .with_note(note);
    occurrence.validate()?;

    let mut habit = store
        .get_habit(habit_id, Some(owner))?
        .ok_or_else(|| Error::HabitNotFound {
            id: habit_id.to_string(),
        })?;
    if habit.occurrences_in_period.checked_add(quantity).is_none() {
        return Err(Error::invalid(format!(
            "habit {habit_id} cannot count {quantity} more occurrences this cycle"
        )));
    }

    store.insert_occurrence(&occurrence)?;
    let count = store.increment_habit_occurrences(habit_id, quantity)?;
    let progress = compute_progress(habit.target_per_period, count);
    store.update_habit_progress(habit_id, progress)?;

    ctx.record_change(
        "habit",
        habit_id,
        EventType::OccurrenceRecorded,
        Some(habit.occurrences_in_period.to_string()),
        Some(count.to_string()),
    );
    if progress != habit.progress {
        ctx.record_change(
            "habit",
            habit_id,
            EventType::ProgressRecomputed,
            Some(habit.progress.to_string()),
            Some(progress.to_string()),
        );
    }
    debug!(habit_id, quantity, count, %progress, "occurrence recorded");

    habit.occurrences_in_period = count;
    habit.progress = progress;
    Ok(habit)
}

/// Start a new cycle: counter and progress go to zero, `period_start` to `today`.
pub(crate) fn reset_cycle_in<S: ProgressStore + ?Sized>(
    store: &S,
    ctx: &mut MutationContext,
    habit_id: &str,
    owner: &str,
    today: NaiveDate,
) -> Result<Habit> {
    let mut habit = store
        .get_habit(habit_id, Some(owner))?
        .ok_or_else(|| Error::HabitNotFound {
            id: habit_id.to_string(),
        })?;

    store.reset_habit_cycle(habit_id, today)?;

    ctx.record_change(
        "habit",
        habit_id,
        EventType::CycleReset,
        Some(habit.occurrences_in_period.to_string()),
        Some("0".to_string()),
    );
    debug!(habit_id, previous = habit.occurrences_in_period, "cycle reset");

    habit.occurrences_in_period = 0;
    habit.progress = Progress::ZERO;
    habit.period_start = Some(today);
    Ok(habit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frequency, Objective};
    use crate::storage::SqliteStorage;

    fn setup(target: i64) -> (SqliteStorage, Habit) {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let objective = Objective::new("ana".to_string(), "Fitness".to_string());
        storage.create_objective(&objective, "ana").unwrap();
        let habit = Habit::new(
            "ana".to_string(),
            objective.id,
            "Run".to_string(),
            Frequency::Weekly,
            target,
        );
        storage.create_habit(&habit, "ana").unwrap();
        (storage, habit)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn test_compute_progress() {
        assert_eq!(compute_progress(4, 3).hundredths(), 7_500);
        assert_eq!(compute_progress(4, 5), Progress::FULL);
        assert_eq!(compute_progress(3, 1).hundredths(), 3_333);
        assert_eq!(compute_progress(3, 2).hundredths(), 6_667);
        assert_eq!(compute_progress(0, 7), Progress::ZERO);
        assert_eq!(compute_progress(-2, 7), Progress::ZERO);
        assert_eq!(compute_progress(5, -1), Progress::ZERO);
    }

    #[test]
    fn test_compute_progress_matches_formula() {
        for target in 1..=12_i64 {
            for occurrences in 0..=30_i64 {
                let expected = (occurrences as f64 / target as f64 * 100.0).min(100.0);
                let got = compute_progress(target, occurrences).as_f64();
                assert!(
                    (got - expected).abs() <= 0.005 + f64::EPSILON,
                    "target {target} occurrences {occurrences}: {got} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn test_record_occurrence_in() {
        let (storage, habit) = setup(4);
        let mut ctx = MutationContext::new("test", "ana");

        let updated =
            record_occurrence_in(storage.conn(), &mut ctx, &habit.id, "ana", day(), 3, Some("track"))
                .unwrap();

        assert_eq!(updated.occurrences_in_period, 3);
        assert_eq!(updated.progress.hundredths(), 7_500);
        assert_eq!(storage.list_occurrences(&habit.id, None).unwrap().len(), 1);
        assert_eq!(ctx.events.len(), 2);
    }

    #[test]
    fn test_record_occurrence_rejects_bad_quantity() {
        let (storage, habit) = setup(4);
        let mut ctx = MutationContext::new("test", "ana");

        let err = record_occurrence_in(storage.conn(), &mut ctx, &habit.id, "ana", day(), 0, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert!(storage.list_occurrences(&habit.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_record_occurrence_other_owner() {
        let (storage, habit) = setup(4);
        let mut ctx = MutationContext::new("test", "bob");

        let err = record_occurrence_in(storage.conn(), &mut ctx, &habit.id, "bob", day(), 1, None)
            .unwrap_err();
        assert!(matches!(err, Error::HabitNotFound { .. }));
    }

    #[test]
    fn test_reset_cycle_in() {
        let (storage, habit) = setup(5);
        storage.conn().increment_habit_occurrences(&habit.id, 10).unwrap();
        storage
            .conn()
            .update_habit_progress(&habit.id, Progress::FULL)
            .unwrap();
        let mut ctx = MutationContext::new("test", "ana");

        let reset = reset_cycle_in(storage.conn(), &mut ctx, &habit.id, "ana", day()).unwrap();
        assert_eq!(reset.occurrences_in_period, 0);
        assert_eq!(reset.progress, Progress::ZERO);

        let stored = storage.get_habit(&habit.id, "ana").unwrap().unwrap();
        assert_eq!(stored.occurrences_in_period, 0);
        assert_eq!(stored.progress, Progress::ZERO);
        assert_eq!(stored.period_start, Some(day()));
    }

    #[test]
    fn test_record_occurrence_counter_overflow() {
        let (storage, habit) = setup(4);
        storage
            .conn()
            .execute(
                "UPDATE habits SET occurrences_in_period = ?1 WHERE id = ?2",
                rusqlite::params![i64::MAX, habit.id],
            )
            .unwrap();
        let mut ctx = MutationContext::new("test", "ana");

        let err = record_occurrence_in(storage.conn(), &mut ctx, &habit.id, "ana", day(), 1, None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let stored = storage.get_habit(&habit.id, "ana").unwrap().unwrap();
        assert_eq!(stored.occurrences_in_period, i64::MAX);
        assert!(storage.list_occurrences(&habit.id, None).unwrap().is_empty());
    }
}
