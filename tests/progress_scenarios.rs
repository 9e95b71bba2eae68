//! End-to-end progress behavior against a real SQLite database.

use chrono::NaiveDate;
use habitrack::error::Error;
use habitrack::model::{Frequency, Habit, Objective, Progress, Task, TaskStatus};
use habitrack::progress::{ProgressEngine, compute_progress};
use habitrack::storage::SqliteStorage;

const OWNER: &str = "ana";

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
}

fn setup() -> (tempfile::TempDir, SqliteStorage) {
    let dir = tempfile::TempDir::new().unwrap();
    let storage = SqliteStorage::open(&dir.path().join("ht.db")).unwrap();
    (dir, storage)
}

fn objective(storage: &mut SqliteStorage) -> Objective {
    let objective = Objective::new(OWNER.to_string(), "Get fit".to_string());
    storage.create_objective(&objective, OWNER).unwrap();
    objective
}

fn habit(storage: &mut SqliteStorage, objective_id: &str, target: i64) -> Habit {
    let habit = Habit::new(
        OWNER.to_string(),
        objective_id.to_string(),
        format!("Run {target}x"),
        Frequency::Weekly,
        target,
    );
    ProgressEngine::new(storage).create_habit(habit).unwrap()
}

fn record(storage: &mut SqliteStorage, habit_id: &str, quantity: i64) -> Habit {
    ProgressEngine::new(storage)
        .record_occurrence(habit_id, OWNER, day(), quantity, None)
        .unwrap()
}

fn objective_progress(storage: &SqliteStorage, id: &str) -> String {
    storage
        .get_objective(id, OWNER)
        .unwrap()
        .unwrap()
        .progress
        .to_string()
}

#[test]
fn three_single_occurrences_reach_three_quarters() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 4);

    for _ in 0..3 {
        record(&mut storage, &h.id, 1);
    }

    let stored = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.occurrences_in_period, 3);
    assert_eq!(stored.progress.to_string(), "75.00");
    assert_eq!(objective_progress(&storage, &o.id), "75.00");
    assert_eq!(storage.list_occurrences(&h.id, None).unwrap().len(), 3);
}

#[test]
fn overshooting_the_target_caps_at_full() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 4);

    record(&mut storage, &h.id, 3);
    let after = record(&mut storage, &h.id, 2);

    assert_eq!(after.occurrences_in_period, 5);
    assert_eq!(after.progress, Progress::FULL);
    assert_eq!(objective_progress(&storage, &o.id), "100.00");
}

#[test]
fn objective_is_mean_of_its_habits() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let full = habit(&mut storage, &o.id, 2);
    let half = habit(&mut storage, &o.id, 2);
    let _empty = habit(&mut storage, &o.id, 2);

    record(&mut storage, &full.id, 2);
    record(&mut storage, &half.id, 1);

    assert_eq!(objective_progress(&storage, &o.id), "50.00");

    let mut engine = ProgressEngine::new(&mut storage);
    let first = engine.recompute_objective_progress(&o.id, OWNER).unwrap();
    let second = engine.recompute_objective_progress(&o.id, OWNER).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), "50.00");
}

#[test]
fn objective_without_habits_is_zero() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);

    let progress = ProgressEngine::new(&mut storage)
        .recompute_objective_progress(&o.id, OWNER)
        .unwrap();
    assert_eq!(progress, Progress::ZERO);
}

#[test]
fn completing_and_reopening_a_task() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 4);
    let task = Task::new(OWNER.to_string(), h.id.clone(), "Buy shoes".to_string());

    let mut engine = ProgressEngine::new(&mut storage);
    let task = engine.create_task(task).unwrap();
    assert_eq!(task.status, TaskStatus::Backlog);

    let done = engine.move_task(&task.id, OWNER, TaskStatus::Done).unwrap();
    assert_eq!(done.progress, Progress::FULL);
    assert!(done.completed_at.is_some());

    let reopened = engine.move_task(&task.id, OWNER, TaskStatus::Doing).unwrap();
    assert_eq!(reopened.completed_at, None);
    assert_eq!(reopened.progress, Progress::FULL);

    let stored = storage.get_task(&task.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Doing);
    assert_eq!(stored.completed_at, None);
    assert_eq!(stored.progress, Progress::FULL);

    // Task progress never moves the habit.
    let stored_habit = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored_habit.progress, Progress::ZERO);
}

#[test]
fn reset_cycle_zeroes_habit_and_updates_objective() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 5);

    record(&mut storage, &h.id, 10);
    assert_eq!(objective_progress(&storage, &o.id), "100.00");

    let reset = ProgressEngine::new(&mut storage)
        .reset_cycle(&h.id, OWNER)
        .unwrap();
    assert_eq!(reset.occurrences_in_period, 0);
    assert_eq!(reset.progress, Progress::ZERO);
    assert!(reset.period_start.is_some());
    assert_eq!(objective_progress(&storage, &o.id), "0.00");

    // The occurrence log is kept across cycles.
    assert_eq!(storage.list_occurrences(&h.id, None).unwrap().len(), 1);
}

#[test]
fn recording_adds_exactly_the_quantity() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 7);

    let mut expected = 0;
    for quantity in [1, 3, 2, 5] {
        let before = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
        let after = record(&mut storage, &h.id, quantity);
        expected += quantity;
        assert_eq!(after.occurrences_in_period, before.occurrences_in_period + quantity);
        assert_eq!(after.occurrences_in_period, expected);
        assert_eq!(after.progress, compute_progress(7, expected));
    }
}

#[test]
fn invalid_quantity_changes_nothing() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 3);

    let result = ProgressEngine::new(&mut storage).record_occurrence(&h.id, OWNER, day(), 0, None);
    assert!(matches!(result, Err(Error::InvalidInput { .. })));

    let stored = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.occurrences_in_period, 0);
    assert!(storage.list_occurrences(&h.id, None).unwrap().is_empty());
}

#[test]
fn failed_habit_progress_write_rolls_back_the_occurrence() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 4);

    storage
        .conn()
        .execute_batch(
            "CREATE TRIGGER fail_habit_progress BEFORE UPDATE OF progress ON habits
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();

    let result = ProgressEngine::new(&mut storage).record_occurrence(&h.id, OWNER, day(), 2, None);
    assert!(matches!(result, Err(Error::Database(_))));

    let stored = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.occurrences_in_period, 0);
    assert!(storage.list_occurrences(&h.id, None).unwrap().is_empty());
}

#[test]
fn failed_objective_write_keeps_the_habit_commit() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 4);

    storage
        .conn()
        .execute_batch(
            "CREATE TRIGGER fail_objective_progress BEFORE UPDATE OF progress ON objectives
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();

    let result = ProgressEngine::new(&mut storage).record_occurrence(&h.id, OWNER, day(), 2, None);
    assert!(result.is_err());

    let stored = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.occurrences_in_period, 2);
    assert_eq!(stored.progress.to_string(), "50.00");
    assert_eq!(objective_progress(&storage, &o.id), "0.00");
}

#[test]
fn other_owners_cannot_touch_a_habit() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 2);

    let mut engine = ProgressEngine::new(&mut storage);
    assert!(matches!(
        engine.record_occurrence(&h.id, "bruno", day(), 1, None),
        Err(Error::HabitNotFound { .. })
    ));
    assert!(matches!(
        engine.reset_cycle(&h.id, "bruno"),
        Err(Error::HabitNotFound { .. })
    ));
    assert!(matches!(
        engine.recompute_objective_progress(&o.id, "bruno"),
        Err(Error::ObjectiveNotFound { .. })
    ));

    assert!(storage.get_habit(&h.id, "bruno").unwrap().is_none());
    let stored = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.occurrences_in_period, 0);
}

#[test]
fn recompute_all_repairs_drifted_values() {
    let (_dir, mut storage) = setup();
    let o = objective(&mut storage);
    let h = habit(&mut storage, &o.id, 4);
    record(&mut storage, &h.id, 1);

    storage
        .conn()
        .execute_batch("UPDATE habits SET progress = 90; UPDATE objectives SET progress = 12;")
        .unwrap();

    let summary = ProgressEngine::new(&mut storage).recompute_all(OWNER).unwrap();
    assert_eq!(summary.habits, 1);
    assert_eq!(summary.objectives, 1);

    let stored = storage.get_habit(&h.id, OWNER).unwrap().unwrap();
    assert_eq!(stored.progress.to_string(), "25.00");
    assert_eq!(objective_progress(&storage, &o.id), "25.00");
}
