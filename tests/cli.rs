//! Command-line tests for the `ht` binary.
//!
//! stdout is not a terminal under test, so every command answers in JSON.

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    db: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("habitrack.db");
        let ws = Self { _dir: dir, db };
        ws.ht().arg("init").assert().success();
        ws
    }

    fn ht(&self) -> Command {
        ht_with_db(&self.db)
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.ht().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    fn id(&self, args: &[&str]) -> String {
        let output = self
            .ht()
            .args(args)
            .arg("--silent")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        String::from_utf8(output).unwrap().trim().to_string()
    }
}

fn ht_with_db(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ht").unwrap();
    cmd.env_remove("HT_TEST_DB")
        .env_remove("HABITRACK_DB")
        .env_remove("RUST_LOG")
        .env("HT_OWNER", "ana")
        .arg("--db")
        .arg(db);
    cmd
}

fn stderr_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stderr).unwrap()
}

#[test]
fn init_twice_requires_force() {
    let ws = Workspace::new();
    let output = ws.ht().arg("init").assert().code(2).get_output().clone();
    assert_eq!(stderr_json(&output)["error"]["code"], "ALREADY_INITIALIZED");

    ws.ht().args(["init", "--force"]).assert().success();
}

#[test]
fn commands_fail_before_init() {
    let dir = TempDir::new().unwrap();
    let output = ht_with_db(&dir.path().join("missing.db"))
        .args(["objective", "list"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    assert_eq!(stderr_json(&output)["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn occurrences_roll_up_to_the_objective() {
    let ws = Workspace::new();
    let objective = ws.id(&["objective", "create", "Get fit"]);
    let habit = ws.id(&[
        "habit", "create", "Run", "--objective", &objective, "--frequency", "weekly", "--target", "4",
    ]);

    let after = ws.json(&["habit", "done", &habit, "-n", "3", "--date", "2026-05-04"]);
    assert_eq!(after["occurrences_in_period"], 3);
    assert_eq!(after["progress"], 75.0);

    let shown = ws.json(&["objective", "show", &objective]);
    assert_eq!(shown["objective"]["progress"], 75.0);
    assert_eq!(shown["stats"]["total_habits"], 1);
    assert_eq!(shown["habits"].as_array().unwrap().len(), 1);

    let log = ws.json(&["habit", "log", &habit]);
    assert_eq!(log["count"], 1);
    assert_eq!(log["occurrences"][0]["quantity"], 3);

    let reset = ws.json(&["habit", "reset", &habit]);
    assert_eq!(reset["occurrences_in_period"], 0);
    assert_eq!(reset["progress"], 0.0);

    let shown = ws.json(&["objective", "show", &objective]);
    assert_eq!(shown["objective"]["progress"], 0.0);
}

#[test]
fn task_lifecycle_on_the_board() {
    let ws = Workspace::new();
    let objective = ws.id(&["objective", "create", "Ship the garden"]);
    let habit = ws.id(&["habit", "create", "Water plants", "--objective", &objective]);
    let task = ws.id(&[
        "task", "create", "Buy hose", "--habit", &habit, "--priority", "alta", "--tags", "gear, garden",
    ]);

    let shown = ws.json(&["task", "show", &task]);
    assert_eq!(shown["status"], "backlog");
    assert_eq!(shown["priority"], "high");
    assert_eq!(shown["tags"], serde_json::json!(["gear", "garden"]));

    let done = ws.json(&["task", "move", &task, "done"]);
    assert_eq!(done["progress"], 100.0);
    assert!(done["completed_at"].is_i64());

    let reopened = ws.json(&["task", "move", &task, "fazendo"]);
    assert_eq!(reopened["status"], "doing");
    assert!(reopened["completed_at"].is_null());
    assert_eq!(reopened["progress"], 100.0);

    let board = ws.json(&["task", "board", &habit]);
    let columns = board["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 5);
    assert_eq!(columns[2]["status"], "doing");
    assert_eq!(columns[2]["tasks"].as_array().unwrap().len(), 1);

    // Task progress leaves the habit untouched.
    let habit_shown = ws.json(&["habit", "show", &habit]);
    assert_eq!(habit_shown["habit"]["progress"], 0.0);

    let history = ws.json(&["history", "task", &task]);
    let types: Vec<&str> = history["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["event_type"].as_str())
        .collect();
    assert!(types.contains(&"task_completed"));
    assert!(types.contains(&"task_reopened"));
}

#[test]
fn other_owners_see_not_found() {
    let ws = Workspace::new();
    let objective = ws.id(&["objective", "create", "Private goal"]);

    let output = ws
        .ht()
        .args(["objective", "show", &objective, "--owner", "bruno"])
        .assert()
        .code(3)
        .get_output()
        .clone();
    assert_eq!(stderr_json(&output)["error"]["code"], "OBJECTIVE_NOT_FOUND");

    let listed = ws.json(&["objective", "list", "--owner", "bruno"]);
    assert_eq!(listed["count"], 0);
}

#[test]
fn invalid_input_is_rejected() {
    let ws = Workspace::new();
    let objective = ws.id(&["objective", "create", "Read more"]);

    let output = ws
        .ht()
        .args(["habit", "create", "Read", "--objective", &objective, "--target", "0"])
        .assert()
        .code(4)
        .get_output()
        .clone();
    assert_eq!(stderr_json(&output)["error"]["code"], "INVALID_INPUT");

    ws.ht()
        .args(["task", "list", "--status", "sideways"])
        .assert()
        .code(4);
}

#[test]
fn dry_run_writes_nothing() {
    let ws = Workspace::new();
    let preview = ws.json(&["objective", "create", "Maybe later", "--dry-run"]);
    assert_eq!(preview["dry_run"], true);

    let listed = ws.json(&["objective", "list"]);
    assert_eq!(listed["count"], 0);
}

#[test]
fn csv_lists_have_a_header() {
    let ws = Workspace::new();
    let objective = ws.id(&["objective", "create", "Learn, then teach"]);
    ws.id(&["habit", "create", "Practice", "--objective", &objective]);

    let output = ws
        .ht()
        .args(["habit", "list", "--format", "csv"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id,objective_id,title,frequency,target,occurrences,progress,status")
    );
    assert!(lines.next().unwrap().contains("Practice"));
}

#[test]
fn recompute_all_reports_counts() {
    let ws = Workspace::new();
    let objective = ws.id(&["objective", "create", "Sleep better"]);
    ws.id(&["habit", "create", "Lights out by 11", "--objective", &objective]);

    let summary = ws.json(&["recompute-all"]);
    assert_eq!(summary["habits"], 1);
    assert_eq!(summary["objectives"], 1);
}
