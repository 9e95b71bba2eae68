//! Input normalization for statuses, priorities and frequencies.
//!
//! Three-tier resolution: exact match → synonym lookup → `InvalidInput`
//! with a "did you mean" suggestion. Synonyms include the Portuguese
//! values stored by older habitrack databases and exports.

use crate::error::{Error, Result};
use crate::model::{Frequency, HabitStatus, ObjectiveStatus, Progress, TaskPriority, TaskStatus};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::LazyLock;

// ── Valid values ─────────────────────────────────────────────

const TASK_STATUSES: &[&str] = &["backlog", "todo", "doing", "blocked", "done"];
const TASK_PRIORITIES: &[&str] = &["low", "medium", "high"];
const FREQUENCIES: &[&str] = &["daily", "weekly", "monthly"];
const HABIT_STATUSES: &[&str] = &["active", "paused", "done"];
const OBJECTIVE_STATUSES: &[&str] = &["planned", "in_progress", "done", "archived"];

// ── Synonym maps ─────────────────────────────────────────────

pub static TASK_STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("new", "backlog"),
        ("icebox", "backlog"),
        ("open", "todo"),
        ("ready", "todo"),
        ("pending", "todo"),
        ("a_fazer", "todo"),
        ("wip", "doing"),
        ("in_progress", "doing"),
        ("started", "doing"),
        ("working", "doing"),
        ("fazendo", "doing"),
        ("waiting", "blocked"),
        ("stuck", "blocked"),
        ("bloqueada", "blocked"),
        ("complete", "done"),
        ("completed", "done"),
        ("finished", "done"),
        ("closed", "done"),
        ("concluida", "done"),
    ]
    .into_iter()
    .collect()
});

pub static PRIORITY_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("minor", "low"),
        ("trivial", "low"),
        ("baixa", "low"),
        ("normal", "medium"),
        ("default", "medium"),
        ("media", "medium"),
        ("important", "high"),
        ("urgent", "high"),
        ("critical", "high"),
        ("alta", "high"),
    ]
    .into_iter()
    .collect()
});

pub static FREQUENCY_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("day", "daily"),
        ("diario", "daily"),
        ("week", "weekly"),
        ("semanal", "weekly"),
        ("month", "monthly"),
        ("mensal", "monthly"),
    ]
    .into_iter()
    .collect()
});

pub static HABIT_STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("on", "active"),
        ("ativo", "active"),
        ("hold", "paused"),
        ("off", "paused"),
        ("pausado", "paused"),
        ("complete", "done"),
        ("completed", "done"),
        ("concluido", "done"),
    ]
    .into_iter()
    .collect()
});

pub static OBJECTIVE_STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("new", "planned"),
        ("planejado", "planned"),
        ("active", "in_progress"),
        ("wip", "in_progress"),
        ("started", "in_progress"),
        ("em_andamento", "in_progress"),
        ("complete", "done"),
        ("completed", "done"),
        ("concluido", "done"),
        ("archive", "archived"),
        ("arquivado", "archived"),
    ]
    .into_iter()
    .collect()
});

// ── Normalizers ──────────────────────────────────────────────

/// Resolve `input` to one of `valid`, case-insensitively, with `-` and
/// spaces read as `_`.
fn resolve(
    kind: &str,
    input: &str,
    valid: &[&'static str],
    synonyms: &HashMap<&str, &'static str>,
) -> Result<&'static str> {
    let key = input.trim().to_lowercase().replace(['-', ' '], "_");

    // Tier 1: exact match
    if let Some(&v) = valid.iter().find(|v| **v == key) {
        return Ok(v);
    }

    // Tier 2: synonym lookup
    if let Some(&canonical) = synonyms.get(key.as_str()) {
        return Ok(canonical);
    }

    // Tier 3: closest suggestion
    Err(Error::InvalidInput {
        message: format!("unknown {kind} '{input}' (expected one of: {})", valid.join(", ")),
        suggestion: find_closest_match(&key, valid, synonyms),
    })
}

/// Parse a task status.
///
/// # Errors
///
/// Returns `InvalidInput` for unknown values.
pub fn normalize_task_status(input: &str) -> Result<TaskStatus> {
    resolve("task status", input, TASK_STATUSES, &TASK_STATUS_SYNONYMS).map(TaskStatus::from_str)
}

/// Parse a task priority.
///
/// # Errors
///
/// Returns `InvalidInput` for unknown values.
pub fn normalize_priority(input: &str) -> Result<TaskPriority> {
    resolve("priority", input, TASK_PRIORITIES, &PRIORITY_SYNONYMS).map(TaskPriority::from_str)
}

/// Parse a habit frequency.
///
/// # Errors
///
/// Returns `InvalidInput` for unknown values.
pub fn normalize_frequency(input: &str) -> Result<Frequency> {
    resolve("frequency", input, FREQUENCIES, &FREQUENCY_SYNONYMS).map(Frequency::from_str)
}

/// Parse a habit status.
///
/// # Errors
///
/// Returns `InvalidInput` for unknown values.
pub fn normalize_habit_status(input: &str) -> Result<HabitStatus> {
    resolve("habit status", input, HABIT_STATUSES, &HABIT_STATUS_SYNONYMS)
        .map(HabitStatus::from_str)
}

/// Parse an objective status.
///
/// # Errors
///
/// Returns `InvalidInput` for unknown values.
pub fn normalize_objective_status(input: &str) -> Result<ObjectiveStatus> {
    resolve(
        "objective status",
        input,
        OBJECTIVE_STATUSES,
        &OBJECTIVE_STATUS_SYNONYMS,
    )
    .map(ObjectiveStatus::from_str)
}

/// Parse a calendar date. Accepts `YYYY-MM-DD`, `today` and `yesterday`.
///
/// # Errors
///
/// Returns `InvalidInput` for anything else.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let today = chrono::Local::now().date_naive();
    match input.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => today
            .pred_opt()
            .ok_or_else(|| Error::invalid("date out of range")),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| Error::InvalidInput {
            message: format!("malformed date '{input}'"),
            suggestion: Some(today.format("%Y-%m-%d").to_string()),
        }),
    }
}

/// Parse a user-supplied task progress percentage.
///
/// # Errors
///
/// Returns `InvalidInput` unless the value is a number in `[0, 100]`.
pub fn parse_progress(input: &str) -> Result<Progress> {
    let value: f64 = input
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|_| Error::invalid(format!("progress '{input}' is not a number")))?;
    Progress::try_from_percent(value)
        .map_err(|v| Error::invalid(format!("progress must be between 0 and 100, got {v}")))
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &[&str],
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            // For synonyms, show what it maps to
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Single-row optimization
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find existing IDs similar to the searched ID.
///
/// Returns up to `max` suggestions with edit distance ≤ 3,
/// sorted by distance then alphabetically.
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_task_status() {
        assert_eq!(normalize_task_status("doing").unwrap(), TaskStatus::Doing);
        assert_eq!(normalize_task_status("WIP").unwrap(), TaskStatus::Doing);
        assert_eq!(normalize_task_status("in-progress").unwrap(), TaskStatus::Doing);
        assert_eq!(normalize_task_status("concluida").unwrap(), TaskStatus::Done);
        assert_eq!(normalize_task_status("a_fazer").unwrap(), TaskStatus::Todo);
        assert!(normalize_task_status("nonsense").is_err());
    }

    #[test]
    fn test_unknown_status_suggests() {
        match normalize_task_status("dnoe").unwrap_err() {
            Error::InvalidInput { suggestion, .. } => assert_eq!(suggestion.as_deref(), Some("done")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_normalize_priority_and_frequency() {
        assert_eq!(normalize_priority("urgent").unwrap(), TaskPriority::High);
        assert_eq!(normalize_priority("baixa").unwrap(), TaskPriority::Low);
        assert_eq!(normalize_frequency("semanal").unwrap(), Frequency::Weekly);
        assert_eq!(normalize_frequency("Monthly").unwrap(), Frequency::Monthly);
        assert!(normalize_frequency("yearly").is_err());
    }

    #[test]
    fn test_normalize_entity_statuses() {
        assert_eq!(normalize_habit_status("pausado").unwrap(), HabitStatus::Paused);
        assert_eq!(
            normalize_objective_status("em_andamento").unwrap(),
            ObjectiveStatus::InProgress
        );
        assert_eq!(
            normalize_objective_status("in progress").unwrap(),
            ObjectiveStatus::InProgress
        );
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2026-03-02").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
        assert_eq!(parse_date("today").unwrap(), chrono::Local::now().date_naive());
        assert!(parse_date("03/02/2026").is_err());
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("42.5").unwrap().hundredths(), 4_250);
        assert_eq!(parse_progress("100%").unwrap(), Progress::FULL);
        assert!(parse_progress("101").is_err());
        assert!(parse_progress("-1").is_err());
        assert!(parse_progress("lots").is_err());
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_ids() {
        let ids = vec![
            "hab_a1b2c3d4e5f6".to_string(),
            "hab_a1b2c3d4e5f7".to_string(),
            "obj_zzzzzzzzzzzz".to_string(),
        ];
        let result = find_similar_ids("hab_a1b2c3d4e5f0", &ids, 3);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], "hab_a1b2c3d4e5f6");
    }
}
