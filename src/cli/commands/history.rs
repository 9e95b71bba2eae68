//! History command implementation.

use crate::cli::commands::{format_timestamp, habit, objective, open_storage, resolve_owner, task};
use crate::cli::EntityKind;
use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use crate::storage::{Event, SqliteStorage};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct HistoryOutput {
    entity_type: &'static str,
    entity_id: String,
    events: Vec<Event>,
    count: usize,
}

/// Show the audit trail of one entity.
///
/// A live entity must belong to the owner. Once deleted, only the events
/// the owner recorded are shown.
///
/// # Errors
///
/// Returns the matching not-found error when the entity belongs to
/// someone else or no events are visible.
pub fn execute(
    entity: EntityKind,
    id: &str,
    limit: u32,
    db_path: Option<&PathBuf>,
    owner: Option<&str>,
    json: bool,
) -> Result<()> {
    let owner = resolve_owner(owner);
    let storage = open_storage(db_path)?;

    let mut events = storage.get_history(entity.as_str(), id, Some(limit))?;
    match owner_of(&storage, entity, id)? {
        Some(ref entity_owner) if *entity_owner == owner => {}
        Some(_) => return Err(not_found(&storage, entity, id, &owner)),
        None => {
            events.retain(|e| e.actor == owner);
            if events.is_empty() {
                return Err(not_found(&storage, entity, id, &owner));
            }
        }
    }

    if json {
        let output = HistoryOutput {
            entity_type: entity.as_str(),
            entity_id: id.to_string(),
            count: events.len(),
            events,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No history for {} {id}.", entity.as_str());
        return Ok(());
    }

    println!("History of {} {}:", entity.as_str(), id.cyan());
    println!();
    for event in &events {
        let change = match (&event.old_value, &event.new_value) {
            (Some(old), Some(new)) => format!(" {old} -> {new}"),
            (None, Some(new)) => format!(" -> {new}"),
            _ => String::new(),
        };
        println!(
            "  {} {}{} {}",
            format_timestamp(event.created_at).dimmed(),
            event.event_type.as_str(),
            change,
            format!("by {}", event.actor).dimmed()
        );
    }

    Ok(())
}

/// Owner of a live entity, or `None` once it is gone.
fn owner_of(storage: &SqliteStorage, entity: EntityKind, id: &str) -> Result<Option<String>> {
    let conn = storage.conn();
    Ok(match entity {
        EntityKind::Objective => conn.get_objective(id, None)?.map(|o| o.owner),
        EntityKind::Habit => conn.get_habit(id, None)?.map(|h| h.owner),
        EntityKind::Task => conn.get_task(id, None)?.map(|t| t.owner),
    })
}

fn not_found(storage: &SqliteStorage, entity: EntityKind, id: &str, owner: &str) -> Error {
    match entity {
        EntityKind::Objective => objective::not_found(storage, id, owner),
        EntityKind::Habit => habit::not_found(storage, id, owner),
        EntityKind::Task => task::not_found(storage, id, owner),
    }
}
