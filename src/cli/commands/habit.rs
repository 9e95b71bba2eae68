//! Habit command implementations.

use crate::cli::commands::{dry_run, format_timestamp, open_storage, resolve_owner, truncate};
use crate::cli::{HabitCommands, HabitCreateArgs, HabitDoneArgs, HabitUpdateArgs};
use crate::error::{Error, Result};
use crate::model::{Habit, HabitPatch, Occurrence, Progress};
use crate::progress::ProgressEngine;
use crate::storage::{HabitFilter, SqliteStorage};
use crate::validate::{
    find_similar_ids, normalize_frequency, normalize_habit_status, parse_date,
};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for habit list.
#[derive(Serialize)]
struct HabitListOutput {
    habits: Vec<Habit>,
    count: usize,
}

/// Output for habit show.
#[derive(Serialize)]
struct HabitShowOutput {
    habit: Habit,
    recent_occurrences: Vec<Occurrence>,
}

#[derive(Serialize)]
struct OccurrenceLogOutput {
    habit_id: String,
    occurrences: Vec<Occurrence>,
    count: usize,
}

#[derive(Serialize)]
struct RecomputeOutput {
    id: String,
    progress: Progress,
}

/// Execute habit commands.
///
/// # Errors
///
/// Returns an error if the database is missing, input is invalid or the
/// habit does not exist for the owner.
pub fn execute(
    command: &HabitCommands,
    db_path: Option<&PathBuf>,
    owner: Option<&str>,
    json: bool,
) -> Result<()> {
    let owner = resolve_owner(owner);
    match command {
        HabitCommands::Create(args) => create(args, db_path, &owner, json),
        HabitCommands::List {
            objective,
            status,
            frequency,
            search,
            limit,
        } => {
            let filter = HabitFilter {
                objective_id: objective.clone(),
                status: status.as_deref().map(normalize_habit_status).transpose()?,
                frequency: frequency.as_deref().map(normalize_frequency).transpose()?,
                search: search.clone(),
                limit: Some(*limit),
            };
            list(&filter, db_path, &owner, json)
        }
        HabitCommands::Show { id } => show(id, db_path, &owner, json),
        HabitCommands::Update(args) => update(args, db_path, &owner, json),
        HabitCommands::Delete { id } => delete(id, db_path, &owner, json),
        HabitCommands::Done(args) => done(args, db_path, &owner, json),
        HabitCommands::Reset { id } => reset(id, db_path, &owner, json),
        HabitCommands::Log { id, limit } => log(id, *limit, db_path, &owner, json),
        HabitCommands::Recompute { id } => recompute(id, db_path, &owner, json),
    }
}

/// Not-found error carrying the owner's closest habit IDs.
pub(crate) fn not_found(storage: &SqliteStorage, id: &str, owner: &str) -> Error {
    let all_ids = storage.list_habit_ids(owner).unwrap_or_default();
    let similar = find_similar_ids(id, &all_ids, 3);
    if similar.is_empty() {
        Error::HabitNotFound { id: id.to_string() }
    } else {
        Error::HabitNotFoundSimilar {
            id: id.to_string(),
            similar,
        }
    }
}

fn create(args: &HabitCreateArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let frequency = normalize_frequency(&args.frequency)?;
    let mut habit = Habit::new(
        owner.to_string(),
        args.objective.clone(),
        args.title.clone(),
        frequency,
        args.target,
    );
    if let Some(ref description) = args.description {
        habit = habit.with_description(description);
    }
    habit.validate()?;

    if crate::is_dry_run() {
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "create_habit",
                "objective_id": habit.objective_id,
                "title": habit.title,
                "frequency": habit.frequency.as_str(),
                "target_per_period": habit.target_per_period,
            });
            println!("{output}");
        } else {
            println!(
                "Would create habit: {} [{}x {}] under {}",
                habit.title,
                habit.target_per_period,
                habit.frequency.as_str(),
                habit.objective_id
            );
        }
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    let habit = ProgressEngine::new(&mut storage).create_habit(habit)?;

    if crate::is_silent() {
        println!("{}", habit.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&habit)?);
    } else {
        println!("Created habit: {} [{}]", habit.title, habit.id);
        println!(
            "  Target: {} per {} cycle",
            habit.target_per_period,
            habit.frequency.as_str()
        );
    }

    Ok(())
}

fn list(filter: &HabitFilter, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let habits = storage.list_habits(owner, filter)?;

    if crate::is_csv() {
        println!("id,objective_id,title,frequency,target,occurrences,progress,status");
        for h in &habits {
            println!(
                "{},{},{},{},{},{},{},{}",
                h.id,
                h.objective_id,
                crate::csv_escape(&h.title),
                h.frequency.as_str(),
                h.target_per_period,
                h.occurrences_in_period,
                h.progress,
                h.status.as_str()
            );
        }
    } else if json {
        let output = HabitListOutput {
            count: habits.len(),
            habits,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if habits.is_empty() {
        println!("No habits found.");
    } else {
        println!("Habits ({} found):", habits.len());
        println!();
        for h in &habits {
            println!(
                "  [{}] {:>6}%  {} {}",
                h.id.cyan(),
                h.progress,
                truncate(&h.title, 50),
                format!(
                    "({}/{} {}, {})",
                    h.occurrences_in_period,
                    h.target_per_period,
                    h.frequency.as_str(),
                    h.status.as_str()
                )
                .dimmed()
            );
        }
    }

    Ok(())
}

fn show(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let habit = storage
        .get_habit(id, owner)?
        .ok_or_else(|| not_found(&storage, id, owner))?;
    let recent_occurrences = storage.list_occurrences(id, Some(5))?;

    if json {
        let output = HabitShowOutput {
            habit,
            recent_occurrences,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("[{}] {}", habit.id, habit.title.bold());
    println!();
    println!("Objective: {}", habit.objective_id);
    println!("Status:    {}", habit.status.as_str());
    println!(
        "Cycle:     {}/{} ({})",
        habit.occurrences_in_period,
        habit.target_per_period,
        habit.frequency.as_str()
    );
    println!("Progress:  {}%", habit.progress);
    if let Some(start) = habit.period_start {
        println!("Since:     {start}");
    }
    if let Some(ref desc) = habit.description {
        println!();
        println!("Description:");
        println!("{desc}");
    }

    if !recent_occurrences.is_empty() {
        println!();
        println!("{}", "Recent".cyan().bold());
        print_occurrences(&recent_occurrences);
    }

    Ok(())
}

fn update(args: &HabitUpdateArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let patch = HabitPatch {
        title: args.title.clone(),
        description: args.description.clone(),
        frequency: args.frequency.as_deref().map(normalize_frequency).transpose()?,
        target_per_period: args.target,
        occurrences_in_period: args.occurrences,
        status: args.status.as_deref().map(normalize_habit_status).transpose()?,
    };

    if dry_run("update_habit", Some(&args.id), &format!("update habit: {}", args.id), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_habit(&args.id, owner)?.is_none() {
        return Err(not_found(&storage, &args.id, owner));
    }
    let habit = ProgressEngine::new(&mut storage).update_habit(&args.id, owner, &patch)?;

    if crate::is_silent() {
        println!("{}", habit.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&habit)?);
    } else {
        println!("Updated habit: {} [{}]", habit.title, habit.id);
        println!(
            "  Cycle: {}/{}  Progress: {}%",
            habit.occurrences_in_period, habit.target_per_period, habit.progress
        );
    }

    Ok(())
}

fn delete(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    if dry_run("delete_habit", Some(id), &format!("delete habit: {id}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    let habit = ProgressEngine::new(&mut storage).delete_habit(id, owner)?;

    if crate::is_silent() {
        println!("{id}");
        return Ok(());
    }

    if json {
        let output = serde_json::json!({
            "id": id,
            "objective_id": habit.objective_id,
            "deleted": true,
        });
        println!("{output}");
    } else {
        println!("Deleted habit: {} [{}]", habit.title, id);
    }

    Ok(())
}

fn done(args: &HabitDoneArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let occurred_on = parse_date(&args.date)?;
    if args.quantity < 1 {
        return Err(Error::invalid(format!(
            "quantity must be at least 1, got {}",
            args.quantity
        )));
    }

    if crate::is_dry_run() {
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "record_occurrence",
                "id": args.id,
                "quantity": args.quantity,
                "occurred_on": occurred_on.to_string(),
            });
            println!("{output}");
        } else {
            println!(
                "Would record {} occurrence(s) of {} on {occurred_on}",
                args.quantity, args.id
            );
        }
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_habit(&args.id, owner)?.is_none() {
        return Err(not_found(&storage, &args.id, owner));
    }
    let habit = ProgressEngine::new(&mut storage).record_occurrence(
        &args.id,
        owner,
        occurred_on,
        args.quantity,
        args.note.as_deref(),
    )?;

    if crate::is_silent() {
        println!("{}", habit.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&habit)?);
    } else {
        let mark = if habit.progress.is_complete() {
            "✓".green().to_string()
        } else {
            "+".to_string()
        };
        println!(
            "{mark} {}: {}/{} this cycle ({}%)",
            habit.title, habit.occurrences_in_period, habit.target_per_period, habit.progress
        );
    }

    Ok(())
}

fn reset(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    if dry_run("reset_cycle", Some(id), &format!("reset the cycle of habit: {id}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_habit(id, owner)?.is_none() {
        return Err(not_found(&storage, id, owner));
    }
    let habit = ProgressEngine::new(&mut storage).reset_cycle(id, owner)?;

    if crate::is_silent() {
        println!("{}", habit.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&habit)?);
    } else {
        println!("Started a new cycle for {} [{}]", habit.title, habit.id);
    }

    Ok(())
}

fn log(id: &str, limit: u32, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    if storage.get_habit(id, owner)?.is_none() {
        return Err(not_found(&storage, id, owner));
    }
    let occurrences = storage.list_occurrences(id, Some(limit))?;

    if crate::is_csv() {
        println!("id,occurred_on,quantity,note");
        for o in &occurrences {
            println!(
                "{},{},{},{}",
                o.id,
                o.occurred_on,
                o.quantity,
                crate::csv_escape(o.note.as_deref().unwrap_or(""))
            );
        }
    } else if json {
        let output = OccurrenceLogOutput {
            habit_id: id.to_string(),
            count: occurrences.len(),
            occurrences,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if occurrences.is_empty() {
        println!("No occurrences logged.");
    } else {
        print_occurrences(&occurrences);
    }

    Ok(())
}

fn recompute(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    if dry_run("recompute_habit", Some(id), &format!("recompute habit: {id}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_habit(id, owner)?.is_none() {
        return Err(not_found(&storage, id, owner));
    }
    let progress = ProgressEngine::new(&mut storage).recompute_habit_progress(id, owner)?;

    if json {
        let output = RecomputeOutput {
            id: id.to_string(),
            progress,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Habit {id}: {progress}%");
    }

    Ok(())
}

fn print_occurrences(occurrences: &[Occurrence]) {
    for o in occurrences {
        let note = o.note.as_deref().map(|n| truncate(n, 50)).unwrap_or_default();
        println!(
            "  {} x{}  {} {}",
            o.occurred_on,
            o.quantity,
            note,
            format!("(logged {})", format_timestamp(o.created_at)).dimmed()
        );
    }
}
