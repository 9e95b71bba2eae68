//! Objective command implementations.

use crate::cli::commands::{dry_run, open_storage, resolve_owner, truncate};
use crate::cli::{ObjectiveCommands, ObjectiveCreateArgs, ObjectiveUpdateArgs};
use crate::error::{Error, Result};
use crate::model::{Habit, Objective, ObjectivePatch, ObjectiveStats};
use crate::progress::ProgressEngine;
use crate::storage::{HabitFilter, ObjectiveFilter, SqliteStorage};
use crate::validate::{find_similar_ids, normalize_objective_status, parse_date};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for objective list.
#[derive(Serialize)]
struct ObjectiveListOutput {
    objectives: Vec<Objective>,
    count: usize,
}

/// Output for objective show.
#[derive(Serialize)]
struct ObjectiveShowOutput {
    objective: Objective,
    stats: ObjectiveStats,
    habits: Vec<Habit>,
}

#[derive(Serialize)]
struct RecomputeOutput {
    id: String,
    progress: crate::model::Progress,
}

/// Execute objective commands.
///
/// # Errors
///
/// Returns an error if the database is missing, input is invalid or the
/// objective does not exist for the owner.
pub fn execute(
    command: &ObjectiveCommands,
    db_path: Option<&PathBuf>,
    owner: Option<&str>,
    json: bool,
) -> Result<()> {
    let owner = resolve_owner(owner);
    match command {
        ObjectiveCommands::Create(args) => create(args, db_path, &owner, json),
        ObjectiveCommands::List {
            status,
            search,
            limit,
        } => list(status.as_deref(), search.as_deref(), *limit, db_path, &owner, json),
        ObjectiveCommands::Show { id } => show(id, db_path, &owner, json),
        ObjectiveCommands::Update(args) => update(args, db_path, &owner, json),
        ObjectiveCommands::Delete { id } => delete(id, db_path, &owner, json),
        ObjectiveCommands::Recompute { id } => recompute(id, db_path, &owner, json),
    }
}

/// Not-found error carrying the owner's closest objective IDs.
pub(crate) fn not_found(storage: &SqliteStorage, id: &str, owner: &str) -> Error {
    let all_ids = storage.list_objective_ids(owner).unwrap_or_default();
    let similar = find_similar_ids(id, &all_ids, 3);
    if similar.is_empty() {
        Error::ObjectiveNotFound { id: id.to_string() }
    } else {
        Error::ObjectiveNotFoundSimilar {
            id: id.to_string(),
            similar,
        }
    }
}

fn create(args: &ObjectiveCreateArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let status = normalize_objective_status(&args.status)?;
    let start = args.start.as_deref().map(parse_date).transpose()?;
    let end = args.end.as_deref().map(parse_date).transpose()?;

    let mut objective = Objective::new(owner.to_string(), args.title.clone())
        .with_status(status)
        .with_dates(start, end);
    if let Some(ref description) = args.description {
        objective = objective.with_description(description);
    }
    objective.validate()?;

    if crate::is_dry_run() {
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "create_objective",
                "title": objective.title,
                "status": objective.status.as_str(),
            });
            println!("{output}");
        } else {
            println!("Would create objective: {} [{}]", objective.title, objective.status.as_str());
        }
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    storage.create_objective(&objective, owner)?;

    if crate::is_silent() {
        println!("{}", objective.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&objective)?);
    } else {
        println!("Created objective: {} [{}]", objective.title, objective.id);
        println!("  Status: {}", objective.status.as_str());
    }

    Ok(())
}

fn list(
    status: Option<&str>,
    search: Option<&str>,
    limit: u32,
    db_path: Option<&PathBuf>,
    owner: &str,
    json: bool,
) -> Result<()> {
    let storage = open_storage(db_path)?;
    let filter = ObjectiveFilter {
        status: status.map(normalize_objective_status).transpose()?,
        search: search.map(ToString::to_string),
        limit: Some(limit),
    };
    let objectives = storage.list_objectives(owner, &filter)?;

    if crate::is_csv() {
        println!("id,title,status,progress,start_date,end_date");
        for o in &objectives {
            println!(
                "{},{},{},{},{},{}",
                o.id,
                crate::csv_escape(&o.title),
                o.status.as_str(),
                o.progress,
                o.start_date.map(|d| d.to_string()).unwrap_or_default(),
                o.end_date.map(|d| d.to_string()).unwrap_or_default(),
            );
        }
    } else if json {
        let output = ObjectiveListOutput {
            count: objectives.len(),
            objectives,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if objectives.is_empty() {
        println!("No objectives found.");
    } else {
        println!("Objectives ({} found):", objectives.len());
        println!();
        for o in &objectives {
            println!(
                "  [{}] {:>6}%  {} {}",
                o.id.cyan(),
                o.progress,
                truncate(&o.title, 60),
                format!("({})", o.status.as_str()).dimmed()
            );
        }
    }

    Ok(())
}

fn show(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let objective = storage
        .get_objective(id, owner)?
        .ok_or_else(|| not_found(&storage, id, owner))?;
    let stats = storage.get_objective_stats(id)?;
    let habits = storage.list_habits(
        owner,
        &HabitFilter {
            objective_id: Some(id.to_string()),
            ..HabitFilter::default()
        },
    )?;

    if json {
        let output = ObjectiveShowOutput {
            objective,
            stats,
            habits,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("[{}] {}", objective.id, objective.title.bold());
    println!();
    println!("Status:   {}", objective.status.as_str());
    println!("Progress: {}%", objective.progress);
    if let Some(start) = objective.start_date {
        println!("Start:    {start}");
    }
    if let Some(end) = objective.end_date {
        println!("End:      {end}");
    }
    if let Some(ref desc) = objective.description {
        println!();
        println!("Description:");
        println!("{desc}");
    }

    println!();
    println!("{}", "Stats".cyan().bold());
    println!(
        "  Habits: {} ({} active)   Tasks: {}/{} done",
        stats.total_habits, stats.active_habits, stats.done_tasks, stats.total_tasks
    );
    println!("  Mean task progress: {}%", stats.mean_task_progress);

    if !habits.is_empty() {
        println!();
        println!("{}", "Habits".cyan().bold());
        for h in &habits {
            println!(
                "  [{}] {:>6}%  {} {}",
                h.id,
                h.progress,
                h.title,
                format!(
                    "({}/{} {})",
                    h.occurrences_in_period,
                    h.target_per_period,
                    h.frequency.as_str()
                )
                .dimmed()
            );
        }
    }

    Ok(())
}

fn update(args: &ObjectiveUpdateArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let patch = ObjectivePatch {
        title: args.title.clone(),
        description: args.description.clone(),
        status: args
            .status
            .as_deref()
            .map(normalize_objective_status)
            .transpose()?,
        start_date: args.start.as_deref().map(parse_date).transpose()?,
        end_date: args.end.as_deref().map(parse_date).transpose()?,
    };

    if dry_run("update_objective", Some(&args.id), &format!("update objective: {}", args.id), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_objective(&args.id, owner)?.is_none() {
        return Err(not_found(&storage, &args.id, owner));
    }
    let objective = ProgressEngine::new(&mut storage).update_objective(&args.id, owner, &patch)?;

    if crate::is_silent() {
        println!("{}", objective.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&objective)?);
    } else {
        println!("Updated objective: {} [{}]", objective.title, objective.id);
        println!("  Status:   {}", objective.status.as_str());
        println!("  Progress: {}%", objective.progress);
    }

    Ok(())
}

fn delete(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    if dry_run("delete_objective", Some(id), &format!("delete objective: {id}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    let objective = storage.delete_objective(id, owner, owner)?;

    if crate::is_silent() {
        println!("{id}");
        return Ok(());
    }

    if json {
        let output = serde_json::json!({
            "id": id,
            "deleted": true,
        });
        println!("{output}");
    } else {
        println!("Deleted objective: {} [{}]", objective.title, id);
    }

    Ok(())
}

fn recompute(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    if dry_run("recompute_objective", Some(id), &format!("recompute objective: {id}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    let progress = ProgressEngine::new(&mut storage).recompute_objective_progress(id, owner)?;

    if json {
        let output = RecomputeOutput {
            id: id.to_string(),
            progress,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Objective {id}: {progress}%");
    }

    Ok(())
}
