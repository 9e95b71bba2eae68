//! Task command implementations.

use crate::cli::commands::{
    dry_run, format_timestamp, habit, open_storage, resolve_owner, split_csv, truncate,
};
use crate::cli::{TaskCommands, TaskCreateArgs, TaskUpdateArgs};
use crate::error::{Error, Result};
use crate::model::{Task, TaskPatch, TaskPriority, TaskStatus};
use crate::progress::ProgressEngine;
use crate::storage::{SqliteStorage, TaskFilter};
use crate::validate::{
    find_similar_ids, normalize_priority, normalize_task_status, parse_date, parse_progress,
};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for task list.
#[derive(Serialize)]
struct TaskListOutput {
    tasks: Vec<Task>,
    count: usize,
}

#[derive(Serialize)]
struct BoardColumn {
    status: TaskStatus,
    tasks: Vec<Task>,
}

/// Output for the kanban board.
#[derive(Serialize)]
struct BoardOutput {
    habit_id: String,
    columns: Vec<BoardColumn>,
}

/// Execute task commands.
///
/// # Errors
///
/// Returns an error if the database is missing, input is invalid or the
/// task (or its habit) does not exist for the owner.
pub fn execute(
    command: &TaskCommands,
    db_path: Option<&PathBuf>,
    owner: Option<&str>,
    json: bool,
) -> Result<()> {
    let owner = resolve_owner(owner);
    match command {
        TaskCommands::Create(args) => create(args, db_path, &owner, json),
        TaskCommands::List {
            habit,
            status,
            priority,
            search,
            due_before,
            due_after,
            limit,
        } => {
            let statuses = status
                .as_deref()
                .map(split_csv)
                .unwrap_or_default()
                .iter()
                .map(|s| normalize_task_status(s))
                .collect::<Result<Vec<_>>>()?;
            let filter = TaskFilter {
                habit_id: habit.clone(),
                statuses,
                priority: priority.as_deref().map(normalize_priority).transpose()?,
                search: search.clone(),
                due_before: due_before.as_deref().map(parse_date).transpose()?,
                due_after: due_after.as_deref().map(parse_date).transpose()?,
                limit: Some(*limit),
            };
            list(&filter, db_path, &owner, json)
        }
        TaskCommands::Show { id } => show(id, db_path, &owner, json),
        TaskCommands::Update(args) => update(args, db_path, &owner, json),
        TaskCommands::Move { id, status } => move_task(id, status, db_path, &owner, json),
        TaskCommands::Delete { id } => delete(id, db_path, &owner, json),
        TaskCommands::Board { habit } => board(habit, db_path, &owner, json),
    }
}

/// Not-found error carrying the owner's closest task IDs.
pub(crate) fn not_found(storage: &SqliteStorage, id: &str, owner: &str) -> Error {
    let all_ids = storage.list_task_ids(owner).unwrap_or_default();
    let similar = find_similar_ids(id, &all_ids, 3);
    if similar.is_empty() {
        Error::TaskNotFound { id: id.to_string() }
    } else {
        Error::TaskNotFoundSimilar {
            id: id.to_string(),
            similar,
        }
    }
}

fn create(args: &TaskCreateArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let status = normalize_task_status(&args.status)?;
    let priority = args.priority.as_deref().map(normalize_priority).transpose()?;

    let mut task = Task::new(owner.to_string(), args.habit.clone(), args.title.clone())
        .with_status(status);
    if let Some(ref description) = args.description {
        task = task.with_description(description);
    }
    if let Some(priority) = priority {
        task = task.with_priority(priority);
    }
    if let Some(ref tags) = args.tags {
        task = task.with_tags(split_csv(tags));
    }
    task.estimate_hours = args.estimate;
    task.due_date = args.due.as_deref().map(parse_date).transpose()?;
    task.position = args.position;
    task.validate()?;

    if crate::is_dry_run() {
        if json {
            let output = serde_json::json!({
                "dry_run": true,
                "action": "create_task",
                "habit_id": task.habit_id,
                "title": task.title,
                "status": task.status.as_str(),
                "tags": task.tags,
            });
            println!("{output}");
        } else {
            println!(
                "Would create task: {} [{}] under {}",
                task.title,
                task.status.as_str(),
                task.habit_id
            );
        }
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_habit(&task.habit_id, owner)?.is_none() {
        return Err(habit::not_found(&storage, &task.habit_id, owner));
    }
    let task = ProgressEngine::new(&mut storage).create_task(task)?;

    if crate::is_silent() {
        println!("{}", task.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&task)?);
    } else {
        println!("Created task: {} [{}]", task.title, task.id);
        println!("  Status: {}", task.status.as_str());
        if let Some(priority) = task.priority {
            println!("  Priority: {}", priority.as_str());
        }
    }

    Ok(())
}

fn list(filter: &TaskFilter, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let tasks = storage.list_tasks(owner, filter)?;

    if crate::is_csv() {
        println!("id,habit_id,title,status,priority,progress,due_date,tags");
        for t in &tasks {
            println!(
                "{},{},{},{},{},{},{},{}",
                t.id,
                t.habit_id,
                crate::csv_escape(&t.title),
                t.status.as_str(),
                t.priority.map(|p| p.as_str()).unwrap_or(""),
                t.progress,
                t.due_date.map(|d| d.to_string()).unwrap_or_default(),
                crate::csv_escape(&t.tags.join(","))
            );
        }
    } else if json {
        let output = TaskListOutput {
            count: tasks.len(),
            tasks,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if tasks.is_empty() {
        println!("No tasks found.");
    } else {
        println!("Tasks ({} found):", tasks.len());
        println!();
        for t in &tasks {
            print_task_line(t);
        }
    }

    Ok(())
}

fn show(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let task = storage
        .get_task(id, owner)?
        .ok_or_else(|| not_found(&storage, id, owner))?;

    if json {
        println!("{}", serde_json::to_string(&task)?);
        return Ok(());
    }

    println!("[{}] {}", task.id, task.title.bold());
    println!();
    println!("Habit:    {}", task.habit_id);
    println!("Status:   {}", task.status.as_str());
    if let Some(priority) = task.priority {
        println!("Priority: {}", priority.as_str());
    }
    println!("Progress: {}%", task.progress);
    match task.estimate_hours {
        Some(estimate) => println!("Hours:    {} / {estimate}", task.hours_spent),
        None => println!("Hours:    {}", task.hours_spent),
    }
    if let Some(due) = task.due_date {
        println!("Due:      {due}");
    }
    if !task.tags.is_empty() {
        println!("Tags:     {}", task.tags.join(", "));
    }
    if let Some(completed) = task.completed_at {
        println!("Done at:  {}", format_timestamp(completed));
    }
    if let Some(ref desc) = task.description {
        println!();
        println!("Description:");
        println!("{desc}");
    }

    Ok(())
}

fn update(args: &TaskUpdateArgs, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let patch = TaskPatch {
        habit_id: args.habit.clone(),
        title: args.title.clone(),
        description: args.description.clone(),
        priority: args.priority.as_deref().map(normalize_priority).transpose()?,
        status: args.status.as_deref().map(normalize_task_status).transpose()?,
        progress: args.progress.as_deref().map(parse_progress).transpose()?,
        estimate_hours: args.estimate,
        hours_spent: args.spent,
        due_date: args.due.as_deref().map(parse_date).transpose()?,
        position: args.position,
        tags: args.tags.as_deref().map(split_csv),
    };

    if dry_run("update_task", Some(&args.id), &format!("update task: {}", args.id), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_task(&args.id, owner)?.is_none() {
        return Err(not_found(&storage, &args.id, owner));
    }
    let task = ProgressEngine::new(&mut storage).update_task(&args.id, owner, &patch)?;

    if crate::is_silent() {
        println!("{}", task.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&task)?);
    } else {
        println!("Updated task: {} [{}]", task.title, task.id);
        println!("  Status: {}  Progress: {}%", task.status.as_str(), task.progress);
    }

    Ok(())
}

fn move_task(id: &str, status: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let status = normalize_task_status(status)?;

    if dry_run(
        "move_task",
        Some(id),
        &format!("move task {id} to {}", status.as_str()),
        json,
    ) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_task(id, owner)?.is_none() {
        return Err(not_found(&storage, id, owner));
    }
    let task = ProgressEngine::new(&mut storage).move_task(id, owner, status)?;

    if crate::is_silent() {
        println!("{}", task.id);
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&task)?);
    } else {
        println!("Moved task: {} [{}] -> {}", task.title, task.id, task.status.as_str());
    }

    Ok(())
}

fn delete(id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    if dry_run("delete_task", Some(id), &format!("delete task: {id}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    if storage.get_task(id, owner)?.is_none() {
        return Err(not_found(&storage, id, owner));
    }
    let task = ProgressEngine::new(&mut storage).delete_task(id, owner)?;

    if crate::is_silent() {
        println!("{id}");
        return Ok(());
    }

    if json {
        let output = serde_json::json!({
            "id": id,
            "habit_id": task.habit_id,
            "deleted": true,
        });
        println!("{output}");
    } else {
        println!("Deleted task: {} [{}]", task.title, id);
    }

    Ok(())
}

fn board(habit_id: &str, db_path: Option<&PathBuf>, owner: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let habit = storage
        .get_habit(habit_id, owner)?
        .ok_or_else(|| habit::not_found(&storage, habit_id, owner))?;
    let tasks = storage.list_tasks(
        owner,
        &TaskFilter {
            habit_id: Some(habit_id.to_string()),
            limit: Some(1_000),
            ..TaskFilter::default()
        },
    )?;

    let mut columns: Vec<BoardColumn> = TaskStatus::ALL
        .into_iter()
        .map(|status| BoardColumn {
            status,
            tasks: Vec::new(),
        })
        .collect();
    for task in tasks {
        if let Some(column) = columns.iter_mut().find(|c| c.status == task.status) {
            column.tasks.push(task);
        }
    }

    if json {
        let output = BoardOutput {
            habit_id: habit.id,
            columns,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {}", habit.title.bold(), format!("[{}]", habit.id).dimmed());
    for column in &columns {
        println!();
        println!(
            "{} ({})",
            column.status.as_str().to_uppercase().cyan().bold(),
            column.tasks.len()
        );
        for t in &column.tasks {
            print_task_line(t);
        }
    }

    Ok(())
}

fn print_task_line(task: &Task) {
    let status_icon = match task.status {
        TaskStatus::Backlog => "◌",
        TaskStatus::Todo => "○",
        TaskStatus::Doing => "●",
        TaskStatus::Blocked => "⊘",
        TaskStatus::Done => "✓",
    };
    let priority_str = match task.priority {
        Some(TaskPriority::High) => "!!",
        Some(TaskPriority::Medium) => "! ",
        Some(TaskPriority::Low) | None => "  ",
    };
    let due = task
        .due_date
        .map(|d| format!(" due {d}"))
        .unwrap_or_default();
    println!(
        "  {} [{}] {} {}{}",
        status_icon,
        task.id,
        priority_str,
        truncate(&task.title, 60),
        due.dimmed()
    );
}
