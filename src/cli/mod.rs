//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for list/query commands.
#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table (default)
    #[default]
    Table,
    /// JSON (same as --json)
    Json,
    /// Comma-separated values
    Csv,
}

pub mod commands;

/// habitrack - objectives, habits and tasks with derived progress
#[derive(Parser, Debug)]
#[command(name = "ht", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.habitrack/data/habitrack.db)
    #[arg(long, global = true, env = "HT_DB")]
    pub db: Option<PathBuf>,

    /// Owner whose data is read and written
    #[arg(long, global = true, env = "HT_OWNER")]
    pub owner: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output format (table, json, csv)
    #[arg(long, value_enum, global = true, default_value_t)]
    pub format: OutputFormat,

    /// Output only the ID (for scripting)
    #[arg(long, global = true)]
    pub silent: bool,

    /// Preview changes without writing to the database
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the habitrack database
    Init {
        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Objective management
    Objective {
        #[command(subcommand)]
        command: ObjectiveCommands,
    },

    /// Habit management and cycle tracking
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },

    /// Task management (kanban)
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Recompute every habit and objective progress value for the owner
    RecomputeAll,

    /// Show the audit history of an entity
    History {
        /// Entity kind
        #[arg(value_enum)]
        entity: EntityKind,

        /// Entity ID
        id: String,

        /// Maximum number of events
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Entities that carry an audit trail.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Objective,
    Habit,
    Task,
}

impl EntityKind {
    /// Name used in the events table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Objective => "objective",
            Self::Habit => "habit",
            Self::Task => "task",
        }
    }
}

// ============================================================================
// Objective Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ObjectiveCommands {
    /// Create a new objective
    Create(ObjectiveCreateArgs),

    /// List objectives
    List {
        /// Filter by status (planned, in_progress, done, archived)
        #[arg(short, long)]
        status: Option<String>,

        /// Search title and description
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of objectives
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Show an objective with its habits and stats
    Show {
        /// Objective ID
        id: String,
    },

    /// Update an objective
    Update(ObjectiveUpdateArgs),

    /// Delete an objective with its habits, tasks and occurrences
    Delete {
        /// Objective ID
        id: String,
    },

    /// Recompute an objective's progress from its habits
    Recompute {
        /// Objective ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct ObjectiveCreateArgs {
    /// Objective title
    pub title: String,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Initial status
    #[arg(short, long, default_value = "planned")]
    pub status: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Args, Debug)]
pub struct ObjectiveUpdateArgs {
    /// Objective ID
    pub id: String,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New status
    #[arg(short, long)]
    pub status: Option<String>,

    /// New start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// New end date (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,
}

// ============================================================================
// Habit Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum HabitCommands {
    /// Create a new habit under an objective
    Create(HabitCreateArgs),

    /// List habits
    List {
        /// Filter by objective ID
        #[arg(short, long)]
        objective: Option<String>,

        /// Filter by status (active, paused, done)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by frequency (daily, weekly, monthly)
        #[arg(short, long)]
        frequency: Option<String>,

        /// Search title and description
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of habits
        #[arg(short, long, default_value = "50")]
        limit: u32,
    },

    /// Show a habit with its recent occurrences
    Show {
        /// Habit ID
        id: String,
    },

    /// Update a habit (progress is recomputed afterwards)
    Update(HabitUpdateArgs),

    /// Delete a habit with its tasks and occurrences
    Delete {
        /// Habit ID
        id: String,
    },

    /// Log that the habit was performed
    Done(HabitDoneArgs),

    /// Start a new cycle: zero the counter and progress
    Reset {
        /// Habit ID
        id: String,
    },

    /// Show the occurrence log
    Log {
        /// Habit ID
        id: String,

        /// Maximum number of occurrences
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Recompute a habit's progress and its objective's
    Recompute {
        /// Habit ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct HabitCreateArgs {
    /// Habit title
    pub title: String,

    /// Parent objective ID
    #[arg(short, long)]
    pub objective: String,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Cycle length (daily, weekly, monthly)
    #[arg(short, long, default_value = "daily")]
    pub frequency: String,

    /// Occurrences expected per cycle
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    pub target: i64,
}

#[derive(Args, Debug)]
pub struct HabitUpdateArgs {
    /// Habit ID
    pub id: String,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New frequency
    #[arg(short, long)]
    pub frequency: Option<String>,

    /// New target per cycle
    #[arg(short, long, allow_negative_numbers = true)]
    pub target: Option<i64>,

    /// Correct the occurrence counter of the current cycle
    #[arg(long, allow_negative_numbers = true)]
    pub occurrences: Option<i64>,

    /// New status (active, paused, done)
    #[arg(short, long)]
    pub status: Option<String>,
}

#[derive(Args, Debug)]
pub struct HabitDoneArgs {
    /// Habit ID
    pub id: String,

    /// How many times it was performed
    #[arg(short = 'n', long, default_value = "1", allow_negative_numbers = true)]
    pub quantity: i64,

    /// Date performed (YYYY-MM-DD, today, yesterday)
    #[arg(long, default_value = "today")]
    pub date: String,

    /// Free-form note
    #[arg(long)]
    pub note: Option<String>,
}

// ============================================================================
// Task Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a new task under a habit
    Create(TaskCreateArgs),

    /// List tasks
    List {
        /// Filter by habit ID
        #[arg(long)]
        habit: Option<String>,

        /// Filter by status (comma-separated)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by priority
        #[arg(short, long)]
        priority: Option<String>,

        /// Search title and description
        #[arg(long)]
        search: Option<String>,

        /// Due on or before (YYYY-MM-DD)
        #[arg(long)]
        due_before: Option<String>,

        /// Due on or after (YYYY-MM-DD)
        #[arg(long)]
        due_after: Option<String>,

        /// Maximum number of tasks
        #[arg(short, long, default_value = "100")]
        limit: u32,
    },

    /// Show task details
    Show {
        /// Task ID
        id: String,
    },

    /// Update a task
    Update(TaskUpdateArgs),

    /// Move a task to another board column
    Move {
        /// Task ID
        id: String,

        /// New status (backlog, todo, doing, blocked, done)
        status: String,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },

    /// Show a habit's tasks grouped by status
    Board {
        /// Habit ID
        habit: String,
    },
}

#[derive(Args, Debug)]
pub struct TaskCreateArgs {
    /// Task title
    pub title: String,

    /// Parent habit ID
    #[arg(long)]
    pub habit: String,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Priority (low, medium, high)
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Initial status
    #[arg(short, long, default_value = "backlog")]
    pub status: String,

    /// Estimated hours
    #[arg(long)]
    pub estimate: Option<f64>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,

    /// Position within the board column
    #[arg(long)]
    pub position: Option<i64>,

    /// Tags (comma-separated)
    #[arg(short, long)]
    pub tags: Option<String>,
}

#[derive(Args, Debug)]
pub struct TaskUpdateArgs {
    /// Task ID
    pub id: String,

    /// Move under another habit
    #[arg(long)]
    pub habit: Option<String>,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New priority
    #[arg(short, long)]
    pub priority: Option<String>,

    /// New status
    #[arg(short, long)]
    pub status: Option<String>,

    /// Progress percentage (0-100)
    #[arg(long)]
    pub progress: Option<String>,

    /// Estimated hours
    #[arg(long)]
    pub estimate: Option<f64>,

    /// Hours spent so far
    #[arg(long)]
    pub spent: Option<f64>,

    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,

    /// Position within the board column
    #[arg(long)]
    pub position: Option<i64>,

    /// Replace tags (comma-separated)
    #[arg(short, long)]
    pub tags: Option<String>,
}
