//! Error types for habitrack.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=persistence, 3=not_found, 4=invalid_input, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for habitrack operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Category ────────────────────────────────────────────

/// Coarse failure taxonomy surfaced by the progress engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Entity missing or not owned by the caller.
    NotFound,
    /// Rejected input (bad quantity, target, status...).
    InvalidInput,
    /// Storage collaborator failure. The current unit of work was rolled back.
    PersistenceFailure,
    /// Everything else (config, I/O, serialization).
    Internal,
}

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    ObjectiveNotFound,
    HabitNotFound,
    TaskNotFound,

    // Validation (exit 4)
    InvalidInput,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ObjectiveNotFound => "OBJECTIVE_NOT_FOUND",
            Self::HabitNotFound => "HABIT_NOT_FOUND",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::InvalidInput => "INVALID_INPUT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::ObjectiveNotFound | Self::HabitNotFound | Self::TaskNotFound => 3,
            Self::InvalidInput => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Taxonomy bucket for this code.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ObjectiveNotFound | Self::HabitNotFound | Self::TaskNotFound => {
                ErrorCategory::NotFound
            }
            Self::InvalidInput => ErrorCategory::InvalidInput,
            Self::DatabaseError => ErrorCategory::PersistenceFailure,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::ConfigError
            | Self::IoError
            | Self::JsonError
            | Self::InternalError => ErrorCategory::Internal,
        }
    }

    /// Whether the caller may retry the whole mutation.
    ///
    /// Nothing is retried internally. Persistence failures (busy database,
    /// lock contention) are the only transient class.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in habitrack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `ht init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Objective not found: {id}")]
    ObjectiveNotFound { id: String },

    #[error("Objective not found: {id} (did you mean: {}?)", similar.join(", "))]
    ObjectiveNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("Habit not found: {id}")]
    HabitNotFound { id: String },

    #[error("Habit not found: {id} (did you mean: {}?)", similar.join(", "))]
    HabitNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    #[error("Task not found: {id} (did you mean: {}?)", similar.join(", "))]
    TaskNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        /// Closest valid value, when one exists.
        suggestion: Option<String>,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an `InvalidInput` error without a suggestion.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            suggestion: None,
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::ObjectiveNotFound { .. } | Self::ObjectiveNotFoundSimilar { .. } => {
                ErrorCode::ObjectiveNotFound
            }
            Self::HabitNotFound { .. } | Self::HabitNotFoundSimilar { .. } => {
                ErrorCode::HabitNotFound
            }
            Self::TaskNotFound { .. } | Self::TaskNotFoundSimilar { .. } => {
                ErrorCode::TaskNotFound
            }
            Self::InvalidInput { .. } => ErrorCode::InvalidInput,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Taxonomy bucket, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.error_code().category()
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `ht init` to initialize the database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::ObjectiveNotFound { id } => Some(format!(
                "No objective with ID '{id}' for this owner. Use `ht objective list` to see yours."
            )),

            Self::HabitNotFound { id } => Some(format!(
                "No habit with ID '{id}' for this owner. Use `ht habit list` to see yours."
            )),

            Self::TaskNotFound { id } => Some(format!(
                "No task with ID '{id}' for this owner. Use `ht task list` to see yours."
            )),

            Self::ObjectiveNotFoundSimilar { similar, .. }
            | Self::HabitNotFoundSimilar { similar, .. }
            | Self::TaskNotFoundSimilar { similar, .. } => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }

            Self::InvalidInput { suggestion, .. } => {
                suggestion.as_ref().map(|s| format!("Did you mean: {s}?"))
            }

            Self::Database(_) => {
                Some("The operation was rolled back. Retry the whole command.".to_string())
            }

            Self::Io(_) | Self::Json(_) | Self::Config(_) | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
