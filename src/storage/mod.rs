//! SQLite storage layer for habitrack.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - Audit events for history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`migrations`] - Embedded SQL migrations
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use sqlite::{HabitFilter, MutationContext, ObjectiveFilter, SqliteStorage, TaskFilter};
