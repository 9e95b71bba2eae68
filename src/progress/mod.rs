//! Progress propagation for habitrack.
//!
//! A task change or a logged occurrence walks upward: the habit's
//! progress is recomputed from its cycle counter, then the objective's
//! progress is recomputed as the mean of its habits.
//!
//! # Submodules
//!
//! - [`cycle`] - Habit cycle tracker (occurrence counter, habit progress)
//! - [`aggregate`] - Task status rule and full habit/objective recomputes
//! - [`engine`] - Public operations, one unit of work per level
//! - [`store`] - Persistence operations the engine consumes

pub mod aggregate;
pub mod cycle;
pub mod engine;
pub mod store;

pub use cycle::compute_progress;
pub use engine::{ProgressEngine, RecomputeSummary};
pub use store::ProgressStore;
