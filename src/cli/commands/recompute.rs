//! Recompute-all command implementation.

use crate::cli::commands::{dry_run, open_storage, resolve_owner};
use crate::error::Result;
use crate::progress::ProgressEngine;
use std::path::PathBuf;

/// Rebuild every habit and objective progress value for the owner.
///
/// # Errors
///
/// Returns the first persistence failure. Entities recomputed before it
/// stay committed.
pub fn execute(db_path: Option<&PathBuf>, owner: Option<&str>, json: bool) -> Result<()> {
    let owner = resolve_owner(owner);

    if dry_run("recompute_all", None, &format!("recompute all progress for {owner}"), json) {
        return Ok(());
    }

    let mut storage = open_storage(db_path)?;
    let summary = ProgressEngine::new(&mut storage).recompute_all(&owner)?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else if !crate::is_silent() {
        println!(
            "Recomputed {} habit(s) and {} objective(s) for {owner}",
            summary.habits, summary.objectives
        );
    }

    Ok(())
}
