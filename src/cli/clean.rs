//! Clean command - remove persisted status and history

use anyhow::{Context, Result};
use neural_core::config::load_project_config;
use neural_core::store::remove_if_exists;
use std::path::Path;

pub fn run(path: &Path, dry_run: bool) -> Result<()> {
    let root = super::resolve_root(path)?;
    let config = load_project_config(&root);

    let found: Vec<_> = [&config.history.status_file, &config.history.history_file]
        .into_iter()
        .map(|name| root.join(name))
        .filter(|p| p.exists())
        .collect();

    if found.is_empty() {
        println!("No neural state files found.");
        return Ok(());
    }

    println!("Found {} state file{}:", found.len(), if found.len() == 1 { "" } else { "s" });
    for file in &found {
        println!("  {}", file.display());
    }

    if dry_run {
        println!("\nDry run - nothing removed. Run without --dry-run to delete.");
        return Ok(());
    }

    println!();
    for file in &found {
        remove_if_exists(file).with_context(|| format!("Failed to remove {}", file.display()))?;
        println!("Removed: {}", file.display());
    }
    Ok(())
}
