//! Status command - show the last persisted status

use anyhow::{Context, Result};
use console::style;
use neural_core::config::load_project_config;
use neural_core::models::{DiagnosticLevel, NeuralStatus, RegionStatus};
use neural_core::store::StatusStore;
use std::path::Path;

/// Run the status command
pub fn run(path: &Path, json: bool) -> Result<()> {
    let root = super::resolve_root(path)?;
    let config = load_project_config(&root);
    let store = StatusStore::new(root.join(&config.history.status_file));

    if !store.path().exists() {
        if json {
            println!("{}", serde_json::to_string_pretty(&NeuralStatus::default())?);
        } else {
            println!(
                "\n  {} No status yet. Run {}\n",
                style("[--]").dim(),
                style("neural-core score").cyan()
            );
        }
        return Ok(());
    }

    let status = store.load();
    if json {
        let out = serde_json::to_string_pretty(&status).context("Failed to serialize status")?;
        println!("{}", out);
        return Ok(());
    }

    println!("\nNeural Status\n");
    println!("  Project: {}", style(root.display()).cyan());
    println!("  File:    {}", style(store.path().display()).dim());
    print_status(&status);
    Ok(())
}

/// Human-readable summary shared by the watch, score and status commands
pub(crate) fn print_status(status: &NeuralStatus) {
    let pct = status.illumination * 100.0;
    let illumination = if pct >= 80.0 {
        style(format!("{:.1}%", pct)).green().bold()
    } else if pct >= 50.0 {
        style(format!("{:.1}%", pct)).yellow().bold()
    } else {
        style(format!("{:.1}%", pct)).red().bold()
    };

    println!();
    println!(
        "  Illumination: {}  ({})",
        illumination,
        style(status.timestamp.format("%Y-%m-%d %H:%M:%S UTC")).dim()
    );
    if status.is_production_ready() {
        println!("  {} Production ready", style("[OK]").green());
    }
    println!();

    for (key, region) in status.regions.iter() {
        let marker = match region.status {
            RegionStatus::Healthy => style("●").green(),
            RegionStatus::Warning => style("●").yellow(),
            RegionStatus::Error => style("●").red(),
            RegionStatus::Offline => style("○").dim(),
        };
        let tests = if region.test_count > 0 {
            format!(", {}/{} passing", region.passing_tests, region.test_count)
        } else {
            String::new()
        };
        println!(
            "  {} {:<16} {:<8} {:>5.1}%  {} file(s){}",
            marker,
            key.as_str(),
            region.status.to_string(),
            region.coverage,
            region.file_count,
            tests
        );
    }

    if !status.diagnostics.is_empty() {
        println!();
        for diag in &status.diagnostics {
            let level = match diag.level {
                DiagnosticLevel::Alert => style("ALERT  ").red().bold(),
                DiagnosticLevel::Caution => style("CAUTION").yellow(),
            };
            println!("  {} {}", level, diag.message);
            if let Some(details) = &diag.details {
                println!("          {}", style(details).dim());
            }
        }
    }
    println!();
}
