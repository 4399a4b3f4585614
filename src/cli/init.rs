//! Init command - write a neural.toml with the default settings

use anyhow::{Context, Result};
use console::style;
use neural_core::config::NeuralConfig;
use std::path::Path;

const CONFIG_HEADER: &str = "\
# Neural Core configuration
#
# Every key is optional; missing keys fall back to the values below.
# [tests] command = [\"pytest\", \"--json-report\"] enables real test runs.

";

/// Run the init command
pub fn run(path: &Path, force: bool) -> Result<()> {
    let root = super::resolve_root(path)?;
    let config_path = root.join("neural.toml");

    if config_path.exists() && !force {
        println!(
            "{} Already initialized at {} (use --force to overwrite)",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    let body = toml::to_string_pretty(&NeuralConfig::default())
        .context("Failed to serialize default config")?;
    std::fs::write(&config_path, format!("{}{}", CONFIG_HEADER, body))
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "\n  Next: {} to score once, or {} to keep watching\n",
        style("neural-core score").cyan(),
        style("neural-core watch").cyan()
    );
    Ok(())
}
