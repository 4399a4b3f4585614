//! Score command - one test run, one scoring pass

use anyhow::{Context, Result};
use neural_core::app::{AppContext, Collaborators};
use neural_core::config::load_project_config;
use std::path::Path;

pub fn run(path: &Path, explain: bool, json: bool) -> Result<()> {
    let root = super::resolve_root(path)?;
    let config = load_project_config(&root);
    let collaborators = Collaborators::from_config(&root, &config);
    let mut ctx = AppContext::init(&root, config, collaborators)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let status = runtime.block_on(ctx.run_once())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*status)?);
        return Ok(());
    }

    super::status::print_status(&status);
    if explain {
        if let Some(text) = ctx.explain_last() {
            println!("{}\n", text);
        }
    }
    Ok(())
}
