//! Neural Core CLI
//!
//! Live project-health monitoring: watch, test, score, track regressions.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // NEURAL_LOG takes a full filter directive; --log-level is the fallback
    let filter = EnvFilter::try_from_env("NEURAL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("neural_core={}", cli.log_level)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run(cli)
}
