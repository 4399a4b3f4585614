//! CLI command definitions and handlers

mod clean;
mod history;
mod init;
mod score;
mod status;
mod watch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use neural_core::models::RegionKey;
use neural_core::regression::TrendMetric;
use std::path::{Path, PathBuf};

/// Neural Core - live project health
///
/// Watches a project, runs its tests when sources change, and scores overall
/// health into a single illumination value.
#[derive(Parser, Debug)]
#[command(name = "neural-core")]
#[command(
    version,
    about = "Live project health: debounced watching, single-flight test runs, weighted scoring and regression tracking",
    after_help = "\
Examples:
  neural-core                         Watch the current directory
  neural-core score --explain         One test run plus a scoring breakdown
  neural-core status --json           Last persisted status as JSON
  neural-core trend --metric coverage --region core-logic
  neural-core clean --dry-run         Show which state files would be removed"
)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(long, global = true, env = "NEURAL_PROJECT_ROOT", default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace); NEURAL_LOG overrides
    #[arg(long, global = true, env = "NEURAL_LOG_LEVEL", default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the project and rescore after every test run (default)
    Watch {
        /// Skip the initial test run
        #[arg(long)]
        no_initial_run: bool,
    },

    /// Run the tests once, score, persist and exit
    Score {
        /// Print the scoring breakdown
        #[arg(long)]
        explain: bool,

        /// Print the resulting status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the last persisted status
    Status {
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List retained history snapshots
    History {
        /// Only show the most recent N snapshots
        #[arg(long)]
        limit: Option<usize>,

        /// Delete the history file
        #[arg(long)]
        clear: bool,
    },

    /// Trend of a metric over the retained history
    Trend {
        /// illumination or coverage
        #[arg(long, default_value = "illumination", value_parser = parse_metric)]
        metric: TrendMetric,

        /// Region for coverage trends (default: tests)
        #[arg(long, value_parser = parse_region)]
        region: Option<RegionKey>,
    },

    /// Write a neural.toml with the default settings
    Init {
        /// Overwrite an existing neural.toml
        #[arg(long)]
        force: bool,
    },

    /// Remove persisted status and history files
    Clean {
        /// Show what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_metric(s: &str) -> Result<TrendMetric, String> {
    s.parse()
}

fn parse_region(s: &str) -> Result<RegionKey, String> {
    s.parse()
}

/// Canonical project root or a readable error
pub(crate) fn resolve_root(path: &Path) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }
    Ok(root)
}

/// Run the CLI command
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => watch::run(&cli.path, false),
        Some(Commands::Watch { no_initial_run }) => watch::run(&cli.path, no_initial_run),
        Some(Commands::Score { explain, json }) => score::run(&cli.path, explain, json),
        Some(Commands::Status { json }) => status::run(&cli.path, json),
        Some(Commands::History { limit, clear }) => history::run(&cli.path, limit, clear),
        Some(Commands::Trend { metric, region }) => history::trend(&cli.path, metric, region),
        Some(Commands::Init { force }) => init::run(&cli.path, force),
        Some(Commands::Clean { dry_run }) => clean::run(&cli.path, dry_run),
    }
}
