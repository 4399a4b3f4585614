//! History and trend commands

use anyhow::{Context, Result};
use console::style;
use neural_core::config::{load_project_config, NeuralConfig};
use neural_core::models::RegionKey;
use neural_core::regression::{RegressionAnalyzer, Trend, TrendMetric};
use std::path::Path;

fn load_analyzer(root: &Path, config: &NeuralConfig) -> RegressionAnalyzer {
    RegressionAnalyzer::load(
        root.join(&config.history.history_file),
        config.history.max_snapshots,
        config.regression.clone(),
    )
}

pub fn run(path: &Path, limit: Option<usize>, clear: bool) -> Result<()> {
    let root = super::resolve_root(path)?;
    let config = load_project_config(&root);
    let mut analyzer = load_analyzer(&root, &config);

    if clear {
        let count = analyzer.history().len();
        analyzer
            .clear_history()
            .with_context(|| format!("Failed to clear {}", analyzer.path().display()))?;
        println!("Cleared {} snapshot(s).", count);
        return Ok(());
    }

    let history = analyzer.history();
    if history.is_empty() {
        println!(
            "\n  {} No history yet. Run {}\n",
            style("[--]").dim(),
            style("neural-core score").cyan()
        );
        return Ok(());
    }

    let skip = limit.map_or(0, |n| history.len().saturating_sub(n));
    println!(
        "\nHistory ({} of {} snapshot(s), newest last)\n",
        history.len() - skip,
        history.len()
    );
    for (i, status) in history.iter().enumerate().skip(skip) {
        let tests = &status.regions.tests;
        println!(
            "  {:>3}  {}  illumination {:>5.1}%  tests {:>5.1}%  {} failing  {} alert(s)",
            i + 1,
            style(status.timestamp.format("%Y-%m-%d %H:%M:%S")).dim(),
            status.illumination * 100.0,
            tests.coverage,
            tests.failing_tests,
            status.alert_count()
        );
    }
    println!();
    Ok(())
}

pub fn trend(path: &Path, metric: TrendMetric, region: Option<RegionKey>) -> Result<()> {
    let root = super::resolve_root(path)?;
    let config = load_project_config(&root);
    let analyzer = load_analyzer(&root, &config);

    let label = match metric {
        TrendMetric::Illumination => "illumination".to_string(),
        TrendMetric::Coverage => format!("coverage ({})", region.unwrap_or(RegionKey::Tests)),
    };
    let trend = analyzer.trend(metric, region);
    let shown = match trend {
        Trend::Improving => style(trend.to_string()).green(),
        Trend::Stable => style(trend.to_string()).dim(),
        Trend::Degrading => style(trend.to_string()).red(),
    };
    println!(
        "{}: {} over {} snapshot(s)",
        label,
        shown,
        analyzer.history().len()
    );
    Ok(())
}
