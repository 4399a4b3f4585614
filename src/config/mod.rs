//! Configuration module for neural-core
//!
//! This module handles:
//! - Project-level configuration (neural.toml / .neuralrc.json)
//! - Watcher, runner and layout settings
//! - Scoring weights and regression thresholds

mod project_config;

pub use project_config::{
    HistoryConfig,
    LayoutConfig,
    NeuralConfig,
    RegressionConfig,
    ScoreWeights,
    ScoringConfig,
    TestsConfig,
    WatchConfig,
    load_project_config,
    DEFAULT_IGNORE_DIRS,
    DEFAULT_IGNORE_EXTENSIONS,
};
