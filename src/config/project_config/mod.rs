//! Project-level configuration support
//!
//! Loads per-project configuration from `neural.toml` or `.neuralrc.json`
//! in the project root. Every field has a default, so partial files work.
//!
//! # Configuration Format
//!
//! ```toml
//! # neural.toml
//!
//! [watch]
//! directories = ["src", "tests", "neural_cli"]
//! debounce_ms = 1000
//!
//! [tests]
//! command = ["python", "-m", "pytest", "tests/"]
//! outcome_file = "test_results.json"
//! timeout_secs = 300
//!
//! [scoring]
//! normalize_weights = false
//! weights = { coverage = 0.35, documentation = 0.15, modules = 0.25, integration = 0.15 }
//!
//! [history]
//! max_snapshots = 10
//!
//! [regression]
//! illumination_drop = 0.10
//! region_coverage_drop = 10.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Directory names that never produce change events
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".pytest_cache",
    "__pycache__",
    "node_modules",
    ".coverage",
    ".venv",
    "venv",
    ".DS_Store",
    ".mypy_cache",
    ".ruff_cache",
    "dist",
    "build",
];

/// File extensions that never produce change events
pub const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &["pyc", "pyo", "pyd", "log"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Complete per-project configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NeuralConfig {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub tests: TestsConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub regression: RegressionConfig,
}

/// File watcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directories (relative to the project root) watched recursively
    #[serde(default = "default_watch_dirs")]
    pub directories: Vec<String>,

    /// Per-path debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long `stop` waits for queued events to drain
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Capacity of the watcher to event-loop channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    #[serde(default = "default_ignore_extensions")]
    pub ignore_extensions: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directories: default_watch_dirs(),
            debounce_ms: default_debounce_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            ignore_dirs: default_ignore_dirs(),
            ignore_extensions: default_ignore_extensions(),
        }
    }
}

impl WatchConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_watch_dirs() -> Vec<String> {
    strings(&["src", "tests", "neural_cli"])
}
fn default_debounce_ms() -> u64 {
    1000
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}
fn default_channel_capacity() -> usize {
    1024
}
fn default_ignore_dirs() -> Vec<String> {
    strings(DEFAULT_IGNORE_DIRS)
}
fn default_ignore_extensions() -> Vec<String> {
    strings(DEFAULT_IGNORE_EXTENSIONS)
}

/// Test-file classification and runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsConfig {
    /// Name of the designated tests directory
    #[serde(default = "default_tests_dir")]
    pub directory: String,

    #[serde(default = "default_test_prefix")]
    pub file_prefix: String,

    /// Extension of test sources, without the dot
    #[serde(default = "default_test_extension")]
    pub extension: String,

    /// Source trees whose changes trigger a run
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,

    /// Command used to run the suite (argv form); no command means no-op runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// JSON file the command writes its outcome to, relative to the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_file: Option<String>,

    #[serde(default = "default_test_timeout")]
    pub timeout_secs: u64,

    /// Trigger one run when the watcher starts
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            directory: default_tests_dir(),
            file_prefix: default_test_prefix(),
            extension: default_test_extension(),
            source_dirs: default_source_dirs(),
            command: None,
            outcome_file: None,
            timeout_secs: default_test_timeout(),
            run_on_start: true,
        }
    }
}

fn default_tests_dir() -> String {
    "tests".to_string()
}
fn default_test_prefix() -> String {
    "test_".to_string()
}
fn default_test_extension() -> String {
    "py".to_string()
}
fn default_source_dirs() -> Vec<String> {
    strings(&["src", "neural_cli"])
}
fn default_test_timeout() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

/// Scoring configuration for health calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,

    /// Rescale weights to sum to 1.0 instead of keeping the 0.90 ceiling
    #[serde(default)]
    pub normalize_weights: bool,

    #[serde(default = "default_production_bonus")]
    pub production_ready_bonus: f64,

    /// README must be strictly larger than this to count
    #[serde(default = "default_readme_min_bytes")]
    pub readme_min_bytes: u64,

    #[serde(default = "default_instructions_file")]
    pub instructions_file: String,

    #[serde(default = "default_setup_guides")]
    pub setup_guides: Vec<String>,

    #[serde(default = "default_config_checklist")]
    pub config_checklist: Vec<String>,

    #[serde(default = "default_api_env_vars")]
    pub api_env_vars: Vec<String>,

    #[serde(default = "default_mcp_config_files")]
    pub mcp_config_files: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            normalize_weights: false,
            production_ready_bonus: default_production_bonus(),
            readme_min_bytes: default_readme_min_bytes(),
            instructions_file: default_instructions_file(),
            setup_guides: default_setup_guides(),
            config_checklist: default_config_checklist(),
            api_env_vars: default_api_env_vars(),
            mcp_config_files: default_mcp_config_files(),
        }
    }
}

impl ScoringConfig {
    /// Weights actually applied by the scorer
    pub fn effective_weights(&self) -> ScoreWeights {
        let mut weights = self.weights.clone();
        if self.normalize_weights {
            weights.normalize();
        } else if weights.sum() > 1.0 + 0.001 {
            warn!(
                "Scoring weights sum to {:.2}, above 1.0; overall health may exceed 100 before clamping",
                weights.sum()
            );
        }
        weights
    }
}

fn default_production_bonus() -> f64 {
    10.0
}
fn default_readme_min_bytes() -> u64 {
    500
}
fn default_instructions_file() -> String {
    "CLAUDE.md".to_string()
}
fn default_setup_guides() -> Vec<String> {
    strings(&["SETUP.md", "QUICKSTART.md"])
}
fn default_config_checklist() -> Vec<String> {
    strings(&["package.json", "requirements.txt", "vite.config.ts"])
}
fn default_api_env_vars() -> Vec<String> {
    strings(&["GOOGLE_CLOUD_API_KEY", "VITE_API_URL"])
}
fn default_mcp_config_files() -> Vec<String> {
    strings(&[".gemini/settings.json", ".github/mcp-configuration.json"])
}

/// Sub-score weights for overall health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_coverage_weight")]
    pub coverage: f64,

    #[serde(default = "default_documentation_weight")]
    pub documentation: f64,

    #[serde(default = "default_modules_weight")]
    pub modules: f64,

    #[serde(default = "default_integration_weight")]
    pub integration: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            coverage: default_coverage_weight(),
            documentation: default_documentation_weight(),
            modules: default_modules_weight(),
            integration: default_integration_weight(),
        }
    }
}

fn default_coverage_weight() -> f64 {
    0.35
}
fn default_documentation_weight() -> f64 {
    0.15
}
fn default_modules_weight() -> f64 {
    0.25
}
fn default_integration_weight() -> f64 {
    0.15
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.coverage + self.documentation + self.modules + self.integration
    }

    /// Check that weights are non-negative and sum to 1.0
    pub fn is_valid(&self) -> bool {
        let all_positive =
            self.coverage >= 0.0 && self.documentation >= 0.0 && self.modules >= 0.0 && self.integration >= 0.0;
        all_positive && (self.sum() - 1.0).abs() < 0.001
    }

    /// Rescale weights so they sum to 1.0
    pub fn normalize(&mut self) {
        let total = self.sum();
        if total > 0.0 {
            self.coverage /= total;
            self.documentation /= total;
            self.modules /= total;
            self.integration /= total;
        }
    }
}

/// Where each region's files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: String,

    #[serde(default = "default_frontend_extensions")]
    pub frontend_extensions: Vec<String>,

    /// Schemas directory inside the frontend dir, counted as data
    #[serde(default = "default_schemas_dir")]
    pub schemas_dir: String,

    #[serde(default = "default_schema_extension")]
    pub schema_extension: String,

    #[serde(default = "default_backend_dir")]
    pub backend_dir: String,

    #[serde(default = "default_test_extension")]
    pub backend_extension: String,

    #[serde(default = "default_models_file")]
    pub models_file: String,

    /// Data files looked up in the project root
    #[serde(default = "default_data_files")]
    pub data_files: Vec<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            frontend_dir: default_frontend_dir(),
            frontend_extensions: default_frontend_extensions(),
            schemas_dir: default_schemas_dir(),
            schema_extension: default_schema_extension(),
            backend_dir: default_backend_dir(),
            backend_extension: default_test_extension(),
            models_file: default_models_file(),
            data_files: default_data_files(),
        }
    }
}

fn default_frontend_dir() -> String {
    "src".to_string()
}
fn default_frontend_extensions() -> Vec<String> {
    strings(&["ts", "tsx", "js", "jsx"])
}
fn default_schemas_dir() -> String {
    "schemas".to_string()
}
fn default_schema_extension() -> String {
    "ts".to_string()
}
fn default_backend_dir() -> String {
    "neural_cli".to_string()
}
fn default_models_file() -> String {
    "models.py".to_string()
}
fn default_data_files() -> Vec<String> {
    strings(&["neural_status.json", "test_results.json", "test_history.json"])
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    #[serde(default = "default_status_file")]
    pub status_file: String,

    #[serde(default = "default_history_file")]
    pub history_file: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
            status_file: default_status_file(),
            history_file: default_history_file(),
        }
    }
}

fn default_max_snapshots() -> usize {
    10
}
fn default_status_file() -> String {
    "neural_status.json".to_string()
}
fn default_history_file() -> String {
    "neural_history.json".to_string()
}

/// Thresholds for regression alerts and trends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    #[serde(default = "default_illumination_drop")]
    pub illumination_drop: f64,

    #[serde(default = "default_illumination_critical_drop")]
    pub illumination_critical_drop: f64,

    #[serde(default = "default_region_coverage_drop")]
    pub region_coverage_drop: f64,

    #[serde(default = "default_minor_coverage_drop")]
    pub minor_coverage_drop: f64,

    #[serde(default = "default_trend_min_points")]
    pub trend_min_points: usize,

    #[serde(default = "default_trend_unit_threshold")]
    pub trend_unit_threshold: f64,

    #[serde(default = "default_trend_percent_threshold")]
    pub trend_percent_threshold: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            illumination_drop: default_illumination_drop(),
            illumination_critical_drop: default_illumination_critical_drop(),
            region_coverage_drop: default_region_coverage_drop(),
            minor_coverage_drop: default_minor_coverage_drop(),
            trend_min_points: default_trend_min_points(),
            trend_unit_threshold: default_trend_unit_threshold(),
            trend_percent_threshold: default_trend_percent_threshold(),
        }
    }
}

fn default_illumination_drop() -> f64 {
    0.10
}
fn default_illumination_critical_drop() -> f64 {
    0.20
}
fn default_region_coverage_drop() -> f64 {
    10.0
}
fn default_minor_coverage_drop() -> f64 {
    2.0
}
fn default_trend_min_points() -> usize {
    3
}
fn default_trend_unit_threshold() -> f64 {
    0.05
}
fn default_trend_percent_threshold() -> f64 {
    5.0
}

/// Load project configuration from the project root
///
/// Searches for config files in order:
/// 1. `neural.toml`
/// 2. `.neuralrc.json`
///
/// Returns default config if no file is found or parsing fails.
pub fn load_project_config(project_root: &Path) -> NeuralConfig {
    let toml_path = project_root.join("neural.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = project_root.join(".neuralrc.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    NeuralConfig::default()
}

/// Load configuration from a TOML file
fn load_toml_config(path: &Path) -> anyhow::Result<NeuralConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: NeuralConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration from a JSON file
fn load_json_config(path: &Path) -> anyhow::Result<NeuralConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: NeuralConfig = serde_json::from_str(&content)?;
    Ok(config)
}
