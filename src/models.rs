//! Core data models for neural-core
//!
//! These models are shared by the watcher, the scorer, the regression
//! analyzer and the persisted status files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Kind of filesystem change surfaced by the watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Moved => write!(f, "moved"),
        }
    }
}

/// A filtered, debounced file change.
///
/// Produced on the watcher thread and consumed once by the event loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub is_test_file: bool,
    pub observed_at: DateTime<Utc>,
}

/// One of the six fixed subsystems of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionKey {
    UiComponents,
    CoreLogic,
    DataLayer,
    Tests,
    Documentation,
    ApiIntegration,
}

impl RegionKey {
    pub const ALL: [RegionKey; 6] = [
        RegionKey::UiComponents,
        RegionKey::CoreLogic,
        RegionKey::DataLayer,
        RegionKey::Tests,
        RegionKey::Documentation,
        RegionKey::ApiIntegration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKey::UiComponents => "ui-components",
            RegionKey::CoreLogic => "core-logic",
            RegionKey::DataLayer => "data-layer",
            RegionKey::Tests => "tests",
            RegionKey::Documentation => "documentation",
            RegionKey::ApiIntegration => "api-integration",
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegionKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = RegionKey::ALL.iter().map(RegionKey::as_str).collect();
                format!("unknown region '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Health status of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    Healthy,
    Warning,
    Error,
    #[default]
    Offline,
}

impl RegionStatus {
    /// Ordering used for degradation checks (higher is healthier).
    ///
    /// Offline ranks below Error.
    pub fn rank(&self) -> u8 {
        match self {
            RegionStatus::Healthy => 3,
            RegionStatus::Warning => 2,
            RegionStatus::Error => 1,
            RegionStatus::Offline => 0,
        }
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionStatus::Healthy => write!(f, "healthy"),
            RegionStatus::Warning => write!(f, "warning"),
            RegionStatus::Error => write!(f, "error"),
            RegionStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Per-region health snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BrainRegion {
    #[serde(default)]
    pub status: RegionStatus,
    /// Coverage percentage (0-100)
    #[serde(default)]
    pub coverage: f64,
    #[serde(default)]
    pub test_count: u32,
    #[serde(default)]
    pub passing_tests: u32,
    #[serde(default)]
    pub failing_tests: u32,
    #[serde(default)]
    pub file_count: u32,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

/// The closed set of regions, one field per [`RegionKey`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Regions {
    #[serde(rename = "ui-components", default)]
    pub ui_components: BrainRegion,
    #[serde(rename = "core-logic", default)]
    pub core_logic: BrainRegion,
    #[serde(rename = "data-layer", default)]
    pub data_layer: BrainRegion,
    #[serde(default)]
    pub tests: BrainRegion,
    #[serde(default)]
    pub documentation: BrainRegion,
    #[serde(rename = "api-integration", default)]
    pub api_integration: BrainRegion,
}

impl Regions {
    /// Build every region from a constructor keyed by region
    pub fn from_fn(mut build: impl FnMut(RegionKey) -> BrainRegion) -> Self {
        Self {
            ui_components: build(RegionKey::UiComponents),
            core_logic: build(RegionKey::CoreLogic),
            data_layer: build(RegionKey::DataLayer),
            tests: build(RegionKey::Tests),
            documentation: build(RegionKey::Documentation),
            api_integration: build(RegionKey::ApiIntegration),
        }
    }

    pub fn get(&self, key: RegionKey) -> &BrainRegion {
        match key {
            RegionKey::UiComponents => &self.ui_components,
            RegionKey::CoreLogic => &self.core_logic,
            RegionKey::DataLayer => &self.data_layer,
            RegionKey::Tests => &self.tests,
            RegionKey::Documentation => &self.documentation,
            RegionKey::ApiIntegration => &self.api_integration,
        }
    }

    pub fn get_mut(&mut self, key: RegionKey) -> &mut BrainRegion {
        match key {
            RegionKey::UiComponents => &mut self.ui_components,
            RegionKey::CoreLogic => &mut self.core_logic,
            RegionKey::DataLayer => &mut self.data_layer,
            RegionKey::Tests => &mut self.tests,
            RegionKey::Documentation => &mut self.documentation,
            RegionKey::ApiIntegration => &mut self.api_integration,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionKey, &BrainRegion)> {
        RegionKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }
}

/// Diagnostic severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiagnosticLevel {
    Caution,
    Alert,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Caution => write!(f, "CAUTION"),
            DiagnosticLevel::Alert => write!(f, "ALERT"),
        }
    }
}

/// A health or regression diagnostic attached to a status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Region the diagnostic is about; `None` means the project as a whole
    #[serde(default)]
    pub region: Option<RegionKey>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Derived sub-scores, recomputed every cycle
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub total_files: u32,
    pub test_coverage: f64,
    pub documentation_score: f64,
    pub module_completion: f64,
    pub integration_score: f64,
    pub overall_health: f64,
}

/// Root health snapshot, persisted after every recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralStatus {
    #[serde(default)]
    pub illumination: f64,
    #[serde(default)]
    pub regions: Regions,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub has_license: bool,
    #[serde(default)]
    pub has_readme: bool,
    #[serde(default)]
    pub documentation_complete: bool,
    #[serde(default)]
    pub api_configured: bool,
    #[serde(default)]
    pub mcp_providers_count: u32,
}

impl Default for NeuralStatus {
    fn default() -> Self {
        Self {
            illumination: 0.0,
            regions: Regions::default(),
            diagnostics: Vec::new(),
            timestamp: Utc::now(),
            has_license: false,
            has_readme: false,
            documentation_complete: false,
            api_configured: false,
            mcp_providers_count: 0,
        }
    }
}

impl NeuralStatus {
    /// At least one test exists across regions and none are failing
    pub fn is_production_ready(&self) -> bool {
        let mut total = 0u64;
        for (_, region) in self.regions.iter() {
            if region.failing_tests > 0 {
                return false;
            }
            total += u64::from(region.test_count);
        }
        total > 0
    }

    pub fn alert_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Alert)
            .count()
    }
}

/// A single failed test reported by the runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTest {
    pub name: String,
    #[serde(default)]
    pub error: String,
}

/// Result of one external test run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TestOutcome {
    #[serde(default)]
    pub total_tests: u32,
    #[serde(default)]
    pub passed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default)]
    pub errors: u32,
    #[serde(default)]
    pub coverage_percentage: f64,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub failed_tests: Vec<FailedTest>,
}

impl TestOutcome {
    /// Degraded outcome used when the runner itself could not produce a result
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            errors: 1,
            failed_tests: vec![FailedTest {
                name: "test-runner".to_string(),
                error: reason.into(),
            }],
            ..Default::default()
        }
    }
}

/// Files counted in one bucket of the project tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileBucket {
    pub files: u32,
    pub latest_modified: Option<DateTime<Utc>>,
}

impl FileBucket {
    pub fn record(&mut self, modified: Option<DateTime<Utc>>) {
        self.files += 1;
        if let Some(ts) = modified {
            self.latest_modified = Some(self.latest_modified.map_or(ts, |cur| cur.max(ts)));
        }
    }
}

/// File counts per region bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileCounts {
    pub frontend: FileBucket,
    pub backend: FileBucket,
    pub tests: FileBucket,
    pub data: FileBucket,
}

impl FileCounts {
    pub fn total(&self) -> u32 {
        self.frontend.files + self.backend.files + self.tests.files + self.data.files
    }
}

/// Clamp a percentage into [0, 100], logging any correction.
///
/// NaN is treated as 0.
pub fn clamp_percentage(field: &str, value: f64) -> f64 {
    clamp_logged(field, value, 100.0)
}

/// Clamp a unit-interval value into [0, 1], logging any correction.
pub fn clamp_unit(field: &str, value: f64) -> f64 {
    clamp_logged(field, value, 1.0)
}

fn clamp_logged(field: &str, value: f64, max: f64) -> f64 {
    if value.is_nan() {
        warn!("{} is NaN, clamping to 0.0; check the upstream calculation", field);
        return 0.0;
    }
    if value < 0.0 {
        warn!("{}={:.2} is below 0.0, clamping to 0.0; check the upstream calculation", field, value);
        return 0.0;
    }
    if value > max {
        warn!(
            "{}={:.2} exceeds {:.1}, clamping to {:.1}; check the upstream calculation",
            field, value, max, max
        );
        return max;
    }
    value
}
