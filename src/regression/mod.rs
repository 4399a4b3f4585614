//! Regression tracking against a bounded history of snapshots
//!
//! Each recomputed status is compared with the most recent saved one.
//! Drops in illumination or coverage, worse region statuses and new test
//! failures become [`RegressionAlert`]s, which are folded into the status
//! as diagnostics before it is published.

use crate::config::RegressionConfig;
use crate::models::{Diagnostic, DiagnosticLevel, NeuralStatus, RegionKey};
use crate::store::{read_json, remove_if_exists, write_json, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Minor,
    Moderate,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Minor => write!(f, "minor"),
            AlertSeverity::Moderate => write!(f, "moderate"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Metric a regression was detected on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    Illumination,
    Coverage,
    Status,
    FailingTests,
}

impl fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertMetric::Illumination => write!(f, "illumination"),
            AlertMetric::Coverage => write!(f, "coverage"),
            AlertMetric::Status => write!(f, "status"),
            AlertMetric::FailingTests => write!(f, "failing_tests"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAlert {
    pub metric: AlertMetric,
    pub old_value: f64,
    pub new_value: f64,
    pub severity: AlertSeverity,
    pub message: String,
    /// `None` for project-wide metrics
    pub region: Option<RegionKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Degrading => write!(f, "degrading"),
        }
    }
}

/// Series a trend can be computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendMetric {
    /// Unit interval
    Illumination,
    /// Percentage, per region (the tests region when none is given)
    Coverage,
}

impl FromStr for TrendMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "illumination" => Ok(TrendMetric::Illumination),
            "coverage" => Ok(TrendMetric::Coverage),
            other => Err(format!(
                "unknown trend metric '{}' (expected illumination or coverage)",
                other
            )),
        }
    }
}

pub struct RegressionAnalyzer {
    path: PathBuf,
    max_history: usize,
    thresholds: RegressionConfig,
    history: VecDeque<NeuralStatus>,
}

impl RegressionAnalyzer {
    /// Load history from `path`; a missing or corrupt file starts empty
    pub fn load(path: impl Into<PathBuf>, max_history: usize, thresholds: RegressionConfig) -> Self {
        let path = path.into();
        let max_history = max_history.max(1);
        let mut history: VecDeque<NeuralStatus> = read_json(&path).unwrap_or_default();
        while history.len() > max_history {
            history.pop_front();
        }
        debug!("Loaded {} history snapshot(s) from {}", history.len(), path.display());
        Self {
            path,
            max_history,
            thresholds,
            history,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Retained snapshots, oldest first
    pub fn history(&self) -> &VecDeque<NeuralStatus> {
        &self.history
    }

    pub fn baseline(&self) -> Option<&NeuralStatus> {
        self.history.back()
    }

    /// Compare `current` with the latest snapshot. Empty without a baseline.
    pub fn detect_regressions(&self, current: &NeuralStatus) -> Vec<RegressionAlert> {
        let Some(last) = self.baseline() else {
            debug!("No baseline snapshot yet; skipping regression checks");
            return Vec::new();
        };
        let t = &self.thresholds;
        let mut alerts = Vec::new();

        let drop = last.illumination - current.illumination;
        if drop > t.illumination_drop {
            alerts.push(RegressionAlert {
                metric: AlertMetric::Illumination,
                old_value: last.illumination,
                new_value: current.illumination,
                severity: if drop > t.illumination_critical_drop {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Moderate
                },
                message: format!(
                    "Overall health dropped {:.1}% ({:.1}% → {:.1}%)",
                    drop * 100.0,
                    last.illumination * 100.0,
                    current.illumination * 100.0
                ),
                region: None,
            });
        }

        for (key, region) in current.regions.iter() {
            let before = last.regions.get(key);

            let coverage_drop = before.coverage - region.coverage;
            if coverage_drop > t.region_coverage_drop {
                alerts.push(RegressionAlert {
                    metric: AlertMetric::Coverage,
                    old_value: before.coverage,
                    new_value: region.coverage,
                    severity: AlertSeverity::Moderate,
                    message: format!(
                        "Coverage dropped {:.1}% in {} ({:.1}% → {:.1}%)",
                        coverage_drop, key, before.coverage, region.coverage
                    ),
                    region: Some(key),
                });
            } else if coverage_drop > t.minor_coverage_drop {
                alerts.push(RegressionAlert {
                    metric: AlertMetric::Coverage,
                    old_value: before.coverage,
                    new_value: region.coverage,
                    severity: AlertSeverity::Minor,
                    message: format!("Slight coverage drop in {}: {:.1}%", key, coverage_drop),
                    region: Some(key),
                });
            }

            if region.status.rank() < before.status.rank() {
                alerts.push(RegressionAlert {
                    metric: AlertMetric::Status,
                    old_value: f64::from(before.status.rank()),
                    new_value: f64::from(region.status.rank()),
                    severity: AlertSeverity::Moderate,
                    message: format!("Status degraded in {}: {} → {}", key, before.status, region.status),
                    region: Some(key),
                });
            }

            if region.failing_tests > before.failing_tests {
                alerts.push(RegressionAlert {
                    metric: AlertMetric::FailingTests,
                    old_value: f64::from(before.failing_tests),
                    new_value: f64::from(region.failing_tests),
                    severity: AlertSeverity::Critical,
                    message: format!(
                        "NEW TEST FAILURES in {}: {} test(s) now failing ({} → {})",
                        key,
                        region.failing_tests - before.failing_tests,
                        before.failing_tests,
                        region.failing_tests
                    ),
                    region: Some(key),
                });
            }
        }

        if !alerts.is_empty() {
            info!("Detected {} regression(s) against the last snapshot", alerts.len());
        }
        alerts
    }

    /// Append a snapshot, evicting the oldest past the cap, and persist
    pub fn save_snapshot(&mut self, status: &NeuralStatus) -> StoreResult<()> {
        self.history.push_back(status.clone());
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        write_json(&self.path, &self.history)
    }

    pub fn clear_history(&mut self) -> StoreResult<()> {
        self.history.clear();
        remove_if_exists(&self.path)?;
        info!("Cleared regression history");
        Ok(())
    }

    /// First-versus-last comparison over the retained window
    pub fn trend(&self, metric: TrendMetric, region: Option<RegionKey>) -> Trend {
        if self.history.len() < self.thresholds.trend_min_points.max(2) {
            return Trend::Stable;
        }
        let value = |status: &NeuralStatus| match metric {
            TrendMetric::Illumination => status.illumination,
            TrendMetric::Coverage => status.regions.get(region.unwrap_or(RegionKey::Tests)).coverage,
        };
        let threshold = match metric {
            TrendMetric::Illumination => self.thresholds.trend_unit_threshold,
            TrendMetric::Coverage => self.thresholds.trend_percent_threshold,
        };

        let (Some(first), Some(last)) = (self.history.front(), self.history.back()) else {
            return Trend::Stable;
        };
        let delta = value(last) - value(first);
        if delta > threshold {
            Trend::Improving
        } else if delta < -threshold {
            Trend::Degrading
        } else {
            Trend::Stable
        }
    }
}

/// Regression alerts as diagnostics: critical becomes an alert, everything else a caution
pub fn alerts_to_diagnostics(alerts: &[RegressionAlert], timestamp: DateTime<Utc>) -> Vec<Diagnostic> {
    alerts
        .iter()
        .map(|alert| Diagnostic {
            level: if alert.severity == AlertSeverity::Critical {
                DiagnosticLevel::Alert
            } else {
                DiagnosticLevel::Caution
            },
            region: alert.region,
            message: format!("REGRESSION: {}", alert.message),
            details: Some(format!(
                "{}: {:.2} → {:.2}",
                alert.metric, alert.old_value, alert.new_value
            )),
            timestamp,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionStatus;
    use tempfile::{tempdir, TempDir};

    fn make_analyzer(dir: &TempDir) -> RegressionAnalyzer {
        RegressionAnalyzer::load(
            dir.path().join("neural_history.json"),
            10,
            RegressionConfig::default(),
        )
    }

    fn make_status(illumination: f64, coverage: f64) -> NeuralStatus {
        let mut status = NeuralStatus {
            illumination,
            ..Default::default()
        };
        for key in [RegionKey::UiComponents, RegionKey::CoreLogic, RegionKey::Tests] {
            let region = status.regions.get_mut(key);
            region.coverage = coverage;
            region.status = RegionStatus::Healthy;
            region.test_count = 10;
            region.passing_tests = 10;
        }
        status
    }

    #[test]
    fn test_no_regression_without_baseline() {
        let dir = tempdir().unwrap();
        let analyzer = make_analyzer(&dir);
        assert!(analyzer.detect_regressions(&make_status(0.1, 0.0)).is_empty());
    }

    #[test]
    fn test_illumination_drop_moderate() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.85, 80.0)).unwrap();

        let alerts = analyzer.detect_regressions(&make_status(0.70, 80.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, AlertMetric::Illumination);
        assert_eq!(alerts[0].severity, AlertSeverity::Moderate);
        assert_eq!(alerts[0].region, None);
    }

    #[test]
    fn test_illumination_drop_critical() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.85, 80.0)).unwrap();

        let alerts = analyzer.detect_regressions(&make_status(0.60, 80.0));
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_small_illumination_drop_is_ignored() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.85, 80.0)).unwrap();
        assert!(analyzer.detect_regressions(&make_status(0.80, 80.0)).is_empty());
    }

    #[test]
    fn test_coverage_drop_severities() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.8, 85.0)).unwrap();

        let moderate = analyzer.detect_regressions(&make_status(0.8, 70.0));
        let coverage: Vec<_> = moderate
            .iter()
            .filter(|a| a.metric == AlertMetric::Coverage)
            .collect();
        assert_eq!(coverage.len(), 3);
        assert!(coverage.iter().all(|a| a.severity == AlertSeverity::Moderate));

        let minor = analyzer.detect_regressions(&make_status(0.8, 82.0));
        assert!(minor
            .iter()
            .all(|a| a.metric == AlertMetric::Coverage && a.severity == AlertSeverity::Minor));
        assert_eq!(minor.len(), 3);

        assert!(analyzer.detect_regressions(&make_status(0.8, 84.0)).is_empty());
    }

    #[test]
    fn test_configurable_thresholds() {
        let dir = tempdir().unwrap();
        let thresholds = RegressionConfig {
            region_coverage_drop: 15.0,
            minor_coverage_drop: 5.0,
            ..Default::default()
        };
        let mut analyzer =
            RegressionAnalyzer::load(dir.path().join("neural_history.json"), 10, thresholds);

        let mut baseline = NeuralStatus::default();
        baseline.regions.ui_components.coverage = 85.0;
        analyzer.save_snapshot(&baseline).unwrap();

        let mut current = NeuralStatus::default();
        current.regions.ui_components.coverage = 77.0;
        let alerts = analyzer.detect_regressions(&current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Minor);
    }

    #[test]
    fn test_status_degradation() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.8, 80.0)).unwrap();

        let mut current = make_status(0.8, 80.0);
        current.regions.core_logic.status = RegionStatus::Warning;
        let alerts = analyzer.detect_regressions(&current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, AlertMetric::Status);
        assert_eq!(alerts[0].region, Some(RegionKey::CoreLogic));
        assert_eq!(alerts[0].message, "Status degraded in core-logic: healthy → warning");
    }

    #[test]
    fn test_error_to_offline_is_flagged() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        let mut baseline = NeuralStatus::default();
        baseline.regions.tests.status = RegionStatus::Error;
        analyzer.save_snapshot(&baseline).unwrap();

        let mut current = NeuralStatus::default();
        current.regions.tests.status = RegionStatus::Offline;
        let alerts = analyzer.detect_regressions(&current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, AlertMetric::Status);

        // The reverse is an improvement under this ranking
        analyzer.save_snapshot(&current).unwrap();
        assert!(analyzer.detect_regressions(&baseline).is_empty());
    }

    #[test]
    fn test_new_failures_are_critical() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.8, 80.0)).unwrap();

        let mut current = make_status(0.8, 80.0);
        current.regions.tests.failing_tests = 2;
        let alerts = analyzer.detect_regressions(&current);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(
            alerts[0].message,
            "NEW TEST FAILURES in tests: 2 test(s) now failing (0 → 2)"
        );
    }

    #[test]
    fn test_improvement_yields_no_alerts() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        let mut baseline = make_status(0.6, 60.0);
        baseline.regions.tests.status = RegionStatus::Warning;
        baseline.regions.tests.failing_tests = 3;
        analyzer.save_snapshot(&baseline).unwrap();

        assert!(analyzer.detect_regressions(&make_status(0.9, 90.0)).is_empty());
        assert!(analyzer.detect_regressions(&baseline).is_empty());
    }

    #[test]
    fn test_history_is_capped_fifo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("neural_history.json");
        let mut analyzer = RegressionAnalyzer::load(&path, 3, RegressionConfig::default());

        for i in 0..7 {
            analyzer.save_snapshot(&make_status(i as f64 / 10.0, 0.0)).unwrap();
            assert!(analyzer.history().len() <= 3);
        }
        let kept: Vec<f64> = analyzer.history().iter().map(|s| s.illumination).collect();
        assert_eq!(kept, vec![0.4, 0.5, 0.6]);

        // Persisted copy matches and survives a reload
        let reloaded = RegressionAnalyzer::load(&path, 3, RegressionConfig::default());
        assert_eq!(reloaded.history().len(), 3);
        assert_eq!(reloaded.baseline().unwrap().illumination, 0.6);
    }

    #[test]
    fn test_reload_trims_to_smaller_cap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("neural_history.json");
        let mut analyzer = RegressionAnalyzer::load(&path, 10, RegressionConfig::default());
        for i in 0..5 {
            analyzer.save_snapshot(&make_status(i as f64 / 10.0, 0.0)).unwrap();
        }

        let smaller = RegressionAnalyzer::load(&path, 2, RegressionConfig::default());
        let kept: Vec<f64> = smaller.history().iter().map(|s| s.illumination).collect();
        assert_eq!(kept, vec![0.3, 0.4]);
    }

    #[test]
    fn test_corrupt_history_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("neural_history.json");
        std::fs::write(&path, "[{\"illumination\": ").unwrap();
        assert!(RegressionAnalyzer::load(&path, 10, RegressionConfig::default())
            .history()
            .is_empty());

        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(RegressionAnalyzer::load(&path, 10, RegressionConfig::default())
            .history()
            .is_empty());
    }

    #[test]
    fn test_clear_history() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.5, 50.0)).unwrap();
        assert!(analyzer.path().exists());

        analyzer.clear_history().unwrap();
        assert!(analyzer.history().is_empty());
        assert!(!analyzer.path().exists());
    }

    #[test]
    fn test_trends() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        for coverage in [50.0, 60.0, 70.0, 80.0, 90.0] {
            analyzer.save_snapshot(&make_status(0.5, coverage)).unwrap();
        }
        assert_eq!(analyzer.trend(TrendMetric::Coverage, None), Trend::Improving);
        assert_eq!(
            analyzer.trend(TrendMetric::Coverage, Some(RegionKey::UiComponents)),
            Trend::Improving
        );
        assert_eq!(
            analyzer.trend(TrendMetric::Coverage, Some(RegionKey::DataLayer)),
            Trend::Stable
        );
        assert_eq!(analyzer.trend(TrendMetric::Illumination, None), Trend::Stable);
    }

    #[test]
    fn test_trend_degrading_and_insufficient_data() {
        let dir = tempdir().unwrap();
        let mut analyzer = make_analyzer(&dir);
        analyzer.save_snapshot(&make_status(0.9, 0.0)).unwrap();
        analyzer.save_snapshot(&make_status(0.5, 0.0)).unwrap();
        assert_eq!(analyzer.trend(TrendMetric::Illumination, None), Trend::Stable);

        analyzer.save_snapshot(&make_status(0.7, 0.0)).unwrap();
        assert_eq!(analyzer.trend(TrendMetric::Illumination, None), Trend::Degrading);
    }

    #[test]
    fn test_alerts_to_diagnostics() {
        let alerts = vec![
            RegressionAlert {
                metric: AlertMetric::FailingTests,
                old_value: 0.0,
                new_value: 2.0,
                severity: AlertSeverity::Critical,
                message: "NEW TEST FAILURES in tests: 2 test(s) now failing (0 → 2)".to_string(),
                region: Some(RegionKey::Tests),
            },
            RegressionAlert {
                metric: AlertMetric::Illumination,
                old_value: 0.85,
                new_value: 0.7,
                severity: AlertSeverity::Moderate,
                message: "Overall health dropped 15.0% (85.0% → 70.0%)".to_string(),
                region: None,
            },
        ];
        let now = Utc::now();
        let diagnostics = alerts_to_diagnostics(&alerts, now);

        assert_eq!(diagnostics[0].level, DiagnosticLevel::Alert);
        assert!(diagnostics[0].message.starts_with("REGRESSION: "));
        assert_eq!(diagnostics[0].details.as_deref(), Some("failing_tests: 0.00 → 2.00"));
        assert_eq!(diagnostics[1].level, DiagnosticLevel::Caution);
        assert_eq!(diagnostics[1].region, None);
        assert_eq!(diagnostics[1].timestamp, now);
    }

    #[test]
    fn test_trend_metric_parsing() {
        assert_eq!("coverage".parse::<TrendMetric>(), Ok(TrendMetric::Coverage));
        assert!("latency".parse::<TrendMetric>().is_err());
    }
}
