//! Weighted health scorer
//!
//! Turns a test outcome plus filesystem facts into a [`NeuralStatus`].
//! Pure: identical inputs produce identical output apart from the
//! caller-supplied timestamp.

use super::probe::ProbeFacts;
use crate::config::{ScoreWeights, ScoringConfig};
use crate::models::{
    clamp_percentage, clamp_unit, BrainRegion, Diagnostic, DiagnosticLevel, FileBucket, FileCounts,
    NeuralStatus, ProjectMetrics, RegionKey, RegionStatus, Regions, TestOutcome,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Documentation checklist points
const README_POINTS: f64 = 30.0;
const LICENSE_POINTS: f64 = 20.0;
const INSTRUCTIONS_POINTS: f64 = 20.0;
const API_SPEC_POINTS: f64 = 15.0;
const SETUP_GUIDE_POINTS: f64 = 15.0;

/// Module completion points
const FRONTEND_POINTS: f64 = 25.0;
const BACKEND_POINTS: f64 = 25.0;
const TEST_FILES_POINTS: f64 = 30.0;
const CONFIG_POINTS: f64 = 20.0;

/// Integration points
const API_CONFIGURED_POINTS: f64 = 50.0;
const POINTS_PER_PROVIDER: f64 = 15.0;
const MAX_PROVIDER_POINTS: f64 = 50.0;

/// Status and diagnostic thresholds
const HEALTHY_COVERAGE: f64 = 50.0;
const DOCS_HEALTHY: f64 = 80.0;
const DOCS_CAUTION: f64 = 60.0;
const INTEGRATION_HEALTHY: f64 = 50.0;
const INTEGRATION_CAUTION: f64 = 30.0;

/// Failed test names listed in the failing-tests diagnostic
const MAX_LISTED_FAILURES: usize = 5;

/// Everything one scoring pass consumes
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub outcome: &'a TestOutcome,
    pub counts: &'a FileCounts,
    pub facts: &'a ProbeFacts,
    /// Production readiness of the last persisted status
    pub production_ready: bool,
    pub timestamp: DateTime<Utc>,
}

pub struct HealthScorer {
    config: ScoringConfig,
    weights: ScoreWeights,
}

impl HealthScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let weights = config.effective_weights();
        Self { config, weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn documentation_score(&self, facts: &ProbeFacts) -> f64 {
        let mut score = 0.0;
        if facts
            .readme_bytes
            .is_some_and(|bytes| bytes > self.config.readme_min_bytes)
        {
            score += README_POINTS;
        }
        if facts.has_license {
            score += LICENSE_POINTS;
        }
        if facts.has_instructions {
            score += INSTRUCTIONS_POINTS;
        }
        if facts.has_api_spec {
            score += API_SPEC_POINTS;
        }
        if facts.has_setup_guide {
            score += SETUP_GUIDE_POINTS;
        }
        score.min(100.0)
    }

    pub fn module_completion(&self, counts: &FileCounts, facts: &ProbeFacts) -> f64 {
        let mut score = 0.0;
        if counts.frontend.files > 0 {
            score += FRONTEND_POINTS;
        }
        if counts.backend.files > 0 {
            score += BACKEND_POINTS;
        }
        if counts.tests.files > 0 {
            score += TEST_FILES_POINTS;
        }
        if facts.config_files_expected > 0 {
            let ratio = facts.config_files_present as f64 / facts.config_files_expected as f64;
            score += ratio.min(1.0) * CONFIG_POINTS;
        }
        score.min(100.0)
    }

    pub fn integration_score(&self, facts: &ProbeFacts) -> f64 {
        let mut score = 0.0;
        if facts.api_configured {
            score += API_CONFIGURED_POINTS;
        }
        score += (facts.mcp_providers as f64 * POINTS_PER_PROVIDER).min(MAX_PROVIDER_POINTS);
        score.min(100.0)
    }

    /// Sub-scores and the weighted overall health
    pub fn metrics(&self, input: &ScoreInput<'_>) -> ProjectMetrics {
        let test_coverage = clamp_percentage("test_coverage", input.outcome.coverage_percentage);
        let documentation_score =
            clamp_percentage("documentation_score", self.documentation_score(input.facts));
        let module_completion = clamp_percentage(
            "module_completion",
            self.module_completion(input.counts, input.facts),
        );
        let integration_score =
            clamp_percentage("integration_score", self.integration_score(input.facts));

        let w = &self.weights;
        let overall = w.coverage * test_coverage
            + w.documentation * documentation_score
            + w.modules * module_completion
            + w.integration * integration_score;

        ProjectMetrics {
            total_files: input.counts.total(),
            test_coverage,
            documentation_score,
            module_completion,
            integration_score,
            overall_health: clamp_percentage("overall_health", overall),
        }
    }

    /// Compute the full status for one cycle
    pub fn score(&self, input: &ScoreInput<'_>) -> NeuralStatus {
        let metrics = self.metrics(input);
        debug!(
            "Sub-scores: coverage={:.1}, docs={:.1}, modules={:.1}, integration={:.1}",
            metrics.test_coverage,
            metrics.documentation_score,
            metrics.module_completion,
            metrics.integration_score
        );

        let bonus = if input.production_ready {
            self.config.production_ready_bonus
        } else {
            0.0
        };
        // The bonus may push past 1.0 legitimately; only out-of-range leftovers are logged
        let illumination = clamp_unit(
            "illumination",
            ((metrics.overall_health + bonus) / 100.0).min(1.0),
        );

        let regions = Regions::from_fn(|key| self.build_region(key, input, &metrics));
        let diagnostics = self.diagnostics(input, &metrics);

        info!(
            "Health: overall={:.1}, illumination={:.3}, {} diagnostic(s)",
            metrics.overall_health,
            illumination,
            diagnostics.len()
        );

        NeuralStatus {
            illumination,
            regions,
            diagnostics,
            timestamp: input.timestamp,
            has_license: input.facts.has_license,
            has_readme: input.facts.readme_bytes.is_some(),
            documentation_complete: metrics.documentation_score >= DOCS_HEALTHY,
            api_configured: input.facts.api_configured,
            mcp_providers_count: input.facts.mcp_providers,
        }
    }

    fn build_region(&self, key: RegionKey, input: &ScoreInput<'_>, metrics: &ProjectMetrics) -> BrainRegion {
        let outcome = input.outcome;
        let coverage = metrics.test_coverage;
        match key {
            RegionKey::UiComponents => test_backed_region(&input.counts.frontend, outcome, coverage, false),
            RegionKey::CoreLogic => test_backed_region(&input.counts.backend, outcome, coverage, false),
            RegionKey::Tests => test_backed_region(&input.counts.tests, outcome, coverage, true),
            RegionKey::DataLayer => {
                let bucket = &input.counts.data;
                let present = bucket.files > 0;
                BrainRegion {
                    status: if present {
                        RegionStatus::Healthy
                    } else {
                        RegionStatus::Offline
                    },
                    coverage: if present { coverage } else { 0.0 },
                    file_count: bucket.files,
                    last_modified: bucket.latest_modified,
                    ..Default::default()
                }
            }
            RegionKey::Documentation => BrainRegion {
                status: if metrics.documentation_score >= DOCS_HEALTHY {
                    RegionStatus::Healthy
                } else {
                    RegionStatus::Warning
                },
                coverage: metrics.documentation_score,
                file_count: input.facts.markdown_files,
                ..Default::default()
            },
            RegionKey::ApiIntegration => BrainRegion {
                status: if metrics.integration_score >= INTEGRATION_HEALTHY {
                    RegionStatus::Healthy
                } else {
                    RegionStatus::Offline
                },
                coverage: metrics.integration_score,
                file_count: input.facts.mcp_providers,
                ..Default::default()
            },
        }
    }

    fn diagnostics(&self, input: &ScoreInput<'_>, metrics: &ProjectMetrics) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let outcome = input.outcome;
        let make = |level, region, message: String, details: Option<String>| Diagnostic {
            level,
            region: Some(region),
            message,
            details,
            timestamp: input.timestamp,
        };

        if outcome.failed > 0 {
            let details = if outcome.failed_tests.is_empty() {
                None
            } else {
                let names: Vec<&str> = outcome
                    .failed_tests
                    .iter()
                    .take(MAX_LISTED_FAILURES)
                    .map(|t| t.name.as_str())
                    .collect();
                Some(names.join(", "))
            };
            diagnostics.push(make(
                DiagnosticLevel::Alert,
                RegionKey::Tests,
                format!("ALERT: {} test(s) failing", outcome.failed),
                details,
            ));
        }

        if metrics.test_coverage < HEALTHY_COVERAGE {
            diagnostics.push(make(
                DiagnosticLevel::Caution,
                RegionKey::Tests,
                format!("CAUTION: Low test coverage ({:.1}%)", metrics.test_coverage),
                Some(format!("Coverage is below the {:.0}% threshold", HEALTHY_COVERAGE)),
            ));
        }

        if metrics.documentation_score < DOCS_CAUTION {
            diagnostics.push(make(
                DiagnosticLevel::Caution,
                RegionKey::Documentation,
                "CAUTION: Incomplete documentation".to_string(),
                Some(format!("Documentation score {:.0}/100", metrics.documentation_score)),
            ));
        }

        if metrics.integration_score < INTEGRATION_CAUTION {
            diagnostics.push(make(
                DiagnosticLevel::Caution,
                RegionKey::ApiIntegration,
                "CAUTION: API/MCP not configured".to_string(),
                Some(format!("Integration score {:.0}/100", metrics.integration_score)),
            ));
        }

        diagnostics
    }

    /// Human-readable breakdown of a scoring pass
    pub fn explain(&self, metrics: &ProjectMetrics, status: &NeuralStatus) -> String {
        let w = &self.weights;
        let mut lines = Vec::new();

        lines.push(format!("# Illumination: {:.3}\n", status.illumination));

        lines.push("## Scoring Formula\n".to_string());
        lines.push("```".to_string());
        lines.push(format!(
            "Overall = Coverage × {:.2} + Documentation × {:.2} + Modules × {:.2} + Integration × {:.2}",
            w.coverage, w.documentation, w.modules, w.integration
        ));
        lines.push(format!(
            "Illumination = min(1, (Overall + {:.0} if production ready) / 100)",
            self.config.production_ready_bonus
        ));
        lines.push("```\n".to_string());

        lines.push("## Sub-scores\n".to_string());
        lines.push(format!("- **Test coverage**: {:.1}", metrics.test_coverage));
        lines.push(format!("- **Documentation**: {:.1}", metrics.documentation_score));
        lines.push(format!("- **Module completion**: {:.1}", metrics.module_completion));
        lines.push(format!("- **Integration**: {:.1}", metrics.integration_score));
        lines.push(format!("- **Overall health**: {:.2}", metrics.overall_health));
        lines.push(format!("- **Files counted**: {}\n", metrics.total_files));

        lines.push("## Regions\n".to_string());
        for (key, region) in status.regions.iter() {
            lines.push(format!(
                "- {}: {} ({:.1}%, {} files)",
                key, region.status, region.coverage, region.file_count
            ));
        }

        lines.join("\n")
    }
}

/// Region whose status follows the run-level test outcome
fn test_backed_region(
    bucket: &FileBucket,
    outcome: &TestOutcome,
    coverage: f64,
    tests_region: bool,
) -> BrainRegion {
    // The tests region also counts as present when the runner reported tests
    let present = bucket.files > 0 || (tests_region && outcome.total_tests > 0);
    let status = if !present {
        RegionStatus::Offline
    } else if outcome.failed > 0 {
        RegionStatus::Error
    } else if coverage < HEALTHY_COVERAGE {
        RegionStatus::Warning
    } else {
        RegionStatus::Healthy
    };
    BrainRegion {
        status,
        coverage: if present || tests_region { coverage } else { 0.0 },
        test_count: outcome.total_tests,
        passing_tests: outcome.passed,
        failing_tests: outcome.failed,
        file_count: bucket.files,
        last_modified: bucket.latest_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailedTest;
    use chrono::TimeZone;

    fn make_bucket(files: u32) -> FileBucket {
        FileBucket {
            files,
            latest_modified: None,
        }
    }

    fn make_counts(files: u32) -> FileCounts {
        FileCounts {
            frontend: make_bucket(files),
            backend: make_bucket(files),
            tests: make_bucket(files),
            data: make_bucket(files),
        }
    }

    fn make_full_facts(providers: u32) -> ProbeFacts {
        ProbeFacts {
            readme_bytes: Some(2048),
            has_license: true,
            has_instructions: true,
            has_api_spec: true,
            has_setup_guide: true,
            config_files_present: 3,
            config_files_expected: 3,
            api_configured: true,
            mcp_providers: providers,
            markdown_files: 4,
        }
    }

    fn make_outcome(coverage: f64, failed: u32) -> TestOutcome {
        TestOutcome {
            total_tests: 20,
            passed: 20 - failed,
            failed,
            coverage_percentage: coverage,
            ..Default::default()
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn make_scorer() -> HealthScorer {
        HealthScorer::new(ScoringConfig::default())
    }

    #[test]
    fn test_fully_configured_project() {
        let scorer = make_scorer();
        let outcome = make_outcome(85.0, 0);
        let counts = make_counts(3);
        let facts = make_full_facts(2);
        let input = ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: true,
            timestamp: at(1_700_000_000),
        };

        let metrics = scorer.metrics(&input);
        assert_eq!(metrics.documentation_score, 100.0);
        assert_eq!(metrics.module_completion, 100.0);
        assert_eq!(metrics.integration_score, 80.0);
        assert!((metrics.overall_health - 81.75).abs() < 1e-9);

        let status = scorer.score(&input);
        assert!((status.illumination - 0.9175).abs() < 1e-9);
        assert!(status.diagnostics.is_empty(), "{:?}", status.diagnostics);
        assert!(status.documentation_complete);
        assert_eq!(status.mcp_providers_count, 2);
        assert_eq!(status.regions.tests.status, RegionStatus::Healthy);
        assert_eq!(status.regions.api_integration.status, RegionStatus::Healthy);
    }

    #[test]
    fn test_failing_tests_raise_alert() {
        let scorer = make_scorer();
        let mut outcome = make_outcome(80.0, 2);
        outcome.failed_tests = vec![
            FailedTest {
                name: "tests/test_a.py::test_one".to_string(),
                error: "assert 1 == 2".to_string(),
            },
            FailedTest {
                name: "tests/test_a.py::test_two".to_string(),
                error: "KeyError".to_string(),
            },
        ];
        let counts = make_counts(2);
        let facts = make_full_facts(2);
        let status = scorer.score(&ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(0),
        });

        let alerts: Vec<_> = status
            .diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Alert)
            .collect();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.contains('2'));
        assert!(alerts[0].message.contains("failing"));
        assert_eq!(alerts[0].region, Some(RegionKey::Tests));
        assert!(alerts[0].details.as_deref().unwrap().contains("test_two"));
        assert_eq!(status.regions.tests.status, RegionStatus::Error);
        assert_eq!(status.regions.tests.failing_tests, 2);
    }

    #[test]
    fn test_empty_project() {
        let scorer = make_scorer();
        let outcome = TestOutcome::default();
        let counts = FileCounts::default();
        let facts = ProbeFacts {
            config_files_expected: 3,
            ..Default::default()
        };
        let status = scorer.score(&ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(0),
        });

        assert_eq!(status.illumination, 0.0);
        assert!(!status.has_license);
        assert!(!status.has_readme);
        for (key, region) in status.regions.iter() {
            if key != RegionKey::Documentation {
                assert_eq!(region.status, RegionStatus::Offline, "{}", key);
            }
        }
        assert_eq!(status.regions.documentation.status, RegionStatus::Warning);
        let messages: Vec<_> = status.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages.contains(&"CAUTION: Incomplete documentation"));
        assert!(messages.contains(&"CAUTION: API/MCP not configured"));
    }

    #[test]
    fn test_pathological_inputs_are_clamped() {
        let scorer = make_scorer();
        let counts = make_counts(1);
        let facts = make_full_facts(10);

        for coverage in [-40.0, 250.0, f64::NAN, f64::INFINITY] {
            let outcome = make_outcome(coverage, 0);
            let status = scorer.score(&ScoreInput {
                outcome: &outcome,
                counts: &counts,
                facts: &facts,
                production_ready: true,
                timestamp: at(0),
            });
            assert!((0.0..=1.0).contains(&status.illumination));
            for (_, region) in status.regions.iter() {
                assert!((0.0..=100.0).contains(&region.coverage), "coverage {}", region.coverage);
            }
        }
    }

    #[test]
    fn test_deterministic_apart_from_timestamp() {
        let scorer = make_scorer();
        let outcome = make_outcome(64.0, 1);
        let counts = make_counts(2);
        let facts = make_full_facts(1);
        let input = ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(100),
        };

        let first = scorer.score(&input);
        let mut second = scorer.score(&ScoreInput {
            timestamp: at(200),
            ..input
        });
        assert_ne!(first.timestamp, second.timestamp);

        second.timestamp = first.timestamp;
        for diag in &mut second.diagnostics {
            diag.timestamp = first.timestamp;
        }
        assert_eq!(first, second);
    }

    #[test]
    fn test_region_gating_by_file_count() {
        let scorer = make_scorer();
        let outcome = make_outcome(90.0, 0);
        let counts = FileCounts {
            frontend: make_bucket(4),
            ..Default::default()
        };
        let facts = make_full_facts(0);
        let status = scorer.score(&ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(0),
        });

        assert_eq!(status.regions.ui_components.status, RegionStatus::Healthy);
        assert_eq!(status.regions.ui_components.coverage, 90.0);
        assert_eq!(status.regions.core_logic.status, RegionStatus::Offline);
        assert_eq!(status.regions.core_logic.coverage, 0.0);
        // Runner reported tests, so the tests region is live even without counted files
        assert_eq!(status.regions.tests.status, RegionStatus::Healthy);
        assert_eq!(status.regions.data_layer.status, RegionStatus::Offline);
    }

    #[test]
    fn test_low_coverage_warning() {
        let scorer = make_scorer();
        let outcome = make_outcome(35.0, 0);
        let counts = make_counts(1);
        let facts = make_full_facts(2);
        let status = scorer.score(&ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(0),
        });

        assert_eq!(status.regions.tests.status, RegionStatus::Warning);
        assert_eq!(status.diagnostics.len(), 1);
        assert_eq!(status.diagnostics[0].message, "CAUTION: Low test coverage (35.0%)");
    }

    #[test]
    fn test_readme_size_threshold() {
        let scorer = make_scorer();
        let small = ProbeFacts {
            readme_bytes: Some(500),
            ..Default::default()
        };
        let large = ProbeFacts {
            readme_bytes: Some(501),
            ..Default::default()
        };
        assert_eq!(scorer.documentation_score(&small), 0.0);
        assert_eq!(scorer.documentation_score(&large), 30.0);
    }

    #[test]
    fn test_provider_points_are_capped() {
        let scorer = make_scorer();
        let facts = ProbeFacts {
            mcp_providers: 9,
            ..Default::default()
        };
        assert_eq!(scorer.integration_score(&facts), 50.0);
    }

    #[test]
    fn test_normalized_weights_reach_full_score() {
        let mut config = ScoringConfig::default();
        config.normalize_weights = true;
        let scorer = HealthScorer::new(config);
        let outcome = make_outcome(100.0, 0);
        let counts = make_counts(1);
        let facts = ProbeFacts {
            mcp_providers: 4,
            ..make_full_facts(0)
        };

        let status = scorer.score(&ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(0),
        });
        assert!((status.illumination - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_explain_mentions_weights() {
        let scorer = make_scorer();
        let outcome = make_outcome(85.0, 0);
        let counts = make_counts(1);
        let facts = make_full_facts(2);
        let input = ScoreInput {
            outcome: &outcome,
            counts: &counts,
            facts: &facts,
            production_ready: false,
            timestamp: at(0),
        };
        let metrics = scorer.metrics(&input);
        let text = scorer.explain(&metrics, &scorer.score(&input));
        assert!(text.contains("Coverage × 0.35"));
        assert!(text.contains("ui-components"));
    }
}
