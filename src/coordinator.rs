//! Single-flight gate around the external test runner
//!
//! At most one run is in flight. A request made while a run is active is
//! rejected, not queued.

use crate::config::TestsConfig;
use crate::models::{ChangeEvent, TestOutcome};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Executes the project's test suite.
///
/// Implementations must not panic or surface errors: internal failures
/// (timeout, crash, missing tooling) are reported as an outcome with
/// `errors >= 1`.
pub trait TestRunner: Send + Sync {
    fn run(&self, path: Option<&Path>) -> TestOutcome;
}

/// What asked for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    FileChange,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => write!(f, "manual"),
            Trigger::FileChange => write!(f, "file change"),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Tests already running")]
    AlreadyRunning,
}

/// A run that has been started and not yet collected
pub struct PendingRun {
    trigger: Trigger,
    started: Instant,
    handle: JoinHandle<TestOutcome>,
}

impl PendingRun {
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wait for the runner. A panicked runner becomes a degraded outcome.
    pub async fn wait(&mut self) -> TestOutcome {
        match (&mut self.handle).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Test runner task failed: {}", e);
                TestOutcome::failure(format!("test runner task failed: {}", e))
            }
        }
    }
}

pub struct TestRunCoordinator {
    runner: Arc<dyn TestRunner>,
    root: PathBuf,
    trigger_dirs: Vec<PathBuf>,
    running: bool,
    runs_started: u64,
}

impl TestRunCoordinator {
    pub fn new(runner: Arc<dyn TestRunner>, root: &Path, tests: &TestsConfig) -> Self {
        Self {
            runner,
            root: root.to_path_buf(),
            trigger_dirs: tests.source_dirs.iter().map(PathBuf::from).collect(),
            running: false,
            runs_started: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    /// Test files always warrant a run; otherwise only paths under a source tree do
    pub fn should_run(&self, event: &ChangeEvent) -> bool {
        if event.is_test_file {
            return true;
        }
        let relative = event.path.strip_prefix(&self.root).unwrap_or(&event.path);
        self.trigger_dirs.iter().any(|dir| relative.starts_with(dir))
    }

    /// Start a run on the blocking pool, or reject if one is in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_run(&mut self, trigger: Trigger) -> Result<PendingRun, CoordinatorError> {
        if self.running {
            info!("Test run requested ({}) while another is in flight; skipping", trigger);
            return Err(CoordinatorError::AlreadyRunning);
        }

        self.running = true;
        self.runs_started += 1;
        info!("Starting test run #{} ({})", self.runs_started, trigger);

        let runner = Arc::clone(&self.runner);
        let handle = tokio::task::spawn_blocking(move || runner.run(None));
        Ok(PendingRun {
            trigger,
            started: Instant::now(),
            handle,
        })
    }

    /// Clear the running flag once a run's outcome has been collected
    pub fn finish(&mut self, run: &PendingRun, outcome: &TestOutcome) {
        self.running = false;
        if outcome.errors > 0 {
            warn!(
                "Test run ({}) finished with {} error(s) after {:.1}s",
                run.trigger,
                outcome.errors,
                run.elapsed().as_secs_f64()
            );
        } else {
            info!(
                "Test run ({}) finished: {} passed, {} failed, {:.1}% coverage in {:.1}s",
                run.trigger,
                outcome.passed,
                outcome.failed,
                outcome.coverage_percentage,
                run.elapsed().as_secs_f64()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeKind;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Blocks until released, counting invocations
    struct GatedRunner {
        calls: AtomicUsize,
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl TestRunner for GatedRunner {
        fn run(&self, _path: Option<&Path>) -> TestOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.lock().unwrap().recv();
            TestOutcome {
                total_tests: 3,
                passed: 3,
                coverage_percentage: 70.0,
                ..Default::default()
            }
        }
    }

    struct PanickingRunner;

    impl TestRunner for PanickingRunner {
        fn run(&self, _path: Option<&Path>) -> TestOutcome {
            panic!("runner blew up");
        }
    }

    fn make_event(root: &Path, rel: &str, is_test_file: bool) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Modified,
            path: root.join(rel),
            is_test_file,
            observed_at: Utc::now(),
        }
    }

    fn make_coordinator(runner: Arc<dyn TestRunner>) -> TestRunCoordinator {
        TestRunCoordinator::new(runner, Path::new("/project"), &TestsConfig::default())
    }

    #[test]
    fn test_run_decision() {
        let coordinator = make_coordinator(Arc::new(PanickingRunner));
        let root = Path::new("/project");

        assert!(coordinator.should_run(&make_event(root, "tests/test_api.py", true)));
        assert!(coordinator.should_run(&make_event(root, "src/components/App.tsx", false)));
        assert!(coordinator.should_run(&make_event(root, "neural_cli/scorer.py", false)));
        assert!(!coordinator.should_run(&make_event(root, "README.md", false)));
        assert!(!coordinator.should_run(&make_event(root, "docs/setup.md", false)));
        assert!(!coordinator.should_run(&make_event(root, "tests/conftest.py", false)));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let (release, gate) = std::sync::mpsc::channel();
        let runner = Arc::new(GatedRunner {
            calls: AtomicUsize::new(0),
            gate: Mutex::new(gate),
        });
        let mut coordinator = make_coordinator(runner.clone());
        assert!(!coordinator.is_running());

        let mut first = coordinator.request_run(Trigger::Manual).unwrap();
        assert!(coordinator.is_running());

        let second = coordinator.request_run(Trigger::FileChange);
        assert_eq!(second.err(), Some(CoordinatorError::AlreadyRunning));
        assert!(coordinator.is_running());

        release.send(()).unwrap();
        let outcome = first.wait().await;
        coordinator.finish(&first, &outcome);

        assert!(!coordinator.is_running());
        assert_eq!(outcome.passed, 3);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.runs_started(), 1);

        // The gate reopens after completion
        release.send(()).unwrap();
        let mut third = coordinator.request_run(Trigger::Manual).unwrap();
        let outcome = third.wait().await;
        coordinator.finish(&third, &outcome);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_runner_yields_degraded_outcome() {
        let mut coordinator = make_coordinator(Arc::new(PanickingRunner));
        let mut run = coordinator.request_run(Trigger::Manual).unwrap();
        let outcome = run.wait().await;
        coordinator.finish(&run, &outcome);

        assert_eq!(outcome.errors, 1);
        assert!(!coordinator.is_running());
    }
}
