//! Test runner adapters
//!
//! [`CommandTestRunner`] shells out to the configured test command with a
//! hard timeout. Every failure mode is folded into a degraded
//! [`TestOutcome`] so nothing crosses the runner boundary as an error.

use crate::config::TestsConfig;
use crate::coordinator::TestRunner;
use crate::models::TestOutcome;
use crate::store::{read_json, remove_if_exists};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Build the runner described by the `[tests]` config section
pub fn runner_from_config(root: &Path, tests: &TestsConfig) -> Arc<dyn TestRunner> {
    match &tests.command {
        Some(command) if !command.is_empty() => Arc::new(CommandTestRunner {
            root: root.to_path_buf(),
            command: command.clone(),
            outcome_file: tests.outcome_file.as_ref().map(|f| root.join(f)),
            timeout: Duration::from_secs(tests.timeout_secs),
        }),
        _ => {
            debug!("No test command configured; test runs report empty outcomes");
            Arc::new(NoopTestRunner)
        }
    }
}

/// Runs nothing and reports an empty outcome
#[derive(Debug, Default)]
pub struct NoopTestRunner;

impl TestRunner for NoopTestRunner {
    fn run(&self, _path: Option<&Path>) -> TestOutcome {
        TestOutcome::default()
    }
}

/// Runs an external command and reads its outcome
#[derive(Debug, Clone)]
pub struct CommandTestRunner {
    pub root: PathBuf,
    /// argv; the first element is the program
    pub command: Vec<String>,
    /// JSON [`TestOutcome`] written by the command
    pub outcome_file: Option<PathBuf>,
    pub timeout: Duration,
}

impl TestRunner for CommandTestRunner {
    fn run(&self, path: Option<&Path>) -> TestOutcome {
        let Some((program, args)) = self.command.split_first() else {
            return TestOutcome::failure("empty test command");
        };

        if let Some(outcome_file) = &self.outcome_file {
            // A stale file from a previous run must not be mistaken for this one
            if let Err(e) = remove_if_exists(outcome_file) {
                warn!("Could not clear {}: {}", outcome_file.display(), e);
            }
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(path) = path {
            cmd.arg(path);
        }

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return TestOutcome::failure(format!("{} not found. Please install it first.", program));
            }
            Err(e) => return TestOutcome::failure(format!("Failed to run {}: {}", program, e)),
        };

        // Poll for completion with small sleep intervals
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        warn!("{} timed out after {}s", program, self.timeout.as_secs());
                        return TestOutcome {
                            failed: 1,
                            ..TestOutcome::failure(format!(
                                "Test run timed out after {}s",
                                self.timeout.as_secs()
                            ))
                        };
                    }
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return TestOutcome::failure(format!("Failed to wait for {}: {}", program, e));
                }
            }
        };
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(outcome_file) = &self.outcome_file {
            if let Some(mut outcome) = read_json::<TestOutcome>(outcome_file) {
                if outcome.duration_seconds == 0.0 {
                    outcome.duration_seconds = elapsed;
                }
                return outcome;
            }
            warn!("{} did not produce {}", program, outcome_file.display());
        }

        if status.success() {
            TestOutcome {
                duration_seconds: elapsed,
                ..Default::default()
            }
        } else {
            TestOutcome {
                duration_seconds: elapsed,
                ..TestOutcome::failure(format!("{} exited with {}", program, status))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_runner(root: &Path, command: &[&str], outcome_file: Option<&str>) -> CommandTestRunner {
        CommandTestRunner {
            root: root.to_path_buf(),
            command: command.iter().map(|s| s.to_string()).collect(),
            outcome_file: outcome_file.map(|f| root.join(f)),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_missing_program_is_degraded_outcome() {
        let dir = tempdir().unwrap();
        let runner = make_runner(dir.path(), &["definitely-not-a-real-test-tool"], None);
        let outcome = runner.run(None);
        assert_eq!(outcome.errors, 1);
        assert!(outcome.failed_tests[0].error.contains("not found"));
    }

    #[test]
    fn test_empty_command_is_degraded_outcome() {
        let dir = tempdir().unwrap();
        let runner = make_runner(dir.path(), &[], None);
        assert_eq!(runner.run(None).errors, 1);
    }

    #[test]
    fn test_noop_runner_from_default_config() {
        let dir = tempdir().unwrap();
        let runner = runner_from_config(dir.path(), &TestsConfig::default());
        assert_eq!(runner.run(None), TestOutcome::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_outcome_file() {
        let dir = tempdir().unwrap();
        let script = r#"echo '{"total_tests": 4, "passed": 3, "failed": 1, "coverage_percentage": 72.5}' > outcome.json"#;
        let runner = make_runner(dir.path(), &["sh", "-c", script], Some("outcome.json"));

        let outcome = runner.run(None);
        assert_eq!(outcome.total_tests, 4);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.coverage_percentage, 72.5);
        assert!(outcome.duration_seconds > 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_without_outcome_file() {
        let dir = tempdir().unwrap();
        assert_eq!(make_runner(dir.path(), &["true"], None).run(None).errors, 0);
        assert_eq!(make_runner(dir.path(), &["false"], None).run(None).errors, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_command() {
        let dir = tempdir().unwrap();
        let mut runner = make_runner(dir.path(), &["sleep", "5"], None);
        runner.timeout = Duration::from_millis(200);

        let started = Instant::now();
        let outcome = runner.run(None);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.failed, 1);
    }
}
