//! Application context and event loop
//!
//! [`AppContext`] owns every piece of mutable state: the running flag (via
//! the coordinator), the current status and the regression history. It is
//! driven by a single `tokio::select!` loop that consumes watcher events,
//! control commands, test-run completions and the shutdown token.

use crate::config::NeuralConfig;
use crate::coordinator::{CoordinatorError, PendingRun, TestRunCoordinator, TestRunner, Trigger};
use crate::models::{ChangeEvent, NeuralStatus, ProjectMetrics, TestOutcome};
use crate::publisher::{LogPublisher, StatusPublisher};
use crate::regression::{alerts_to_diagnostics, RegressionAnalyzer};
use crate::runner::runner_from_config;
use crate::scoring::{FilesystemProbe, HealthScorer, ProjectProbe, ScoreInput};
use crate::store::StatusStore;
use crate::watcher::FileChangeWatcher;
use anyhow::{Context, Result};
use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the control-command channel
const COMMAND_CAPACITY: usize = 32;

/// Callback for raw change notifications
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) -> Result<()> + Send>;

/// External pieces the context drives
pub struct Collaborators {
    pub runner: Arc<dyn TestRunner>,
    pub probe: Box<dyn FilesystemProbe>,
    pub publishers: Vec<Box<dyn StatusPublisher>>,
}

impl Collaborators {
    /// Real runner, probe and a logging publisher, as configured
    pub fn from_config(root: &Path, config: &NeuralConfig) -> Self {
        Self {
            runner: runner_from_config(root, &config.tests),
            probe: Box::new(ProjectProbe::new(root, config)),
            publishers: vec![Box::new(LogPublisher)],
        }
    }
}

/// Errors returned to [`AppHandle`] callers
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("Event loop is not running")]
    Closed,
}

enum Command {
    RunTests(oneshot::Sender<Result<(), CoordinatorError>>),
    Status(oneshot::Sender<Arc<NeuralStatus>>),
}

/// Cloneable handle for talking to a running event loop
#[derive(Clone)]
pub struct AppHandle {
    commands: mpsc::Sender<Command>,
    shutdown: CancellationToken,
}

impl AppHandle {
    /// Ask for a manual run; `AlreadyRunning` if one is in flight
    pub async fn request_run(&self) -> Result<(), RequestError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::RunTests(tx))
            .await
            .map_err(|_| RequestError::Closed)?;
        rx.await.map_err(|_| RequestError::Closed)?.map_err(RequestError::from)
    }

    /// Latest status snapshot
    pub async fn status(&self) -> Result<Arc<NeuralStatus>, RequestError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Status(tx))
            .await
            .map_err(|_| RequestError::Closed)?;
        rx.await.map_err(|_| RequestError::Closed)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

enum Step {
    Change(ChangeEvent),
    Command(Command),
    Completed(TestOutcome),
    Shutdown,
}

pub struct AppContext {
    root: PathBuf,
    config: NeuralConfig,
    store: StatusStore,
    scorer: HealthScorer,
    analyzer: RegressionAnalyzer,
    coordinator: TestRunCoordinator,
    probe: Box<dyn FilesystemProbe>,
    publishers: Vec<Box<dyn StatusPublisher>>,
    listeners: Vec<ChangeListener>,
    watcher: FileChangeWatcher,
    current: Arc<NeuralStatus>,
    last_metrics: Option<ProjectMetrics>,
    events_rx: mpsc::Receiver<ChangeEvent>,
    commands_tx: mpsc::Sender<Command>,
    commands_rx: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
    in_flight: Option<PendingRun>,
    accepting: bool,
}

impl AppContext {
    /// Load persisted state and wire up the components. Nothing runs yet.
    pub fn init(root: &Path, config: NeuralConfig, collaborators: Collaborators) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Project root does not exist: {}", root.display()))?;

        let store = StatusStore::new(root.join(&config.history.status_file));
        let current = Arc::new(store.load());
        let analyzer = RegressionAnalyzer::load(
            root.join(&config.history.history_file),
            config.history.max_snapshots,
            config.regression.clone(),
        );

        let (events_tx, events_rx) = mpsc::channel(config.watch.channel_capacity.max(1));
        let watcher = FileChangeWatcher::new(&root, &config.watch, &config.tests, events_tx);
        let coordinator = TestRunCoordinator::new(collaborators.runner, &root, &config.tests);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);

        info!(
            "Initialized neural core for {} (illumination {:.3}, {} snapshot(s))",
            root.display(),
            current.illumination,
            analyzer.history().len()
        );

        Ok(Self {
            scorer: HealthScorer::new(config.scoring.clone()),
            root,
            config,
            store,
            analyzer,
            coordinator,
            probe: collaborators.probe,
            publishers: collaborators.publishers,
            listeners: Vec::new(),
            watcher,
            current,
            last_metrics: None,
            events_rx,
            commands_tx,
            commands_rx,
            shutdown: CancellationToken::new(),
            in_flight: None,
            accepting: true,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn handle(&self) -> AppHandle {
        AppHandle {
            commands: self.commands_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Register a callback for every delivered change event
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: Fn(&ChangeEvent) -> Result<()> + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn current_status(&self) -> Arc<NeuralStatus> {
        Arc::clone(&self.current)
    }

    pub fn analyzer(&self) -> &RegressionAnalyzer {
        &self.analyzer
    }

    pub fn watcher_mut(&mut self) -> &mut FileChangeWatcher {
        &mut self.watcher
    }

    pub fn is_test_running(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Breakdown of the most recent scoring pass in this process
    pub fn explain_last(&self) -> Option<String> {
        self.last_metrics
            .as_ref()
            .map(|metrics| self.scorer.explain(metrics, &self.current))
    }

    /// Run the event loop until the shutdown token is cancelled
    pub async fn run(mut self) -> Result<()> {
        self.watcher.start().context("Failed to start file watcher")?;
        if self.config.tests.run_on_start {
            // Nothing can be in flight yet
            let _ = self.start_run(Trigger::Manual);
        }

        loop {
            let step = tokio::select! {
                _ = self.shutdown.cancelled() => Step::Shutdown,
                Some(event) = self.events_rx.recv() => Step::Change(event),
                Some(command) = self.commands_rx.recv() => Step::Command(command),
                outcome = wait_for(&mut self.in_flight), if self.in_flight.is_some() => Step::Completed(outcome),
            };

            match step {
                Step::Change(event) => self.handle_change(event),
                Step::Command(command) => self.handle_command(command),
                Step::Completed(outcome) => {
                    if let Some(run) = self.in_flight.take() {
                        self.complete_run(run, outcome);
                    }
                }
                Step::Shutdown => break,
            }
        }

        self.shutdown();
        Ok(())
    }

    /// One manual run and recomputation without watching
    pub async fn run_once(&mut self) -> Result<Arc<NeuralStatus>, CoordinatorError> {
        let mut run = self.coordinator.request_run(Trigger::Manual)?;
        let outcome = run.wait().await;
        self.coordinator.finish(&run, &outcome);
        Ok(self.recompute(&outcome))
    }

    /// Stop accepting work, flush the watcher and detach any in-flight run
    pub fn shutdown(&mut self) {
        if !self.accepting {
            return;
        }
        self.accepting = false;
        self.shutdown.cancel();

        let mut flushed = Vec::new();
        let events_rx = &mut self.events_rx;
        self.watcher.stop_draining(|| {
            while let Ok(event) = events_rx.try_recv() {
                flushed.push(event);
            }
        });
        for event in &flushed {
            self.notify_listeners(event);
        }

        if let Some(run) = self.in_flight.take() {
            info!(
                "Leaving in-flight test run ({}) to finish; its result will be discarded",
                run.trigger()
            );
        }
        info!("Neural core stopped");
    }

    fn handle_change(&mut self, event: ChangeEvent) {
        self.notify_listeners(&event);
        if !self.accepting {
            return;
        }
        if !self.coordinator.should_run(&event) {
            debug!("No test run needed for {}", event.path.display());
            return;
        }
        if let Err(e) = self.start_run(Trigger::FileChange) {
            debug!("Change to {} not acted on: {}", event.path.display(), e);
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::RunTests(reply) => {
                let result = self.start_run(Trigger::Manual);
                let _ = reply.send(result);
            }
            Command::Status(reply) => {
                let _ = reply.send(Arc::clone(&self.current));
            }
        }
    }

    fn notify_listeners(&self, event: &ChangeEvent) {
        for (index, listener) in self.listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Change listener #{} failed: {:#}", index, e),
                Err(_) => warn!("Change listener #{} panicked", index),
            }
        }
    }

    fn start_run(&mut self, trigger: Trigger) -> Result<(), CoordinatorError> {
        let run = self.coordinator.request_run(trigger)?;
        self.in_flight = Some(run);
        Ok(())
    }

    fn complete_run(&mut self, run: PendingRun, outcome: TestOutcome) {
        self.coordinator.finish(&run, &outcome);
        if !self.accepting {
            info!("Discarding test result that arrived after shutdown");
            return;
        }
        self.recompute(&outcome);
    }

    /// Score, compare against history, persist and publish
    fn recompute(&mut self, outcome: &TestOutcome) -> Arc<NeuralStatus> {
        let counts = self.probe.file_counts();
        let facts = self.probe.facts();
        let production_ready = self.store.load().is_production_ready();

        let input = ScoreInput {
            outcome,
            counts: &counts,
            facts: &facts,
            production_ready,
            timestamp: Utc::now(),
        };
        let metrics = self.scorer.metrics(&input);
        let mut status = self.scorer.score(&input);

        let alerts = self.analyzer.detect_regressions(&status);
        for alert in &alerts {
            warn!("Regression ({}): {}", alert.severity, alert.message);
        }
        status
            .diagnostics
            .extend(alerts_to_diagnostics(&alerts, status.timestamp));

        if let Err(e) = self.analyzer.save_snapshot(&status) {
            warn!("Failed to save history snapshot: {}", e);
        }
        if let Err(e) = self.store.save(&status) {
            warn!("Failed to save status: {}", e);
        }

        let snapshot = Arc::new(status);
        self.current = Arc::clone(&snapshot);
        self.last_metrics = Some(metrics);
        for publisher in &self.publishers {
            match catch_unwind(AssertUnwindSafe(|| publisher.publish(Arc::clone(&snapshot)))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Publisher '{}' failed: {:#}", publisher.name(), e),
                Err(_) => warn!("Publisher '{}' panicked", publisher.name()),
            }
        }
        snapshot
    }
}

async fn wait_for(run: &mut Option<PendingRun>) -> TestOutcome {
    match run {
        Some(run) => run.wait().await,
        None => std::future::pending().await,
    }
}
