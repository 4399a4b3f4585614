//! Debounced, filtered file watching
//!
//! notify delivers raw events on its own thread. They are handed over a
//! crossbeam channel to a worker thread that filters, debounces and
//! classifies them, then forwards [`ChangeEvent`]s into the event loop's
//! bounded tokio channel. Nothing on these threads touches loop state.

mod debounce;
mod filter;

pub use debounce::Debouncer;
pub use filter::{IgnoreRules, TestFileClassifier};

use crate::config::{TestsConfig, WatchConfig};
use crate::models::{ChangeEvent, ChangeKind};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Errors that can occur while starting the watcher
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Project root does not exist: {0}")]
    MissingRoot(PathBuf),

    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Failed to spawn watch worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Snapshot of watcher state
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherStats {
    pub running: bool,
    pub watched_directories: Vec<PathBuf>,
    pub ignored_names: usize,
    pub ignored_extensions: usize,
    pub debounce_window: Duration,
}

struct ActiveWatch {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
    stop_tx: Sender<()>,
    worker: JoinHandle<()>,
}

/// Watches a fixed set of directories and emits classified change events
pub struct FileChangeWatcher {
    root: PathBuf,
    directories: Vec<PathBuf>,
    rules: Arc<RwLock<IgnoreRules>>,
    classifier: TestFileClassifier,
    debounce_window: Duration,
    shutdown_timeout: Duration,
    events: mpsc::Sender<ChangeEvent>,
    active: Option<ActiveWatch>,
}

impl FileChangeWatcher {
    pub fn new(
        root: &Path,
        watch: &WatchConfig,
        tests: &TestsConfig,
        events: mpsc::Sender<ChangeEvent>,
    ) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let directories = watch.directories.iter().map(|d| root.join(d)).collect();
        Self {
            root,
            directories,
            rules: Arc::new(RwLock::new(IgnoreRules::from_config(watch))),
            classifier: TestFileClassifier::from_config(tests),
            debounce_window: watch.debounce_window(),
            shutdown_timeout: watch.shutdown_timeout(),
            events,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Begin watching. Calling this while already running is a no-op.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.active.is_some() {
            debug!("File watcher already running");
            return Ok(());
        }
        if !self.root.is_dir() {
            return Err(WatchError::MissingRoot(self.root.clone()));
        }

        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<Event>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Receiver gone means the worker already stopped
                let _ = raw_tx.send(event);
            }
            Err(e) => warn!("File watch error: {}", e),
        })?;

        let mut watched = Vec::new();
        for dir in &self.directories {
            if !dir.is_dir() {
                warn!("Watch directory does not exist: {}", dir.display());
                continue;
            }
            match watcher.watch(dir, RecursiveMode::Recursive) {
                Ok(()) => watched.push(dir.clone()),
                Err(e) => warn!("Failed to watch {}: {}", dir.display(), e),
            }
        }
        if watched.is_empty() {
            warn!("No existing directories to watch under {}", self.root.display());
        }

        let worker = EventWorker {
            root: self.root.clone(),
            rules: Arc::clone(&self.rules),
            classifier: self.classifier.clone(),
            debouncer: Debouncer::new(self.debounce_window),
            events: self.events.clone(),
            receiver_gone: false,
        };
        let worker = thread::Builder::new()
            .name("neural-watch".to_string())
            .spawn(move || worker.run(raw_rx, stop_rx))
            .map_err(WatchError::Spawn)?;

        info!(
            "Watching {} director{} under {}",
            watched.len(),
            if watched.len() == 1 { "y" } else { "ies" },
            self.root.display()
        );
        self.active = Some(ActiveWatch {
            watcher,
            watched,
            stop_tx,
            worker,
        });
        Ok(())
    }

    /// Stop watching using the configured shutdown timeout
    pub fn stop(&mut self) {
        self.stop_with_timeout(self.shutdown_timeout);
    }

    /// Stop watching. Events already queued are delivered before the worker
    /// exits. Safe to call when not running.
    pub fn stop_with_timeout(&mut self, timeout: Duration) {
        self.halt(timeout, || {});
    }

    /// Stop watching while `drain` empties the receiving side of the event
    /// channel. The worker's final flush blocks once that channel is full,
    /// so callers that own the receiver and are stopping from the same
    /// thread use this instead of [`stop`](Self::stop).
    pub fn stop_draining(&mut self, drain: impl FnMut()) {
        self.halt(self.shutdown_timeout, drain);
    }

    fn halt(&mut self, timeout: Duration, mut drain: impl FnMut()) {
        let Some(active) = self.active.take() else {
            debug!("File watcher not running");
            return;
        };
        let ActiveWatch {
            watcher,
            stop_tx,
            worker,
            ..
        } = active;

        // Releases the OS watch handles; no new raw events after this
        drop(watcher);
        let _ = stop_tx.send(());

        let deadline = Instant::now() + timeout;
        while !worker.is_finished() && Instant::now() < deadline {
            drain();
            thread::sleep(Duration::from_millis(10));
        }
        drain();
        if worker.is_finished() {
            if worker.join().is_err() {
                warn!("File watch worker panicked");
            }
            info!("File watcher stopped");
        } else {
            warn!("File watch worker did not drain within {:?}; detaching it", timeout);
        }
    }

    /// Watch an additional directory (relative paths resolve against the root)
    pub fn add_watch_directory(&mut self, dir: &Path) -> bool {
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        };
        if !dir.is_dir() {
            warn!("Cannot watch missing directory: {}", dir.display());
            return false;
        }
        if !self.directories.contains(&dir) {
            self.directories.push(dir.clone());
        }
        if let Some(active) = self.active.as_mut() {
            if active.watched.contains(&dir) {
                return true;
            }
            if let Err(e) = active.watcher.watch(&dir, RecursiveMode::Recursive) {
                warn!("Failed to watch {}: {}", dir.display(), e);
                return false;
            }
            active.watched.push(dir.clone());
        }
        info!("Added watch directory {}", dir.display());
        true
    }

    pub fn add_ignore_pattern(&self, pattern: &str) -> bool {
        let added = self
            .rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_pattern(pattern);
        if added {
            debug!("Added ignore pattern {}", pattern);
        }
        added
    }

    pub fn remove_ignore_pattern(&self, pattern: &str) -> bool {
        let removed = self
            .rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_pattern(pattern);
        if removed {
            debug!("Removed ignore pattern {}", pattern);
        }
        removed
    }

    /// Directories currently watched (or that would be, when stopped)
    pub fn watched_directories(&self) -> Vec<PathBuf> {
        match &self.active {
            Some(active) => active.watched.clone(),
            None => self.directories.iter().filter(|d| d.is_dir()).cloned().collect(),
        }
    }

    pub fn stats(&self) -> WatcherStats {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        WatcherStats {
            running: self.is_running(),
            watched_directories: self.watched_directories(),
            ignored_names: rules.name_count(),
            ignored_extensions: rules.extension_count(),
            debounce_window: self.debounce_window,
        }
    }
}

impl Drop for FileChangeWatcher {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}

/// Map a raw notify event to the file changes it implies
fn translate(event: &Event) -> Vec<(ChangeKind, PathBuf)> {
    let all = |kind: ChangeKind| -> Vec<(ChangeKind, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };
    match &event.kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Create(_) => all(ChangeKind::Created),
        EventKind::Remove(_) => all(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => all(ChangeKind::Deleted),
            RenameMode::To => all(ChangeKind::Moved),
            RenameMode::Both => event
                .paths
                .last()
                .map(|dest| vec![(ChangeKind::Moved, dest.clone())])
                .unwrap_or_default(),
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        ChangeKind::Moved
                    } else {
                        ChangeKind::Deleted
                    };
                    (kind, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(_) => all(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Filter/debounce stage running on the worker thread
struct EventWorker {
    root: PathBuf,
    rules: Arc<RwLock<IgnoreRules>>,
    classifier: TestFileClassifier,
    debouncer: Debouncer,
    events: mpsc::Sender<ChangeEvent>,
    receiver_gone: bool,
}

impl EventWorker {
    fn run(mut self, raw_rx: Receiver<Event>, stop_rx: Receiver<()>) {
        loop {
            crossbeam_channel::select! {
                recv(raw_rx) -> msg => match msg {
                    Ok(event) => {
                        self.handle(&event, Instant::now());
                    }
                    Err(_) => break,
                },
                recv(stop_rx) -> _ => {
                    let mut flushed = 0;
                    while let Ok(event) = raw_rx.try_recv() {
                        flushed += self.handle(&event, Instant::now());
                    }
                    debug!("Flushed {} pending change event(s) on stop", flushed);
                    break;
                }
            }
        }
    }

    /// Process one raw event; returns how many change events were delivered
    fn handle(&mut self, event: &Event, now: Instant) -> usize {
        let mut delivered = 0;
        for (kind, path) in translate(event) {
            if let Some(change) = self.filter(kind, path, now) {
                if self.deliver(change) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    fn filter(&mut self, kind: ChangeKind, path: PathBuf, now: Instant) -> Option<ChangeEvent> {
        if kind != ChangeKind::Deleted && path.is_dir() {
            return None;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(&path);
        let ignored = self
            .rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_ignored(relative);
        if ignored {
            trace!("Ignoring {}", path.display());
            return None;
        }

        if kind == ChangeKind::Deleted {
            self.debouncer.forget(&path);
        } else if !self.debouncer.accept(&path, now) {
            trace!("Debounced {} {}", kind, path.display());
            return None;
        }

        let is_test_file = self.classifier.is_test_file(relative);
        Some(ChangeEvent {
            kind,
            path,
            is_test_file,
            observed_at: Utc::now(),
        })
    }

    fn deliver(&mut self, change: ChangeEvent) -> bool {
        debug!(
            "File {}: {}{}",
            change.kind,
            change.path.display(),
            if change.is_test_file { " (test)" } else { "" }
        );
        match self.events.blocking_send(change) {
            Ok(()) => true,
            Err(_) => {
                if !self.receiver_gone {
                    warn!("Change event receiver dropped; discarding further events");
                    self.receiver_gone = true;
                }
                false
            }
        }
    }
}
