//! Leading-edge, per-path debounce

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Entries older than the window are pruned once the map grows past this
const PRUNE_THRESHOLD: usize = 4096;

/// Remembers when each path last produced an accepted event.
///
/// An event is accepted when no accepted event for the same path happened
/// within `window`. Suppressed events do not extend the window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_accepted: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn accept(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(&last) = self.last_accepted.get(path) {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        if self.last_accepted.len() >= PRUNE_THRESHOLD {
            self.prune(now);
        }
        self.last_accepted.insert(path.to_path_buf(), now);
        true
    }

    /// Drop any state for `path` (used for deletions)
    pub fn forget(&mut self, path: &Path) {
        self.last_accepted.remove(path);
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.last_accepted
            .retain(|_, last| now.saturating_duration_since(*last) < window);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.last_accepted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_within_window_yields_one() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        let start = Instant::now();
        let path = Path::new("src/app.ts");

        let accepted = (0..5)
            .filter(|i| debouncer.accept(path, start + Duration::from_millis(i * 100)))
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn test_spaced_events_each_accepted() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        let start = Instant::now();
        let path = Path::new("src/app.ts");

        let accepted = (0..4)
            .filter(|i| debouncer.accept(path, start + Duration::from_millis(i * 1100)))
            .count();
        assert_eq!(accepted, 4);
    }

    #[test]
    fn test_suppressed_events_do_not_extend_window() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        let start = Instant::now();
        let path = Path::new("src/app.ts");

        assert!(debouncer.accept(path, start));
        assert!(!debouncer.accept(path, start + Duration::from_millis(900)));
        assert!(debouncer.accept(path, start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_paths_are_independent() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        let now = Instant::now();
        assert!(debouncer.accept(Path::new("a.py"), now));
        assert!(debouncer.accept(Path::new("b.py"), now));
        assert!(!debouncer.accept(Path::new("a.py"), now));
    }

    #[test]
    fn test_forget_resets_path() {
        let mut debouncer = Debouncer::new(Duration::from_secs(1));
        let now = Instant::now();
        let path = Path::new("a.py");
        assert!(debouncer.accept(path, now));
        debouncer.forget(path);
        assert!(debouncer.accept(path, now));
    }

    #[test]
    fn test_prune_keeps_map_bounded() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        let start = Instant::now();
        for i in 0..PRUNE_THRESHOLD {
            debouncer.accept(&PathBuf::from(format!("f{}.py", i)), start);
        }
        debouncer.accept(Path::new("late.py"), start + Duration::from_secs(1));
        assert_eq!(debouncer.tracked(), 1);
    }
}
