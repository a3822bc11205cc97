//! Per-path debouncing of file change events.
//!
//! Editors write files in bursts (auto-save, formatting). Coalescing by
//! path over a quiet window keeps redundant parses off the engine: the
//! last event per path wins, so a rapid add followed by a change collapses
//! into a single update.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::ChangeKind;

#[derive(Debug, Clone, Copy)]
struct PendingChange {
    kind: ChangeKind,
    last_event: Instant,
}

/// Debounces file change events by path.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashMap<PathBuf, PendingChange>,
    duration: Duration,
}

impl Debouncer {
    /// Create a debouncer with the given quiet window in milliseconds.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            duration: Duration::from_millis(debounce_ms),
        }
    }

    /// Record an event, resetting the quiet window for its path. A newer
    /// event replaces whatever was pending for the path.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        self.pending.insert(
            path,
            PendingChange {
                kind,
                last_event: Instant::now(),
            },
        );
    }

    /// Drop a pending path (e.g. when the file is deleted).
    pub fn remove(&mut self, path: &Path) {
        self.pending.remove(path);
    }

    /// Take every path that has been quiet for the window, removing it
    /// from pending.
    pub fn take_ready(&mut self) -> Vec<(PathBuf, ChangeKind)> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, change| {
            if now.duration_since(change.last_event) >= self.duration {
                ready.push((path.clone(), change.kind));
                false
            } else {
                true
            }
        });

        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
