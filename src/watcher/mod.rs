//! File watcher for incremental index updates.
//!
//! Translates filesystem events into index operations: adds index, changes
//! re-index (with checksum suppression), unlinks remove. Modifications are
//! debounced per path; deletions dispatch immediately. Per-event failures
//! surface on an error channel and never crash the watcher.

mod debouncer;
mod error;
mod file_watcher;

use serde::Serialize;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use file_watcher::{FileChangeEvent, FileWatcher, WatcherOptions};

/// Filesystem event vocabulary consumed from the host watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
        };
        write!(f, "{tag}")
    }
}
