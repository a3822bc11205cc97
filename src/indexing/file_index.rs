//! Primary per-file index.
//!
//! Keyed map `path -> FileIndexEntry`. The file index exclusively owns
//! its entries; the symbol index holds independent value-copies and is
//! kept consistent by the engine. Every mutation advances `last_updated`
//! monotonically and emits an update event; emission never rejects a
//! mutation when no listener is attached.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{IndexError, IndexResult};
use crate::types::{Dependency, Symbol};

use super::file_info::{FileInfo, timestamp_millis};
use super::progress::IndexStats;

/// Per-file record owned by the file index.
#[derive(Debug, Clone)]
pub struct FileIndexEntry {
    pub info: FileInfo,
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<Dependency>,
    /// True exactly when `set_file_symbols` has completed for the current
    /// content.
    pub is_indexed: bool,
    pub last_indexed: Option<u64>,
    pub parse_errors: Vec<String>,
}

impl FileIndexEntry {
    fn new(info: FileInfo) -> Self {
        Self {
            info,
            symbols: Vec::new(),
            dependencies: Vec::new(),
            is_indexed: false,
            last_indexed: None,
            parse_errors: Vec::new(),
        }
    }

    /// Estimated byte footprint; a coarse capacity heuristic.
    fn estimated_size(&self) -> usize {
        self.info.file_path.as_os_str().len() * 2
            + 64
            + self.symbols.len() * 128
            + self.dependencies.len() * 64
    }
}

/// Kind of mutation an update event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexOperation {
    Add,
    Update,
    Delete,
}

/// Event emitted on every file-index mutation.
#[derive(Debug, Clone)]
pub struct IndexUpdateEvent {
    pub operation: IndexOperation,
    pub file_path: PathBuf,
    pub timestamp: u64,
    pub success: bool,
    pub error: Option<String>,
}

/// Subscriber to index update events.
pub type UpdateListener = Arc<dyn Fn(&IndexUpdateEvent) + Send + Sync>;

#[derive(Default)]
struct FileIndexInner {
    entries: HashMap<PathBuf, FileIndexEntry>,
    last_updated: u64,
}

impl FileIndexInner {
    /// Advance the mutation clock; strictly monotonic even within one
    /// millisecond.
    fn touch(&mut self) -> u64 {
        let now = timestamp_millis().max(self.last_updated + 1);
        self.last_updated = now;
        now
    }
}

/// Primary file index.
pub struct FileIndex {
    inner: RwLock<FileIndexInner>,
    listeners: RwLock<HashMap<usize, UpdateListener>>,
    next_listener_id: AtomicUsize,
}

impl FileIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(FileIndexInner::default()),
            listeners: RwLock::new(HashMap::new()),
            next_listener_id: AtomicUsize::new(1),
        }
    }

    /// Insert (or replace) the entry for a file. A replaced entry starts
    /// over: not indexed, no symbols, no errors.
    pub fn add_file(&self, info: FileInfo) {
        let path = info.file_path.clone();
        let timestamp = {
            let mut inner = self.inner.write();
            let timestamp = inner.touch();
            inner.entries.insert(path.clone(), FileIndexEntry::new(info));
            timestamp
        };
        self.emit(IndexOperation::Add, path, timestamp, true, None);
    }

    /// Remove a file's entry. Returns whether it existed.
    pub fn remove_file(&self, path: &Path) -> bool {
        let (removed, timestamp) = {
            let mut inner = self.inner.write();
            let timestamp = inner.touch();
            (inner.entries.remove(path).is_some(), timestamp)
        };
        self.emit(
            IndexOperation::Delete,
            path.to_path_buf(),
            timestamp,
            removed,
            (!removed).then(|| format!("file not in index: {}", path.display())),
        );
        removed
    }

    pub fn has_file(&self, path: &Path) -> bool {
        self.inner.read().entries.contains_key(path)
    }

    pub fn get_file_info(&self, path: &Path) -> Option<FileInfo> {
        self.inner.read().entries.get(path).map(|e| e.info.clone())
    }

    /// Replace a file's symbols. Marks the file indexed.
    pub fn set_file_symbols(&self, path: &Path, symbols: Vec<Symbol>) -> IndexResult<()> {
        let timestamp = {
            let mut inner = self.inner.write();
            let timestamp = inner.touch();
            let entry = inner
                .entries
                .get_mut(path)
                .ok_or_else(|| IndexError::FileNotInIndex {
                    path: path.to_path_buf(),
                })?;
            entry.symbols = symbols;
            entry.is_indexed = true;
            entry.last_indexed = Some(timestamp);
            timestamp
        };
        self.emit(IndexOperation::Update, path.to_path_buf(), timestamp, true, None);
        Ok(())
    }

    pub fn get_file_symbols(&self, path: &Path) -> Option<Vec<Symbol>> {
        self.inner.read().entries.get(path).map(|e| e.symbols.clone())
    }

    pub fn set_file_dependencies(
        &self,
        path: &Path,
        dependencies: Vec<Dependency>,
    ) -> IndexResult<()> {
        let timestamp = {
            let mut inner = self.inner.write();
            let timestamp = inner.touch();
            let entry = inner
                .entries
                .get_mut(path)
                .ok_or_else(|| IndexError::FileNotInIndex {
                    path: path.to_path_buf(),
                })?;
            entry.dependencies = dependencies;
            timestamp
        };
        self.emit(IndexOperation::Update, path.to_path_buf(), timestamp, true, None);
        Ok(())
    }

    pub fn get_file_dependencies(&self, path: &Path) -> Option<Vec<Dependency>> {
        self.inner
            .read()
            .entries
            .get(path)
            .map(|e| e.dependencies.clone())
    }

    pub fn set_file_parse_errors(&self, path: &Path, errors: Vec<String>) -> IndexResult<()> {
        let timestamp = {
            let mut inner = self.inner.write();
            let timestamp = inner.touch();
            let entry = inner
                .entries
                .get_mut(path)
                .ok_or_else(|| IndexError::FileNotInIndex {
                    path: path.to_path_buf(),
                })?;
            entry.parse_errors = errors;
            timestamp
        };
        self.emit(IndexOperation::Update, path.to_path_buf(), timestamp, true, None);
        Ok(())
    }

    pub fn get_file_parse_errors(&self, path: &Path) -> Option<Vec<String>> {
        self.inner
            .read()
            .entries
            .get(path)
            .map(|e| e.parse_errors.clone())
    }

    pub fn has_file_parse_errors(&self, path: &Path) -> bool {
        self.inner
            .read()
            .entries
            .get(path)
            .is_some_and(|e| !e.parse_errors.is_empty())
    }

    /// Replace a file's metadata without touching its symbols.
    pub fn update_file_info(&self, path: &Path, info: FileInfo) -> IndexResult<()> {
        let timestamp = {
            let mut inner = self.inner.write();
            let timestamp = inner.touch();
            let entry = inner
                .entries
                .get_mut(path)
                .ok_or_else(|| IndexError::FileNotInIndex {
                    path: path.to_path_buf(),
                })?;
            entry.info = info;
            timestamp
        };
        self.emit(IndexOperation::Update, path.to_path_buf(), timestamp, true, None);
        Ok(())
    }

    pub fn is_indexed(&self, path: &Path) -> bool {
        self.inner
            .read()
            .entries
            .get(path)
            .is_some_and(|e| e.is_indexed)
    }

    pub fn find_files_by_extension(&self, extension: &str) -> Vec<PathBuf> {
        let wanted = if extension.starts_with('.') {
            extension.to_lowercase()
        } else {
            format!(".{}", extension.to_lowercase())
        };
        let mut files: Vec<PathBuf> = self
            .inner
            .read()
            .entries
            .values()
            .filter(|e| e.info.extension == wanted)
            .map(|e| e.info.file_path.clone())
            .collect();
        files.sort();
        files
    }

    pub fn find_files_by_language(&self, language: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .inner
            .read()
            .entries
            .values()
            .filter(|e| e.info.language.as_deref() == Some(language))
            .map(|e| e.info.file_path.clone())
            .collect();
        files.sort();
        files
    }

    pub fn get_all_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.inner.read().entries.keys().cloned().collect();
        files.sort();
        files
    }

    pub fn total_files(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn indexed_files_count(&self) -> usize {
        self.inner
            .read()
            .entries
            .values()
            .filter(|e| e.is_indexed)
            .count()
    }

    pub fn get_stats(&self) -> IndexStats {
        let inner = self.inner.read();
        let mut stats = IndexStats {
            total_files: inner.entries.len(),
            last_updated: inner.last_updated,
            ..IndexStats::default()
        };
        for entry in inner.entries.values() {
            if entry.is_indexed {
                stats.indexed_files += 1;
            }
            stats.total_symbols += entry.symbols.len();
            stats.total_dependencies += entry.dependencies.len();
            stats.index_size += entry.estimated_size();
        }
        stats
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.touch();
        inner.entries.clear();
    }

    /// Whether a file needs (re)indexing given its current mtime.
    ///
    /// True when the file is unknown, not yet indexed, or its mtime moved
    /// more than one second past the recorded one (the slack absorbs
    /// filesystem timestamp rounding).
    pub fn needs_reindexing(&self, path: &Path, current_mtime_millis: u64) -> bool {
        let inner = self.inner.read();
        match inner.entries.get(path) {
            None => true,
            Some(entry) => {
                !entry.is_indexed
                    || current_mtime_millis.saturating_sub(entry.info.last_modified) > 1_000
            }
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&IndexUpdateEvent) + Send + Sync + 'static) -> usize {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().insert(id, Arc::new(listener));
        id
    }

    pub fn unsubscribe(&self, id: usize) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    fn emit(
        &self,
        operation: IndexOperation,
        file_path: PathBuf,
        timestamp: u64,
        success: bool,
        error: Option<String>,
    ) {
        let snapshot: Vec<UpdateListener> = self.listeners.read().values().cloned().collect();
        if snapshot.is_empty() {
            return;
        }
        let event = IndexUpdateEvent {
            operation,
            file_path,
            timestamp,
            success,
            error,
        };
        for listener in snapshot {
            listener(&event);
        }
    }
}

impl Default for FileIndex {
    fn default() -> Self {
        Self::new()
    }
}
