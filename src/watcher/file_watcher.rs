//! The file watcher: a cooperative event processor atop `notify`.
//!
//! Events flow notify -> channel -> debouncer -> engine dispatch. The
//! watcher can also be driven manually through `handle_file_change` and
//! `handle_batch_changes`, which is how hosts with their own filesystem
//! watching integrate.

use notify::{RecursiveMode, Watcher};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::Duration;

use crate::indexing::engine::{IndexEngine, IndexOutcome};
use crate::indexing::file_info::timestamp_millis;
use crate::{debug_event, log_event};

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::ChangeKind;

/// How often the run loop flushes debounced events.
const FLUSH_INTERVAL_MS: u64 = 100;

/// Watcher configuration. The debounce window is deliberately exposed;
/// 200 ms suits most editors.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub debounce_ms: u64,
    /// Cap for `handle_batch_changes`; defaults to the engine's
    /// configured concurrency.
    pub max_concurrency: Option<usize>,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            max_concurrency: None,
        }
    }
}

/// Emitted on the `file_changed` channel before dispatch.
#[derive(Debug, Clone)]
pub struct FileChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: u64,
}

type ChangeListener = Arc<dyn Fn(&FileChangeEvent) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&WatchError) + Send + Sync>;

/// Debounced change-to-index-operation translator.
pub struct FileWatcher {
    engine: Arc<IndexEngine>,
    options: WatcherOptions,
    debouncer: Mutex<Debouncer>,
    paused: AtomicBool,
    disposed: AtomicBool,
    change_listeners: RwLock<HashMap<usize, ChangeListener>>,
    error_listeners: RwLock<HashMap<usize, ErrorListener>>,
    next_listener_id: AtomicUsize,
    watcher: Mutex<Option<notify::RecommendedWatcher>>,
    event_rx: Mutex<Option<mpsc::Receiver<notify::Result<notify::Event>>>>,
}

impl FileWatcher {
    pub fn new(engine: Arc<IndexEngine>, options: WatcherOptions) -> Self {
        let debounce_ms = options.debounce_ms;
        Self {
            engine,
            options,
            debouncer: Mutex::new(Debouncer::new(debounce_ms)),
            paused: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            change_listeners: RwLock::new(HashMap::new()),
            error_listeners: RwLock::new(HashMap::new()),
            next_listener_id: AtomicUsize::new(1),
            watcher: Mutex::new(None),
            event_rx: Mutex::new(None),
        }
    }

    /// Attach the underlying filesystem watcher to a root directory.
    pub fn start(&self, root: &Path) -> Result<(), WatchError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WatchError::InitFailed {
                reason: "watcher has been disposed".into(),
            });
        }

        let (tx, rx) = mpsc::channel(256);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                let _ = tx.blocking_send(result);
            })?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;

        *self.watcher.lock() = Some(watcher);
        *self.event_rx.lock() = Some(rx);
        log_event!("watcher", "started watching {}", root.display());
        Ok(())
    }

    /// Main event loop: receive filesystem events and periodically flush
    /// the debouncer. Returns when the watcher is stopped.
    pub async fn run(&self) -> Result<(), WatchError> {
        let mut rx = self
            .event_rx
            .lock()
            .take()
            .ok_or(WatchError::ChannelClosed)?;

        loop {
            if self.disposed.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                received = rx.recv() => match received {
                    Some(Ok(event)) => self.enqueue_notify_event(event).await,
                    Some(Err(e)) => self.emit_error(&WatchError::EventError {
                        details: e.to_string(),
                    }),
                    // Sender dropped: the watcher was stopped.
                    None => break,
                },
                _ = tokio::time::sleep(Duration::from_millis(FLUSH_INTERVAL_MS)) => {
                    self.process_pending().await;
                }
            }
        }

        self.process_pending().await;
        Ok(())
    }

    /// Translate one notify event into debounced entries. Deletions skip
    /// the debouncer and dispatch immediately.
    async fn enqueue_notify_event(&self, event: notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Add,
            EventKind::Modify(_) => ChangeKind::Change,
            EventKind::Remove(_) => ChangeKind::Unlink,
            _ => return,
        };

        for path in event.paths {
            self.enqueue(path, kind).await;
        }
    }

    /// Queue a change for dispatch. Paused and disposed watchers drop
    /// events rather than queue them.
    pub async fn enqueue(&self, path: PathBuf, kind: ChangeKind) {
        if self.paused.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
            debug_event!("watcher", "dropped {} {}", kind, path.display());
            return;
        }
        match kind {
            ChangeKind::Unlink => {
                self.debouncer.lock().remove(&path);
                self.handle_file_change(&path, ChangeKind::Unlink).await;
            }
            _ => {
                self.debouncer.lock().record(path, kind);
            }
        }
    }

    /// Dispatch every debounced entry whose quiet window elapsed.
    pub async fn process_pending(&self) -> usize {
        let ready = self.debouncer.lock().take_ready();
        let count = ready.len();
        for (path, kind) in ready {
            self.handle_file_change(&path, kind).await;
        }
        count
    }

    /// Translate one change into the matching engine operation.
    ///
    /// Errors are caught and emitted on the error channel; the watcher
    /// never crashes on a per-file failure.
    pub async fn handle_file_change(&self, path: &Path, kind: ChangeKind) {
        if self.paused.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
            return;
        }

        self.emit_change(&FileChangeEvent {
            path: path.to_path_buf(),
            kind,
            timestamp: timestamp_millis(),
        });

        let result = match kind {
            ChangeKind::Add => self.engine.index_file(path).await.map(Some),
            ChangeKind::Change => self.engine.update_file(path).await.map(Some),
            ChangeKind::Unlink => self.engine.remove_file(path).map(|_| None),
        };

        match result {
            Ok(Some(IndexOutcome::Unchanged)) => {
                debug_event!("watcher", "unchanged {}", path.display());
            }
            Ok(Some(IndexOutcome::Skipped)) => {
                debug_event!("watcher", "skipped {}", path.display());
            }
            Ok(_) => {
                debug_event!("watcher", "dispatched {} {}", kind, path.display());
            }
            Err(e) => {
                let error = WatchError::Dispatch {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                };
                tracing::error!("[watcher] {error}");
                self.emit_error(&error);
            }
        }
    }

    /// Process a batch of changes grouped by kind, capping in-flight
    /// dispatches. Paths within a batch are expected to be unique;
    /// ordering across kinds is adds, changes, then unlinks.
    pub async fn handle_batch_changes(
        self: Arc<Self>,
        items: Vec<(PathBuf, ChangeKind)>,
        max_concurrency: Option<usize>,
    ) {
        let cap = max_concurrency
            .or(self.options.max_concurrency)
            .unwrap_or(self.engine.config().max_concurrency)
            .max(1);

        let mut adds = Vec::new();
        let mut changes = Vec::new();
        let mut unlinks = Vec::new();
        for (path, kind) in items {
            match kind {
                ChangeKind::Add => adds.push(path),
                ChangeKind::Change => changes.push(path),
                ChangeKind::Unlink => unlinks.push(path),
            }
        }

        for (kind, group) in [
            (ChangeKind::Add, adds),
            (ChangeKind::Change, changes),
            (ChangeKind::Unlink, unlinks),
        ] {
            if group.is_empty() {
                continue;
            }
            let semaphore = Arc::new(Semaphore::new(cap));
            let mut join_set = JoinSet::new();
            for path in group {
                let watcher = Arc::clone(&self);
                let semaphore = Arc::clone(&semaphore);
                join_set.spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    watcher.handle_file_change(&path, kind).await;
                });
            }
            while join_set.join_next().await.is_some() {}
        }
    }

    /// Drop incoming events until `resume`. Already-dispatched operations
    /// complete; nothing is queued while paused.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        log_event!("watcher", "paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        log_event!("watcher", "resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Tear down the underlying watcher and transition to disposed.
    pub fn stop(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.watcher.lock() = None;
        self.debouncer.lock().clear();
        log_event!("watcher", "stopped");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.lock().has_pending()
    }

    pub fn on_file_changed(
        &self,
        listener: impl Fn(&FileChangeEvent) + Send + Sync + 'static,
    ) -> usize {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.change_listeners.write().insert(id, Arc::new(listener));
        id
    }

    pub fn on_error(&self, listener: impl Fn(&WatchError) + Send + Sync + 'static) -> usize {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.error_listeners.write().insert(id, Arc::new(listener));
        id
    }

    pub fn remove_change_listener(&self, id: usize) -> bool {
        self.change_listeners.write().remove(&id).is_some()
    }

    pub fn remove_error_listener(&self, id: usize) -> bool {
        self.error_listeners.write().remove(&id).is_some()
    }

    fn emit_change(&self, event: &FileChangeEvent) {
        let snapshot: Vec<ChangeListener> =
            self.change_listeners.read().values().cloned().collect();
        for listener in snapshot {
            listener(event);
        }
    }

    fn emit_error(&self, error: &WatchError) {
        let snapshot: Vec<ErrorListener> = self.error_listeners.read().values().cloned().collect();
        for listener in snapshot {
            listener(error);
        }
    }
}
