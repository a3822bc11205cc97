//! The indexing engine.
//!
//! Orchestrates discovery, parser dispatch, batched ingestion with bounded
//! concurrency, orphan cleanup, and incremental updates. One engine owns
//! one file index and one symbol index; the parser registry is shared
//! process-wide.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::IndexConfig;
use crate::error::{IndexError, IndexResult};
use crate::parsing::ParserRegistry;
use crate::types::SymbolKind;
use crate::{debug_event, log_event};

use super::file_index::FileIndex;
use super::file_info::{FileInfo, calculate_checksum, mtime_millis};
use super::progress::{BatchError, BatchOptions, BatchOutcome, BatchProgress, IndexStats};
use super::symbol_index::{SearchOptions, SymbolIndex, SymbolSearchResult};
use super::walker::FileWalker;

/// What happened to a single file during ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Parsed and written into both indexes.
    Indexed,
    /// Silently skipped (over the size limit).
    Skipped,
    /// Content checksum matched the stored one; nothing touched.
    Unchanged,
}

/// State shared with batch tasks.
struct EngineCore {
    config: Arc<IndexConfig>,
    registry: Arc<ParserRegistry>,
    file_index: Arc<FileIndex>,
    symbol_index: Arc<SymbolIndex>,
    /// Set once the first file (or first full pass) lands in the index.
    indexed: AtomicBool,
}

/// Incremental indexing engine over one workspace.
pub struct IndexEngine {
    core: Arc<EngineCore>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for IndexEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexEngine").finish_non_exhaustive()
    }
}

impl IndexEngine {
    /// Create an engine bound to the process-wide parser registry.
    /// Configuration is validated fail-fast.
    pub fn new(config: IndexConfig) -> IndexResult<Self> {
        Self::with_registry(config, ParserRegistry::instance())
    }

    /// Create an engine with an explicit registry (testability).
    pub fn with_registry(
        config: IndexConfig,
        registry: Arc<ParserRegistry>,
    ) -> IndexResult<Self> {
        config.validate()?;
        let config = Arc::new(config);
        Ok(Self {
            core: Arc::new(EngineCore {
                config,
                registry,
                file_index: Arc::new(FileIndex::new()),
                symbol_index: Arc::new(SymbolIndex::new()),
                indexed: AtomicBool::new(false),
            }),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.core.config
    }

    pub fn file_index(&self) -> &FileIndex {
        &self.core.file_index
    }

    pub fn symbol_index(&self) -> &SymbolIndex {
        &self.core.symbol_index
    }

    fn ensure_live(&self) -> IndexResult<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(IndexError::Disposed {
                component: "index engine",
            });
        }
        Ok(())
    }

    /// Index the workspace (or an explicit root). The root must exist and
    /// be a directory.
    pub async fn index_project(&self, path: Option<&Path>) -> IndexResult<BatchOutcome> {
        self.ensure_live()?;
        let root = path.unwrap_or(&self.core.config.workspace_path);
        if root.as_os_str().is_empty() {
            return Err(IndexError::InvalidIndexPath);
        }
        let metadata =
            tokio::fs::metadata(root)
                .await
                .map_err(|_| IndexError::PathNotFound {
                    path: root.to_path_buf(),
                })?;
        if !metadata.is_dir() {
            return Err(IndexError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        self.index_directory(root).await
    }

    /// Discover, batch-index, then drop entries for files that vanished
    /// from the directory tree.
    pub async fn index_directory(&self, dir: &Path) -> IndexResult<BatchOutcome> {
        self.ensure_live()?;

        let config = Arc::clone(&self.core.config);
        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || {
            FileWalker::new(config).map(|walker| walker.discover(&root))
        })
        .await
        .map_err(|e| IndexError::General(format!("discovery task failed: {e}")))??;

        log_event!("engine", "discovered {} candidate files", files.len());
        let outcome = self
            .batch_index_files(files.clone(), BatchOptions::default())
            .await;

        // Orphan cleanup: anything indexed but no longer discovered goes,
        // symbols first.
        let discovered: HashSet<PathBuf> = files.into_iter().collect();
        let mut removed = 0usize;
        for path in self.core.file_index.get_all_files() {
            if !discovered.contains(&path) {
                self.core.symbol_index.remove_file_symbols(&path);
                self.core.file_index.remove_file(&path);
                removed += 1;
            }
        }
        if removed > 0 {
            log_event!("engine", "orphan cleanup removed {} stale files", removed);
        }

        self.core.indexed.store(true, Ordering::SeqCst);
        Ok(outcome)
    }

    /// Index many files in chunks, capping in-flight work. Per-file
    /// failures are collected, never aborting siblings.
    pub async fn batch_index_files(
        &self,
        files: Vec<PathBuf>,
        options: BatchOptions,
    ) -> BatchOutcome {
        let concurrency = options
            .concurrency
            .unwrap_or(self.core.config.max_concurrency)
            .max(1);
        let batch_size = options.batch_size.unwrap_or(10).max(1);
        let total = files.len();

        let processed = Arc::new(AtomicUsize::new(0));
        let error_messages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut outcome = BatchOutcome::default();

        for chunk in files.chunks(batch_size) {
            let semaphore = Arc::new(Semaphore::new(concurrency));
            let mut join_set = JoinSet::new();

            for path in chunk {
                let path = path.clone();
                let core = Arc::clone(&self.core);
                let semaphore = Arc::clone(&semaphore);
                let processed = Arc::clone(&processed);
                let error_messages = Arc::clone(&error_messages);
                let progress = options.progress.clone();

                join_set.spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return (
                            path,
                            Err(IndexError::General("concurrency semaphore closed".into())),
                        );
                    };
                    let result = ingest_file(&core, &path).await;
                    if let Err(e) = &result {
                        error_messages.lock().push(e.to_string());
                    }
                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &progress {
                        let snapshot = BatchProgress {
                            total_files: total,
                            processed_files: done,
                            current_file: path.clone(),
                            percentage: if total == 0 {
                                100.0
                            } else {
                                done as f32 / total as f32 * 100.0
                            },
                            errors: error_messages.lock().clone(),
                        };
                        callback(&snapshot);
                    }
                    (path, result)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((_, Ok(IndexOutcome::Indexed))) => {
                        outcome.processed += 1;
                        outcome.indexed += 1;
                    }
                    Ok((_, Ok(IndexOutcome::Skipped))) => {
                        outcome.processed += 1;
                        outcome.skipped += 1;
                    }
                    Ok((_, Ok(IndexOutcome::Unchanged))) => {
                        outcome.processed += 1;
                    }
                    Ok((path, Err(e))) => {
                        outcome.processed += 1;
                        outcome.errors.push(BatchError {
                            path,
                            message: e.to_string(),
                        });
                    }
                    Err(join_error) => {
                        outcome.errors.push(BatchError {
                            path: PathBuf::new(),
                            message: format!("indexing task failed: {join_error}"),
                        });
                    }
                }
            }
        }

        if !outcome.errors.is_empty() {
            tracing::warn!(
                "[engine] batch completed with {} file errors",
                outcome.errors.len()
            );
        }
        outcome
    }

    /// Index one file end to end.
    pub async fn index_file(&self, path: &Path) -> IndexResult<IndexOutcome> {
        self.ensure_live()?;
        ingest_file(&self.core, path).await
    }

    /// Re-index a changed file. When the stored checksum matches the
    /// current content the update is a no-op (`Unchanged`).
    pub async fn update_file(&self, path: &Path) -> IndexResult<IndexOutcome> {
        self.ensure_live()?;
        tokio::fs::metadata(path)
            .await
            .map_err(|_| IndexError::PathNotFound {
                path: path.to_path_buf(),
            })?;

        if let Some(info) = self.core.file_index.get_file_info(path) {
            if self.core.file_index.is_indexed(path) {
                if let Ok(content) = tokio::fs::read_to_string(path).await {
                    if info.matches_content(&content) {
                        debug_event!("engine", "unchanged (checksum match) {}", path.display());
                        return Ok(IndexOutcome::Unchanged);
                    }
                }
            }
            self.core.symbol_index.remove_file_symbols(path);
            self.core.file_index.remove_file(path);
        }
        ingest_file(&self.core, path).await
    }

    /// Drop a file from both indexes. Returns whether it was present.
    pub fn remove_file(&self, path: &Path) -> IndexResult<bool> {
        self.ensure_live()?;
        self.core.symbol_index.remove_file_symbols(path);
        Ok(self.core.file_index.remove_file(path))
    }

    /// Whether a file needs (re)indexing. A stat failure for a
    /// still-indexed path reports true so cleanup can run.
    pub async fn needs_reindexing(&self, path: &Path) -> IndexResult<bool> {
        self.ensure_live()?;
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(self
                .core
                .file_index
                .needs_reindexing(path, mtime_millis(&metadata))),
            Err(_) => Ok(self.core.file_index.has_file(path)),
        }
    }

    pub fn is_indexed(&self, path: &Path) -> IndexResult<bool> {
        self.ensure_live()?;
        Ok(self.core.file_index.is_indexed(path))
    }

    /// Exact symbol lookup. Empty before the first successful index pass.
    pub fn find_symbol(
        &self,
        name: &str,
        max_results: Option<usize>,
    ) -> IndexResult<Vec<SymbolSearchResult>> {
        self.ensure_live()?;
        if !self.core.indexed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self.core.symbol_index.find_symbol(name, max_results))
    }

    pub fn find_symbols_by_kind(
        &self,
        kind: SymbolKind,
        max_results: Option<usize>,
    ) -> IndexResult<Vec<SymbolSearchResult>> {
        self.ensure_live()?;
        if !self.core.indexed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self.core.symbol_index.find_symbols_by_kind(kind, max_results))
    }

    pub fn search_symbols(
        &self,
        pattern: &str,
        options: &SearchOptions,
    ) -> IndexResult<Vec<SymbolSearchResult>> {
        self.ensure_live()?;
        if !self.core.indexed.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(self.core.symbol_index.search_symbols(pattern, options))
    }

    /// Index-wide stats; zeroed before the first successful index pass.
    pub fn get_stats(&self) -> IndexResult<IndexStats> {
        self.ensure_live()?;
        if !self.core.indexed.load(Ordering::SeqCst) {
            return Ok(IndexStats::default());
        }
        Ok(self.core.file_index.get_stats())
    }

    /// Empty both indexes. The engine stays usable; the next index pass
    /// rebuilds from scratch.
    pub fn clear(&self) -> IndexResult<()> {
        self.ensure_live()?;
        self.core.file_index.clear();
        self.core.symbol_index.clear();
        self.core.indexed.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Empty both indexes and refuse further operations. Idempotent.
    /// In-flight work is not cancelled; await outstanding operations
    /// before disposing for a clean shutdown.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.core.file_index.clear();
        self.core.symbol_index.clear();
        self.core.indexed.store(false, Ordering::SeqCst);
        debug_event!("engine", "disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Single-file ingest pipeline: stat, size gate, read, hash, parser
/// dispatch, extraction, index writes.
async fn ingest_file(core: &EngineCore, path: &Path) -> IndexResult<IndexOutcome> {
    match ingest_inner(core, path).await {
        Ok(outcome) => Ok(outcome),
        Err(e @ (IndexError::ParseFailed { .. } | IndexError::NoParser { .. })) => Err(e),
        Err(e) => Err(IndexError::IndexingFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

async fn ingest_inner(core: &EngineCore, path: &Path) -> IndexResult<IndexOutcome> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

    if metadata.len() > core.config.max_file_size {
        debug_event!("engine", "skipped oversized file {}", path.display());
        return Ok(IndexOutcome::Skipped);
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    let checksum = calculate_checksum(&content);
    let info = FileInfo::from_metadata(path, &metadata, checksum);

    core.file_index.add_file(info.clone());
    core.indexed.store(true, Ordering::SeqCst);

    let parser = core
        .registry
        .get_parser(&info.extension)
        .map_err(|e| IndexError::General(e.to_string()))?
        .ok_or_else(|| IndexError::NoParser {
            path: path.to_path_buf(),
        })?;

    let extracted = parser.parse(&content, path).and_then(|ast| {
        let symbols = parser.extract_symbols(ast.as_ref())?;
        let dependencies = parser.extract_dependencies(ast.as_ref())?;
        Ok((symbols, dependencies))
    });

    let (symbols, dependencies) = match extracted {
        Ok(parts) => parts,
        Err(parser_error) => {
            let reason = parser_error.to_string();
            core.file_index
                .set_file_parse_errors(path, vec![reason.clone()])?;
            return Err(IndexError::ParseFailed {
                path: path.to_path_buf(),
                reason,
            });
        }
    };

    core.file_index.set_file_symbols(path, symbols.clone())?;
    core.file_index.set_file_dependencies(path, dependencies)?;
    // Replace, never append: byFile must equal the last successful write.
    core.symbol_index.remove_file_symbols(path);
    core.symbol_index.add_symbols(symbols, &info);

    Ok(IndexOutcome::Indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::TypeScriptParser;
    use crate::parsing::registry::RegisterOptions;
    use std::fs;
    use tempfile::TempDir;

    fn engine_for(root: &Path) -> IndexEngine {
        let registry = Arc::new(ParserRegistry::new());
        registry
            .register(
                Arc::new(TypeScriptParser::new().unwrap()),
                RegisterOptions::default(),
            )
            .unwrap();
        IndexEngine::with_registry(IndexConfig::new(root), registry).unwrap()
    }

    #[test]
    fn test_construction_validates_config() {
        let err = IndexEngine::new(IndexConfig::new("")).unwrap_err();
        assert!(matches!(err, IndexError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_queries_before_first_index_are_empty() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_for(temp_dir.path());

        assert!(engine.find_symbol("anything", None).unwrap().is_empty());
        assert!(engine
            .search_symbols("x", &SearchOptions::default())
            .unwrap()
            .is_empty());
        assert_eq!(engine.get_stats().unwrap(), IndexStats::default());
    }

    #[tokio::test]
    async fn test_index_project_rejects_bad_roots() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_for(temp_dir.path());

        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            engine.index_project(Some(&missing)).await.unwrap_err(),
            IndexError::PathNotFound { .. }
        ));

        let file = temp_dir.path().join("f.ts");
        fs::write(&file, "export const x = 1;").unwrap();
        assert!(matches!(
            engine.index_project(Some(&file)).await.unwrap_err(),
            IndexError::NotADirectory { .. }
        ));
    }

    #[tokio::test]
    async fn test_index_file_without_parser_fails() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(ParserRegistry::new());
        let engine =
            IndexEngine::with_registry(IndexConfig::new(temp_dir.path()), registry).unwrap();

        let file = temp_dir.path().join("a.ts");
        fs::write(&file, "export const x = 1;").unwrap();

        let err = engine.index_file(&file).await.unwrap_err();
        assert!(matches!(err, IndexError::NoParser { .. }));
        // The file entry exists but is not indexed.
        assert!(!engine.is_indexed(&file).unwrap());
        assert!(engine.file_index().has_file(&file));
    }

    #[tokio::test]
    async fn test_oversized_file_skipped_at_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(ParserRegistry::new());
        registry
            .register(
                Arc::new(TypeScriptParser::new().unwrap()),
                RegisterOptions::default(),
            )
            .unwrap();
        let mut config = IndexConfig::new(temp_dir.path());
        // "const x=1;//" + padding to exactly 32 bytes parses fine.
        config.max_file_size = 32;
        let engine = IndexEngine::with_registry(config, registry).unwrap();

        let exact = temp_dir.path().join("exact.ts");
        let mut content = String::from("const x = 1; //");
        while content.len() < 32 {
            content.push('p');
        }
        fs::write(&exact, &content).unwrap();
        assert_eq!(
            engine.index_file(&exact).await.unwrap(),
            IndexOutcome::Indexed
        );

        let over = temp_dir.path().join("over.ts");
        fs::write(&over, format!("{content}p")).unwrap();
        assert_eq!(engine.index_file(&over).await.unwrap(), IndexOutcome::Skipped);
        assert!(!engine.file_index().has_file(&over));
    }

    #[tokio::test]
    async fn test_update_file_suppresses_unchanged_content() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_for(temp_dir.path());

        let file = temp_dir.path().join("a.ts");
        fs::write(&file, "export function foo(){}").unwrap();
        engine.index_file(&file).await.unwrap();

        assert_eq!(
            engine.update_file(&file).await.unwrap(),
            IndexOutcome::Unchanged
        );

        fs::write(&file, "export function qux(){}").unwrap();
        assert_eq!(engine.update_file(&file).await.unwrap(), IndexOutcome::Indexed);
        assert!(engine.find_symbol("foo", None).unwrap().is_empty());
        assert_eq!(engine.find_symbol("qux", None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dispose_guards_operations() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_for(temp_dir.path());
        let file = temp_dir.path().join("a.ts");
        fs::write(&file, "export const x = 1;").unwrap();
        engine.index_file(&file).await.unwrap();

        engine.dispose();
        engine.dispose();
        assert!(engine.is_disposed());

        assert!(matches!(
            engine.find_symbol("x", None).unwrap_err(),
            IndexError::Disposed { .. }
        ));
        assert!(matches!(
            engine.get_stats().unwrap_err(),
            IndexError::Disposed { .. }
        ));
        assert!(matches!(
            engine.index_file(&file).await.unwrap_err(),
            IndexError::Disposed { .. }
        ));
        assert!(matches!(
            engine.clear().unwrap_err(),
            IndexError::Disposed { .. }
        ));
    }

    #[tokio::test]
    async fn test_clear_then_reindex_restores_consistency() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_for(temp_dir.path());
        let file = temp_dir.path().join("a.ts");
        fs::write(&file, "export function foo(){}").unwrap();

        engine.index_file(&file).await.unwrap();
        engine.clear().unwrap();

        assert_eq!(engine.file_index().total_files(), 0);
        assert_eq!(engine.symbol_index().total_symbols(), 0);

        engine.index_file(&file).await.unwrap();
        assert_eq!(engine.find_symbol("foo", None).unwrap().len(), 1);
        assert_eq!(engine.get_stats().unwrap().total_files, 1);
    }

    #[tokio::test]
    async fn test_needs_reindexing_for_missing_file_tracks_index() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine_for(temp_dir.path());
        let ghost = temp_dir.path().join("ghost.ts");

        // Unknown and absent: nothing to do.
        assert!(!engine.needs_reindexing(&ghost).await.unwrap());

        fs::write(&ghost, "export const x = 1;").unwrap();
        engine.index_file(&ghost).await.unwrap();
        assert!(!engine.needs_reindexing(&ghost).await.unwrap());

        fs::remove_file(&ghost).unwrap();
        // Still in the index: flag for cleanup.
        assert!(engine.needs_reindexing(&ghost).await.unwrap());
    }
}
