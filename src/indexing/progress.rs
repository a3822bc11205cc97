//! Batch progress reporting and index statistics.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Snapshot of index-wide statistics.
///
/// `index_size` is an estimated byte footprint, a coarse heuristic for
/// capacity reporting; only its sign and monotonicity are meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_files: usize,
    pub indexed_files: usize,
    pub total_symbols: usize,
    pub total_dependencies: usize,
    pub last_updated: u64,
    pub index_size: usize,
}

/// Progress reported after each file in a batch completes, success or
/// failure.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub current_file: PathBuf,
    pub percentage: f32,
    pub errors: Vec<String>,
}

/// Callback invoked with batch progress.
pub type ProgressCallback = Arc<dyn Fn(&BatchProgress) + Send + Sync>;

/// Options for `batch_index_files`.
#[derive(Clone, Default)]
pub struct BatchOptions {
    /// Parallelism cap; defaults to the engine configuration.
    pub concurrency: Option<usize>,
    /// Files per chunk; defaults to 10.
    pub batch_size: Option<usize>,
    pub progress: Option<ProgressCallback>,
}

/// One failed file inside a batch.
#[derive(Debug)]
pub struct BatchError {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a batch run. Per-file failures never abort the batch; they
/// are collected here.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub processed: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: Vec<BatchError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default_is_zeroed() {
        let stats = IndexStats::default();
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.total_symbols, 0);
        assert_eq!(stats.index_size, 0);
    }

    #[test]
    fn test_batch_outcome_default() {
        let outcome = BatchOutcome::default();
        assert_eq!(outcome.processed, 0);
        assert!(outcome.errors.is_empty());
    }
}
