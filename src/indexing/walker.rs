//! Workspace discovery for batch indexing.
//!
//! Walks a directory tree and returns the deduplicated, sorted set of
//! absolute candidate paths: files whose extension is included by the
//! configuration and whose relative path escapes every exclude pattern.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::IndexConfig;
use crate::error::IndexResult;

use super::paths::{PathMatcher, should_index_file};

/// Walks directories to find source files to index.
pub struct FileWalker {
    config: Arc<IndexConfig>,
    matcher: PathMatcher,
}

impl FileWalker {
    pub fn new(config: Arc<IndexConfig>) -> IndexResult<Self> {
        let matcher = PathMatcher::new(&config.exclude_patterns)?;
        Ok(Self { config, matcher })
    }

    /// Discover candidate files under `root`. Unreadable entries are
    /// skipped rather than failing the walk.
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let mut found = BTreeSet::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if self.should_index(path) {
                found.insert(path.to_path_buf());
            }
        }
        found.into_iter().collect()
    }

    /// Whether a single path passes the extension and exclude filters.
    pub fn should_index(&self, path: &Path) -> bool {
        should_index_file(path, &self.config, &self.matcher)
    }

    /// Count files that would be indexed (useful for dry runs).
    pub fn count_files(&self, root: &Path) -> usize {
        self.discover(root).len()
    }
}
