//! Query-optimized symbol index.
//!
//! Four secondary views (by name, kind, file, and scope key) over one
//! logical entry set. The views are kept strictly consistent: every
//! insertion fans out to all applicable views, every removal cleans all
//! of them and deletes empty buckets. Entries carry a value-copy of the
//! file's `FileInfo` rather than a back-pointer into the file index.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::types::{Dependency, Scope, Symbol, SymbolKind};

use super::file_info::FileInfo;

/// One indexed symbol with its file's metadata.
#[derive(Debug, Clone)]
pub struct SymbolIndexEntry {
    pub symbol: Symbol,
    pub file_info: FileInfo,
    pub dependencies: Vec<Dependency>,
}

/// Options for `search_symbols`.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub fuzzy: bool,
    pub max_results: usize,
    pub include_file_info: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            fuzzy: true,
            max_results: 100,
            include_file_info: true,
        }
    }
}

/// A scored search hit. Exact lookups uniformly score 1.0.
#[derive(Debug, Clone)]
pub struct SymbolSearchResult {
    pub symbol: Symbol,
    pub file_info: Option<FileInfo>,
    pub score: f32,
}

/// Symbol-index statistics: totals plus two histograms.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolStats {
    pub total_symbols: usize,
    pub symbols_by_type: HashMap<String, usize>,
    pub symbols_by_file: HashMap<PathBuf, usize>,
}

type Entry = Arc<SymbolIndexEntry>;

#[derive(Default)]
struct SymbolIndexInner {
    by_name: HashMap<String, Vec<Entry>>,
    by_kind: HashMap<SymbolKind, Vec<Entry>>,
    by_file: HashMap<PathBuf, Vec<Entry>>,
    by_scope: HashMap<String, Vec<Entry>>,
}

impl SymbolIndexInner {
    fn insert(&mut self, entry: Entry) {
        self.by_name
            .entry(entry.symbol.name.clone())
            .or_default()
            .push(Arc::clone(&entry));
        self.by_kind
            .entry(entry.symbol.kind)
            .or_default()
            .push(Arc::clone(&entry));
        self.by_file
            .entry(entry.file_info.file_path.clone())
            .or_default()
            .push(Arc::clone(&entry));
        if let Some(scope) = &entry.symbol.scope {
            self.by_scope
                .entry(scope.key())
                .or_default()
                .push(entry);
        }
    }

    /// Drop entries matching the predicate from every view, deleting
    /// now-empty buckets. Returns how many logical entries were removed.
    fn prune(&mut self, predicate: impl Fn(&SymbolIndexEntry) -> bool) -> usize {
        let mut removed = 0;
        self.by_name.retain(|_, bucket| {
            bucket.retain(|entry| {
                let drop = predicate(entry);
                if drop {
                    removed += 1;
                }
                !drop
            });
            !bucket.is_empty()
        });
        self.by_kind.retain(|_, bucket| {
            bucket.retain(|entry| !predicate(entry));
            !bucket.is_empty()
        });
        self.by_file.retain(|_, bucket| {
            bucket.retain(|entry| !predicate(entry));
            !bucket.is_empty()
        });
        self.by_scope.retain(|_, bucket| {
            bucket.retain(|entry| !predicate(entry));
            !bucket.is_empty()
        });
        removed
    }
}

/// Secondary symbol index over the file index's contents.
pub struct SymbolIndex {
    inner: RwLock<SymbolIndexInner>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SymbolIndexInner::default()),
        }
    }

    pub fn add_symbol(&self, entry: SymbolIndexEntry) {
        self.inner.write().insert(Arc::new(entry));
    }

    /// Insert a file's symbols, each carrying a value-copy of the file's
    /// metadata.
    pub fn add_symbols(&self, symbols: Vec<Symbol>, file_info: &FileInfo) {
        let mut inner = self.inner.write();
        for symbol in symbols {
            inner.insert(Arc::new(SymbolIndexEntry {
                symbol,
                file_info: file_info.clone(),
                dependencies: Vec::new(),
            }));
        }
    }

    /// Remove entries matching `(name, file_path)` from every view.
    pub fn remove_symbol(&self, name: &str, file_path: &Path) -> usize {
        self.inner.write().prune(|entry| {
            entry.symbol.name == name && entry.file_info.file_path == file_path
        })
    }

    /// Remove every entry belonging to a file from all four views.
    pub fn remove_file_symbols(&self, file_path: &Path) -> usize {
        self.inner
            .write()
            .prune(|entry| entry.file_info.file_path == file_path)
    }

    /// Exact by-name lookup; every hit scores 1.0.
    pub fn find_symbol(&self, name: &str, max_results: Option<usize>) -> Vec<SymbolSearchResult> {
        let inner = self.inner.read();
        let bucket = inner.by_name.get(name);
        clip(bucket, max_results)
    }

    pub fn find_symbols_by_kind(
        &self,
        kind: SymbolKind,
        max_results: Option<usize>,
    ) -> Vec<SymbolSearchResult> {
        let inner = self.inner.read();
        clip(inner.by_kind.get(&kind), max_results)
    }

    /// Exact-key scope lookup using the flattened root-to-leaf key.
    pub fn find_symbols_in_scope(
        &self,
        scope: &Scope,
        max_results: Option<usize>,
    ) -> Vec<SymbolSearchResult> {
        let inner = self.inner.read();
        clip(inner.by_scope.get(&scope.key()), max_results)
    }

    /// Pattern search over symbol names.
    ///
    /// Fuzzy mode scores character subsequences; non-fuzzy mode scores
    /// containment (1.0 exact, 0.8 prefix, 0.6 substring). Results are
    /// sorted by descending score, stable within equal scores.
    pub fn search_symbols(&self, pattern: &str, options: &SearchOptions) -> Vec<SymbolSearchResult> {
        if options.max_results == 0 {
            return Vec::new();
        }
        let folded_pattern = fold_case(pattern, options.case_sensitive);

        let inner = self.inner.read();
        let mut names: Vec<&String> = inner.by_name.keys().collect();
        names.sort();

        let mut results = Vec::new();
        'names: for name in names {
            let folded_name = fold_case(name, options.case_sensitive);
            let score = if options.fuzzy {
                fuzzy_score(&folded_pattern, &folded_name)
            } else {
                containment_score(&folded_pattern, &folded_name)
            };
            if score <= 0.0 {
                continue;
            }
            // Buckets cannot be empty by construction.
            if let Some(bucket) = inner.by_name.get(name) {
                for entry in bucket {
                    results.push(to_result(entry, score, options.include_file_info));
                    if results.len() >= options.max_results {
                        break 'names;
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results
    }

    pub fn total_symbols(&self) -> usize {
        self.inner
            .read()
            .by_name
            .values()
            .map(|bucket| bucket.len())
            .sum()
    }

    pub fn get_stats(&self) -> SymbolStats {
        let inner = self.inner.read();
        let mut stats = SymbolStats::default();
        for bucket in inner.by_name.values() {
            stats.total_symbols += bucket.len();
        }
        for (kind, bucket) in &inner.by_kind {
            stats
                .symbols_by_type
                .insert(kind.tag().to_string(), bucket.len());
        }
        for (path, bucket) in &inner.by_file {
            stats.symbols_by_file.insert(path.clone(), bucket.len());
        }
        stats
    }

    /// Symbols recorded for one file, in insertion order.
    pub fn file_symbols(&self, file_path: &Path) -> Vec<Symbol> {
        self.inner
            .read()
            .by_file
            .get(file_path)
            .map(|bucket| bucket.iter().map(|e| e.symbol.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.by_name.clear();
        inner.by_kind.clear();
        inner.by_file.clear();
        inner.by_scope.clear();
    }
}

impl Default for SymbolIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn fold_case(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

fn to_result(entry: &Entry, score: f32, include_file_info: bool) -> SymbolSearchResult {
    SymbolSearchResult {
        symbol: entry.symbol.clone(),
        file_info: include_file_info.then(|| entry.file_info.clone()),
        score,
    }
}

fn clip(bucket: Option<&Vec<Entry>>, max_results: Option<usize>) -> Vec<SymbolSearchResult> {
    let Some(bucket) = bucket else {
        return Vec::new();
    };
    let limit = max_results.unwrap_or(usize::MAX);
    bucket
        .iter()
        .take(limit)
        .map(|entry| to_result(entry, 1.0, true))
        .collect()
}

/// Character-subsequence match. The pattern matches iff every pattern
/// character is consumed walking the target left to right; the score is
/// `matched / max(|pattern|, |target|)`. An empty pattern trivially
/// matches with score 0.1.
fn fuzzy_score(pattern: &str, target: &str) -> f32 {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    if pattern_chars.is_empty() {
        return 0.1;
    }
    let target_len = target.chars().count();
    let mut matched = 0usize;
    for c in target.chars() {
        if matched < pattern_chars.len() && pattern_chars[matched] == c {
            matched += 1;
        }
    }
    if matched == pattern_chars.len() {
        matched as f32 / pattern_chars.len().max(target_len) as f32
    } else {
        0.0
    }
}

/// Containment tiers: exact 1.0, prefix 0.8, substring 0.6, else no
/// match.
fn containment_score(pattern: &str, target: &str) -> f32 {
    if !target.contains(pattern) {
        return 0.0;
    }
    if target == pattern {
        1.0
    } else if target.starts_with(pattern) {
        0.8
    } else {
        0.6
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, Range, ScopeKind, ScopeSegment};

    fn file_info(path: &str) -> FileInfo {
        FileInfo::new(path, 1_000, 10, "")
    }

    fn symbol(name: &str, kind: SymbolKind, path: &str) -> Symbol {
        Symbol::new(name, kind, Location::new(path, Range::default()))
    }

    fn scoped_symbol(name: &str, kind: SymbolKind, path: &str, scope: Scope) -> Symbol {
        symbol(name, kind, path).with_scope(scope)
    }

    fn class_scope(name: &str) -> Scope {
        Scope::from_segments(vec![ScopeSegment::new(ScopeKind::Class, name)])
    }

    #[test]
    fn test_insert_fans_out_to_all_views() {
        let index = SymbolIndex::new();
        let info = file_info("/ws/a.ts");
        index.add_symbols(
            vec![
                scoped_symbol("run", SymbolKind::Method, "/ws/a.ts", class_scope("App")),
                symbol("App", SymbolKind::Class, "/ws/a.ts"),
            ],
            &info,
        );

        assert_eq!(index.total_symbols(), 2);
        assert_eq!(index.find_symbol("run", None).len(), 1);
        assert_eq!(index.find_symbols_by_kind(SymbolKind::Class, None).len(), 1);
        assert_eq!(index.file_symbols(Path::new("/ws/a.ts")).len(), 2);
        assert_eq!(
            index.find_symbols_in_scope(&class_scope("App"), None).len(),
            1
        );
    }

    #[test]
    fn test_scope_fanout_only_with_scope() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![symbol("plain", SymbolKind::Function, "/ws/a.ts")],
            &file_info("/ws/a.ts"),
        );
        assert!(index.inner.read().by_scope.is_empty());
    }

    #[test]
    fn test_remove_symbol_cleans_every_view() {
        let index = SymbolIndex::new();
        let info = file_info("/ws/a.ts");
        index.add_symbols(
            vec![
                scoped_symbol("run", SymbolKind::Method, "/ws/a.ts", class_scope("App")),
                symbol("other", SymbolKind::Function, "/ws/a.ts"),
            ],
            &info,
        );

        assert_eq!(index.remove_symbol("run", Path::new("/ws/a.ts")), 1);
        assert_eq!(index.total_symbols(), 1);

        let inner = index.inner.read();
        assert!(!inner.by_name.contains_key("run"));
        assert!(!inner.by_kind.contains_key(&SymbolKind::Method));
        assert!(inner.by_scope.is_empty());
        // The file bucket still holds the other symbol.
        assert_eq!(inner.by_file[Path::new("/ws/a.ts")].len(), 1);
    }

    #[test]
    fn test_remove_file_symbols_cascades() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![
                symbol("a1", SymbolKind::Function, "/ws/a.ts"),
                scoped_symbol("a2", SymbolKind::Method, "/ws/a.ts", class_scope("A")),
            ],
            &file_info("/ws/a.ts"),
        );
        index.add_symbols(
            vec![symbol("b1", SymbolKind::Function, "/ws/b.ts")],
            &file_info("/ws/b.ts"),
        );

        assert_eq!(index.remove_file_symbols(Path::new("/ws/a.ts")), 2);
        assert_eq!(index.total_symbols(), 1);

        let inner = index.inner.read();
        for bucket in inner.by_name.values() {
            assert!(bucket
                .iter()
                .all(|e| e.file_info.file_path != Path::new("/ws/a.ts")));
        }
        assert!(!inner.by_file.contains_key(Path::new("/ws/a.ts")));
        assert!(inner.by_scope.is_empty());
    }

    #[test]
    fn test_exact_lookup_scores_one() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![symbol("target", SymbolKind::Function, "/ws/a.ts")],
            &file_info("/ws/a.ts"),
        );

        let results = index.find_symbol("target", None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 1.0);
        assert!(results[0].file_info.is_some());
        assert!(index.find_symbol("missing", None).is_empty());
    }

    #[test]
    fn test_max_results_clip() {
        let index = SymbolIndex::new();
        for i in 0..5 {
            index.add_symbols(
                vec![symbol("dup", SymbolKind::Function, &format!("/ws/f{i}.ts"))],
                &file_info(&format!("/ws/f{i}.ts")),
            );
        }

        assert_eq!(index.find_symbol("dup", Some(3)).len(), 3);
        assert_eq!(index.find_symbol("dup", None).len(), 5);
        assert_eq!(
            index.find_symbols_by_kind(SymbolKind::Function, Some(2)).len(),
            2
        );
    }

    #[test]
    fn test_fuzzy_search_ranking() {
        // Scenario: Calculator, Calendar, Cal all match "Cal"; scores
        // descend by length ratio with Cal highest.
        let index = SymbolIndex::new();
        let info = file_info("/ws/a.ts");
        index.add_symbols(
            vec![
                symbol("Calculator", SymbolKind::Class, "/ws/a.ts"),
                symbol("Calendar", SymbolKind::Class, "/ws/a.ts"),
                symbol("Cal", SymbolKind::Class, "/ws/a.ts"),
            ],
            &info,
        );

        let results = index.search_symbols("Cal", &SearchOptions::default());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].symbol.name, "Cal");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].symbol.name, "Calendar");
        assert_eq!(results[2].symbol.name, "Calculator");
        assert!(results[1].score > results[2].score);
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn test_fuzzy_subsequence_must_consume_pattern() {
        assert!(fuzzy_score("cal", "calculator") > 0.0);
        assert!(fuzzy_score("clt", "calculator") > 0.0);
        assert_eq!(fuzzy_score("calz", "calculator"), 0.0);
        assert_eq!(fuzzy_score("", "anything"), 0.1);

        // Scores stay in [0, 1].
        let score = fuzzy_score("abc", "abc");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_non_fuzzy_containment_tiers() {
        assert_eq!(containment_score("exact", "exact"), 1.0);
        assert_eq!(containment_score("pre", "prefix"), 0.8);
        assert_eq!(containment_score("fix", "prefix"), 0.6);
        assert_eq!(containment_score("zzz", "prefix"), 0.0);

        let index = SymbolIndex::new();
        index.add_symbols(
            vec![
                symbol("loadConfig", SymbolKind::Function, "/ws/a.ts"),
                symbol("load", SymbolKind::Function, "/ws/a.ts"),
                symbol("reload", SymbolKind::Function, "/ws/a.ts"),
            ],
            &file_info("/ws/a.ts"),
        );

        let options = SearchOptions {
            fuzzy: false,
            ..SearchOptions::default()
        };
        let results = index.search_symbols("load", &options);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].symbol.name, "load");
        assert_eq!(results[1].symbol.name, "loadConfig");
        assert_eq!(results[2].symbol.name, "reload");
    }

    #[test]
    fn test_case_sensitivity_option() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![symbol("Widget", SymbolKind::Class, "/ws/a.ts")],
            &file_info("/ws/a.ts"),
        );

        let default = SearchOptions::default();
        assert_eq!(index.search_symbols("widget", &default).len(), 1);

        let sensitive = SearchOptions {
            case_sensitive: true,
            ..SearchOptions::default()
        };
        assert!(index.search_symbols("widget", &sensitive).is_empty());
        assert_eq!(index.search_symbols("Widget", &sensitive).len(), 1);
    }

    #[test]
    fn test_max_results_zero_returns_empty() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![symbol("x", SymbolKind::Variable, "/ws/a.ts")],
            &file_info("/ws/a.ts"),
        );
        let options = SearchOptions {
            max_results: 0,
            ..SearchOptions::default()
        };
        assert!(index.search_symbols("x", &options).is_empty());
    }

    #[test]
    fn test_include_file_info_option() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![symbol("x", SymbolKind::Variable, "/ws/a.ts")],
            &file_info("/ws/a.ts"),
        );
        let options = SearchOptions {
            include_file_info: false,
            ..SearchOptions::default()
        };
        let results = index.search_symbols("x", &options);
        assert!(results[0].file_info.is_none());
    }

    #[test]
    fn test_stats_histograms() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![
                symbol("a", SymbolKind::Function, "/ws/a.ts"),
                symbol("b", SymbolKind::Function, "/ws/a.ts"),
                symbol("C", SymbolKind::Class, "/ws/a.ts"),
            ],
            &file_info("/ws/a.ts"),
        );
        index.add_symbols(
            vec![symbol("d", SymbolKind::Function, "/ws/b.ts")],
            &file_info("/ws/b.ts"),
        );

        let stats = index.get_stats();
        assert_eq!(stats.total_symbols, 4);
        assert_eq!(stats.symbols_by_type["function"], 3);
        assert_eq!(stats.symbols_by_type["class"], 1);
        assert_eq!(stats.symbols_by_file[Path::new("/ws/a.ts")], 3);
        assert_eq!(stats.symbols_by_file[Path::new("/ws/b.ts")], 1);
    }

    #[test]
    fn test_clear() {
        let index = SymbolIndex::new();
        index.add_symbols(
            vec![symbol("x", SymbolKind::Variable, "/ws/a.ts")],
            &file_info("/ws/a.ts"),
        );
        index.clear();

        assert_eq!(index.total_symbols(), 0);
        let inner = index.inner.read();
        assert!(inner.by_name.is_empty());
        assert!(inner.by_kind.is_empty());
        assert!(inner.by_file.is_empty());
        assert!(inner.by_scope.is_empty());
    }
}
