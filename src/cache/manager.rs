//! Named-cache registry with global stats aggregation and warmup.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::{CacheError, CacheResult};

use super::memory::{CacheEvent, CacheOptions, MemoryCache};

/// Outcome of a warmup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    pub loaded: usize,
    pub failed: usize,
}

/// Aggregated statistics across every live cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalCacheStats {
    pub caches: usize,
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_used: usize,
    pub hit_rate: f64,
}

type GlobalListener<K> = Arc<dyn Fn(&str, &CacheEvent<K>) + Send + Sync>;

/// Registry of named `MemoryCache` instances.
///
/// The manager owns its caches: `dispose` tears all of them down, and a
/// disposed manager refuses to create new ones.
pub struct CacheManager<K, V> {
    caches: RwLock<HashMap<String, Arc<MemoryCache<K, V>>>>,
    global_listeners: Arc<RwLock<HashMap<usize, GlobalListener<K>>>>,
    next_listener_id: AtomicUsize,
    disposed: AtomicBool,
}

impl<K, V> CacheManager<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            global_listeners: Arc::new(RwLock::new(HashMap::new())),
            next_listener_id: AtomicUsize::new(1),
            disposed: AtomicBool::new(false),
        }
    }

    /// Create a named cache. Fails if the name is taken or the manager is
    /// disposed.
    pub fn create_cache(
        &self,
        name: &str,
        options: Option<CacheOptions>,
    ) -> CacheResult<Arc<MemoryCache<K, V>>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(CacheError::Disposed);
        }
        let mut caches = self.caches.write();
        if caches.contains_key(name) {
            return Err(CacheError::DuplicateCache(name.to_string()));
        }

        let cache = Arc::new(MemoryCache::new(options.unwrap_or_default()));

        // Forward every cache event to the manager's global listeners.
        // The cache's own dispatch already isolates listener panics.
        let globals = Arc::clone(&self.global_listeners);
        let cache_name = name.to_string();
        cache.add_listener(move |event| {
            for listener in globals.read().values() {
                listener(&cache_name, event);
            }
        });

        caches.insert(name.to_string(), Arc::clone(&cache));
        Ok(cache)
    }

    pub fn get_cache(&self, name: &str) -> Option<Arc<MemoryCache<K, V>>> {
        self.caches.read().get(name).cloned()
    }

    pub fn has_cache(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Dispose and unregister one cache. Returns whether it existed.
    pub fn delete_cache(&self, name: &str) -> bool {
        let removed = self.caches.write().remove(name);
        if let Some(cache) = removed {
            cache.dispose();
            true
        } else {
            false
        }
    }

    /// Dispose and unregister several caches; returns how many existed.
    pub fn delete_caches(&self, names: &[&str]) -> usize {
        names.iter().filter(|name| self.delete_cache(name)).count()
    }

    pub fn list_caches(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear_cache(&self, name: &str) -> CacheResult<()> {
        match self.get_cache(name) {
            Some(cache) => {
                cache.clear();
                Ok(())
            }
            None => Err(CacheError::CacheNotFound(name.to_string())),
        }
    }

    /// Clear several caches; returns how many existed.
    pub fn clear_caches(&self, names: &[&str]) -> usize {
        names
            .iter()
            .filter(|name| self.clear_cache(name).is_ok())
            .count()
    }

    pub fn clear_all(&self) {
        for cache in self.caches.read().values() {
            cache.clear();
        }
    }

    /// Pre-populate a cache from a data source. Entries rejected by the
    /// cache (e.g. because it was disposed concurrently) count as failed.
    pub fn warmup_cache(
        &self,
        name: &str,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> CacheResult<WarmupReport> {
        let cache = self
            .get_cache(name)
            .ok_or_else(|| CacheError::CacheNotFound(name.to_string()))?;

        let mut report = WarmupReport::default();
        for (key, value) in entries {
            if cache.set(key, value) {
                report.loaded += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    pub fn get_global_stats(&self) -> GlobalCacheStats {
        let caches = self.caches.read();
        let mut global = GlobalCacheStats {
            caches: caches.len(),
            ..GlobalCacheStats::default()
        };
        for cache in caches.values() {
            let stats = cache.get_stats();
            global.hits += stats.hits;
            global.misses += stats.misses;
            global.entries += stats.size;
            global.memory_used += stats.memory_used;
        }
        let lookups = global.hits + global.misses;
        if lookups > 0 {
            global.hit_rate = global.hits as f64 / lookups as f64;
        }
        global
    }

    pub fn add_global_event_listener(
        &self,
        listener: impl Fn(&str, &CacheEvent<K>) + Send + Sync + 'static,
    ) -> usize {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.global_listeners.write().insert(id, Arc::new(listener));
        id
    }

    pub fn remove_global_event_listener(&self, id: usize) -> bool {
        self.global_listeners.write().remove(&id).is_some()
    }

    /// Dispose every cache and refuse further creation. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut caches = self.caches.write();
        for cache in caches.values() {
            cache.dispose();
        }
        caches.clear();
        self.global_listeners.write().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<K, V> Default for CacheManager<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn manager() -> CacheManager<String, u32> {
        CacheManager::new()
    }

    #[test]
    fn test_create_and_lookup() {
        let manager = manager();
        manager.create_cache("symbols", None).unwrap();

        assert!(manager.has_cache("symbols"));
        assert!(manager.get_cache("symbols").is_some());
        assert!(!manager.has_cache("missing"));
        assert_eq!(manager.list_caches(), vec!["symbols"]);
    }

    #[test]
    fn test_duplicate_name_fails() {
        let manager = manager();
        manager.create_cache("ast", None).unwrap();
        let err = manager.create_cache("ast", None).unwrap_err();
        assert!(matches!(err, CacheError::DuplicateCache(name) if name == "ast"));
    }

    #[test]
    fn test_delete_cache_disposes() {
        let manager = manager();
        let cache = manager.create_cache("tmp", None).unwrap();
        cache.set("a".into(), 1);

        assert!(manager.delete_cache("tmp"));
        assert!(!manager.delete_cache("tmp"));
        assert!(cache.is_disposed());
    }

    #[test]
    fn test_warmup() {
        let manager = manager();
        manager.create_cache("warm", None).unwrap();

        let report = manager
            .warmup_cache("warm", vec![("a".to_string(), 1), ("b".to_string(), 2)])
            .unwrap();
        assert_eq!(report, WarmupReport { loaded: 2, failed: 0 });
        assert_eq!(manager.get_cache("warm").unwrap().get(&"a".to_string()), Some(1));

        assert!(matches!(
            manager.warmup_cache("missing", vec![]),
            Err(CacheError::CacheNotFound(_))
        ));
    }

    #[test]
    fn test_global_stats_aggregate() {
        let manager = manager();
        let a = manager
            .create_cache(
                "a",
                Some(CacheOptions {
                    enable_stats: true,
                    ..CacheOptions::default()
                }),
            )
            .unwrap();
        let b = manager
            .create_cache(
                "b",
                Some(CacheOptions {
                    enable_stats: true,
                    ..CacheOptions::default()
                }),
            )
            .unwrap();

        a.set("x".into(), 1);
        a.get(&"x".to_string());
        b.get(&"missing".to_string());

        let stats = manager.get_global_stats();
        assert_eq!(stats.caches, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_global_event_listener() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.add_global_event_listener(move |cache_name, event| {
            sink.lock().push((cache_name.to_string(), event.kind));
        });

        let cache = manager.create_cache("events", None).unwrap();
        cache.set("k".into(), 9);

        let observed = seen.lock().clone();
        assert!(!observed.is_empty());
        assert!(observed.iter().all(|(name, _)| name == "events"));
    }

    #[test]
    fn test_dispose_tears_down_everything() {
        let manager = manager();
        let cache = manager.create_cache("a", None).unwrap();
        manager.dispose();
        manager.dispose();

        assert!(manager.is_disposed());
        assert!(cache.is_disposed());
        assert!(manager.list_caches().is_empty());
        assert!(matches!(manager.create_cache("b", None), Err(CacheError::Disposed)));
    }

    #[test]
    fn test_clear_all_keeps_caches_alive() {
        let manager = manager();
        let a = manager.create_cache("a", None).unwrap();
        a.set("x".into(), 1);

        manager.clear_all();
        assert!(manager.has_cache("a"));
        assert_eq!(a.len(), 0);
    }
}
