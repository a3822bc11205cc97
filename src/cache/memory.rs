//! Bounded key/value store with TTL, stats, events, and a pluggable
//! eviction strategy.
//!
//! The cache exclusively owns stored values: handing a value to `set`
//! transfers ownership until eviction, expiration, or explicit delete.
//! All mutations are serialized behind one lock; listeners run outside it.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::strategy::{EvictionPolicy, EvictionStrategy};

/// Milliseconds since `UNIX_EPOCH`.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A stored entry plus the metadata the strategies inspect.
#[derive(Debug, Clone)]
pub struct CacheItem<V> {
    pub value: V,
    pub created_at: u64,
    pub last_accessed_at: u64,
    pub access_count: u64,
    pub expires_at: Option<u64>,
    pub size_hint: usize,
}

impl<V> CacheItem<V> {
    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Construction options for `MemoryCache`.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Entry-count capacity; reaching it triggers one eviction per insert.
    pub max_size: usize,
    /// Estimated-byte budget across all stored values.
    pub max_memory: usize,
    /// Applied when `set` is called without an explicit TTL. Zero disables.
    pub default_ttl: Duration,
    pub eviction_policy: EvictionPolicy,
    pub enable_stats: bool,
    /// Interval of the background expiration sweep. Zero disables.
    pub cleanup_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_memory: 50 * 1024 * 1024,
            default_ttl: Duration::ZERO,
            eviction_policy: EvictionPolicy::Lru,
            enable_stats: false,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Event stream vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheEventKind {
    Set,
    Get,
    Delete,
    Evict,
    Expire,
    Clear,
    Hit,
    Miss,
}

/// A cache lifecycle event. `key` is absent for whole-cache events.
#[derive(Debug, Clone)]
pub struct CacheEvent<K> {
    pub kind: CacheEventKind,
    pub key: Option<K>,
    pub timestamp: u64,
}

type Listener<K> = Arc<dyn Fn(&CacheEvent<K>) + Send + Sync>;
type ListenerMap<K> = RwLock<HashMap<usize, Listener<K>>>;

/// Point-in-time statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub memory_used: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct StatCounters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

struct CacheInner<K, V> {
    items: IndexMap<K, CacheItem<V>>,
    strategy: Box<dyn EvictionStrategy<K, V>>,
    memory_used: usize,
    counters: StatCounters,
    enable_stats: bool,
    disposed: bool,
}

/// Bounded in-memory cache with a pluggable eviction strategy.
pub struct MemoryCache<K, V> {
    inner: Arc<Mutex<CacheInner<K, V>>>,
    listeners: Arc<ListenerMap<K>>,
    next_listener_id: AtomicUsize,
    options: CacheOptions,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<K, V> std::fmt::Debug for MemoryCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").finish_non_exhaustive()
    }
}

impl<K, V> MemoryCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Serialize + Send + Sync + 'static,
{
    pub fn new(options: CacheOptions) -> Self {
        let inner = Arc::new(Mutex::new(CacheInner {
            items: IndexMap::new(),
            strategy: options.eviction_policy.strategy(),
            memory_used: 0,
            counters: StatCounters::default(),
            enable_stats: options.enable_stats,
            disposed: false,
        }));
        let listeners: Arc<ListenerMap<K>> = Arc::new(RwLock::new(HashMap::new()));

        let cache = Self {
            inner,
            listeners,
            next_listener_id: AtomicUsize::new(1),
            options,
            sweeper: Mutex::new(None),
        };
        cache.spawn_sweeper();
        cache
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheOptions::default())
    }

    /// Background expiration sweep, active only when a TTL can exist and a
    /// tokio runtime is present.
    fn spawn_sweeper(&self) {
        let ttl_possible = self.options.default_ttl > Duration::ZERO
            || self.options.eviction_policy == EvictionPolicy::Ttl;
        if !ttl_possible
            || self.options.cleanup_interval.is_zero()
            || tokio::runtime::Handle::try_current().is_err()
        {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        let listeners = Arc::downgrade(&self.listeners);
        let interval = self.options.cleanup_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let (Some(inner), Some(listeners)) = (inner.upgrade(), listeners.upgrade())
                else {
                    break;
                };
                sweep_expired(&inner, &listeners);
            }
        });
        *self.sweeper.lock() = Some(handle);
    }

    /// Look up a value. Expired items are lazily deleted and reported as
    /// misses; hits refresh the access metadata and notify the strategy.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return None;
        }
        let now = now_millis();

        let expired = matches!(inner.items.get(key), Some(item) if item.is_expired(now));
        if expired {
            if let Some(item) = inner.items.shift_remove(key) {
                inner.memory_used = inner.memory_used.saturating_sub(item.size_hint);
            }
            inner.strategy.on_delete(key);
            if inner.enable_stats {
                inner.counters.expirations += 1;
                inner.counters.misses += 1;
            }
            drop(inner);
            self.emit(CacheEventKind::Expire, Some(key.clone()));
            self.emit(CacheEventKind::Miss, Some(key.clone()));
            return None;
        }

        let value = inner.items.get_mut(key).map(|item| {
            item.last_accessed_at = now;
            item.access_count += 1;
            item.value.clone()
        });

        match value {
            Some(value) => {
                inner.strategy.on_access(key);
                if inner.enable_stats {
                    inner.counters.hits += 1;
                }
                drop(inner);
                self.emit(CacheEventKind::Hit, Some(key.clone()));
                self.emit(CacheEventKind::Get, Some(key.clone()));
                Some(value)
            }
            None => {
                if inner.enable_stats {
                    inner.counters.misses += 1;
                }
                drop(inner);
                self.emit(CacheEventKind::Miss, Some(key.clone()));
                None
            }
        }
    }

    /// Store a value under the default TTL. Returns false on a disposed
    /// cache.
    pub fn set(&self, key: K, value: V) -> bool {
        self.set_with_ttl(key, value, None)
    }

    /// Store a value with an explicit TTL overriding the default.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) -> bool {
        let size_hint = serde_json::to_string(&value)
            .map(|json| json.len() * 2)
            .unwrap_or(std::mem::size_of::<V>());

        let mut evicted: Vec<K> = Vec::new();
        {
            let mut guard = self.inner.lock();
            if guard.disposed {
                return false;
            }
            let now = now_millis();

            // Re-inserting an existing key goes through a delete first so
            // the strategy re-ranks it as fresh.
            if let Some(prev) = guard.items.shift_remove(&key) {
                guard.memory_used = guard.memory_used.saturating_sub(prev.size_hint);
                guard.strategy.on_delete(&key);
            }

            if guard.items.len() >= self.options.max_size {
                let inner = &mut *guard;
                if let Some(victim) = inner.strategy.select_victim(&inner.items) {
                    if let Some(item) = inner.items.shift_remove(&victim) {
                        inner.memory_used = inner.memory_used.saturating_sub(item.size_hint);
                    }
                    inner.strategy.on_delete(&victim);
                    if inner.enable_stats {
                        inner.counters.evictions += 1;
                    }
                    evicted.push(victim);
                }
            }

            let effective_ttl = ttl
                .filter(|d| !d.is_zero())
                .or_else(|| (!self.options.default_ttl.is_zero()).then_some(self.options.default_ttl));

            let item = CacheItem {
                value,
                created_at: now,
                last_accessed_at: now,
                access_count: 0,
                expires_at: effective_ttl.map(|d| now + d.as_millis() as u64),
                size_hint,
            };
            guard.items.insert(key.clone(), item);
            guard.memory_used += size_hint;
            guard.strategy.on_set(&key);

            while guard.memory_used > self.options.max_memory && guard.items.len() > 1 {
                let inner = &mut *guard;
                let Some(victim) = inner.strategy.select_victim(&inner.items) else {
                    break;
                };
                if let Some(item) = inner.items.shift_remove(&victim) {
                    inner.memory_used = inner.memory_used.saturating_sub(item.size_hint);
                }
                inner.strategy.on_delete(&victim);
                if inner.enable_stats {
                    inner.counters.evictions += 1;
                }
                evicted.push(victim);
            }
        }

        for victim in evicted {
            self.emit(CacheEventKind::Evict, Some(victim));
        }
        self.emit(CacheEventKind::Set, Some(key));
        true
    }

    /// Non-mutating presence check (expired items report absent).
    pub fn has(&self, key: &K) -> bool {
        let inner = self.inner.lock();
        if inner.disposed {
            return false;
        }
        matches!(inner.items.get(key), Some(item) if !item.is_expired(now_millis()))
    }

    pub fn delete(&self, key: &K) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return false;
            }
            let removed = inner.items.shift_remove(key);
            if let Some(ref item) = removed {
                inner.memory_used = inner.memory_used.saturating_sub(item.size_hint);
                inner.strategy.on_delete(key);
            }
            removed.is_some()
        };
        if removed {
            self.emit(CacheEventKind::Delete, Some(key.clone()));
        }
        removed
    }

    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            inner.items.clear();
            inner.strategy.clear();
            inner.memory_used = 0;
        }
        self.emit(CacheEventKind::Clear, None);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mget(&self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    pub fn mset(&self, entries: Vec<(K, V)>) {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    pub fn get_stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let hits = inner.counters.hits;
        let misses = inner.counters.misses;
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: inner.counters.evictions,
            expirations: inner.counters.expirations,
            size: inner.items.len(),
            memory_used: inner.memory_used,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    pub fn add_listener(
        &self,
        listener: impl Fn(&CacheEvent<K>) + Send + Sync + 'static,
    ) -> usize {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().insert(id, Arc::new(listener));
        id
    }

    pub fn remove_listener(&self, id: usize) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Remove every expired item now. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        sweep_expired(&self.inner, &self.listeners)
    }

    /// Tear the cache down: stop the sweeper, drop all items, and refuse
    /// further operations. Idempotent.
    pub fn dispose(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        let mut inner = self.inner.lock();
        if inner.disposed {
            return;
        }
        inner.items.clear();
        inner.strategy.clear();
        inner.memory_used = 0;
        inner.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    fn emit(&self, kind: CacheEventKind, key: Option<K>) {
        let snapshot: Vec<Listener<K>> = self.listeners.read().values().cloned().collect();
        if snapshot.is_empty() {
            return;
        }
        let event = CacheEvent {
            kind,
            key,
            timestamp: now_millis(),
        };
        dispatch(&snapshot, &event);
    }
}

/// Listener exceptions are isolated: a panicking listener is logged and
/// never propagates into cache operations.
fn dispatch<K>(listeners: &[Listener<K>], event: &CacheEvent<K>) {
    for listener in listeners {
        if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            tracing::warn!("cache listener panicked; continuing");
        }
    }
}

fn sweep_expired<K, V>(inner: &Mutex<CacheInner<K, V>>, listeners: &ListenerMap<K>) -> usize
where
    K: Eq + Hash + Clone,
{
    let now = now_millis();
    let mut expired: Vec<K> = Vec::new();
    {
        let mut inner = inner.lock();
        if inner.disposed {
            return 0;
        }
        let keys: Vec<K> = inner
            .items
            .iter()
            .filter(|(_, item)| item.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            if let Some(item) = inner.items.shift_remove(&key) {
                inner.memory_used = inner.memory_used.saturating_sub(item.size_hint);
            }
            inner.strategy.on_delete(&key);
            if inner.enable_stats {
                inner.counters.expirations += 1;
            }
            expired.push(key);
        }
    }

    let snapshot: Vec<Listener<K>> = listeners.read().values().cloned().collect();
    if !snapshot.is_empty() {
        for key in &expired {
            let event = CacheEvent {
                kind: CacheEventKind::Expire,
                key: Some(key.clone()),
                timestamp: now,
            };
            dispatch(&snapshot, &event);
        }
    }
    expired.len()
}

impl<K, V> Drop for MemoryCache<K, V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}
