//! Eviction policies for the memory cache.
//!
//! A strategy observes cache mutations through its hooks and, under
//! capacity pressure, selects the victim key. LRU keeps its own ordering
//! bookkeeping; the other policies derive the victim from item metadata.

use indexmap::IndexMap;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

use super::memory::{CacheItem, now_millis};

/// Policy variants selectable through `CacheOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    Lru,
    Lfu,
    Fifo,
    Ttl,
    Random,
}

impl EvictionPolicy {
    /// Instantiate the strategy object for this policy.
    pub fn strategy<K, V>(&self) -> Box<dyn EvictionStrategy<K, V>>
    where
        K: Eq + Hash + Clone + Send + 'static,
        V: Send + 'static,
    {
        match self {
            EvictionPolicy::Lru => Box::new(LruStrategy::new()),
            EvictionPolicy::Lfu => Box::new(LfuStrategy),
            EvictionPolicy::Fifo => Box::new(FifoStrategy),
            EvictionPolicy::Ttl => Box::new(TtlStrategy),
            EvictionPolicy::Random => Box::new(RandomStrategy),
        }
    }
}

/// Victim-selection policy with mutation hooks.
///
/// `select_victim` must not remove the key itself; the owning cache
/// performs the deletion and then calls `on_delete`.
pub trait EvictionStrategy<K, V>: Send {
    fn on_access(&mut self, key: &K);
    fn on_set(&mut self, key: &K);
    fn on_delete(&mut self, key: &K);
    fn select_victim(&mut self, items: &IndexMap<K, CacheItem<V>>) -> Option<K>;
    fn clear(&mut self);
}

/// Least-recently-used: an insertion-ordered key list where the back is
/// the most recently touched key and the front is the victim.
pub struct LruStrategy<K> {
    order: IndexMap<K, ()>,
}

impl<K: Eq + Hash + Clone> LruStrategy<K> {
    pub fn new() -> Self {
        Self {
            order: IndexMap::new(),
        }
    }

    fn touch(&mut self, key: &K) {
        self.order.shift_remove(key);
        self.order.insert(key.clone(), ());
    }
}

impl<K: Eq + Hash + Clone> Default for LruStrategy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EvictionStrategy<K, V> for LruStrategy<K>
where
    K: Eq + Hash + Clone + Send,
{
    fn on_access(&mut self, key: &K) {
        self.touch(key);
    }

    fn on_set(&mut self, key: &K) {
        self.touch(key);
    }

    fn on_delete(&mut self, key: &K) {
        self.order.shift_remove(key);
    }

    fn select_victim(&mut self, _items: &IndexMap<K, CacheItem<V>>) -> Option<K> {
        self.order.keys().next().cloned()
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

/// Least-frequently-used: smallest `access_count` wins, ties broken by
/// insertion order.
pub struct LfuStrategy;

impl<K, V> EvictionStrategy<K, V> for LfuStrategy
where
    K: Eq + Hash + Clone + Send,
{
    fn on_access(&mut self, _key: &K) {}
    fn on_set(&mut self, _key: &K) {}
    fn on_delete(&mut self, _key: &K) {}

    fn select_victim(&mut self, items: &IndexMap<K, CacheItem<V>>) -> Option<K> {
        let mut victim: Option<(&K, u64)> = None;
        for (key, item) in items {
            match victim {
                Some((_, count)) if item.access_count >= count => {}
                _ => victim = Some((key, item.access_count)),
            }
        }
        victim.map(|(key, _)| key.clone())
    }

    fn clear(&mut self) {}
}

/// First-in-first-out: smallest `created_at` wins, ties broken by
/// insertion order.
pub struct FifoStrategy;

impl<K, V> EvictionStrategy<K, V> for FifoStrategy
where
    K: Eq + Hash + Clone + Send,
{
    fn on_access(&mut self, _key: &K) {}
    fn on_set(&mut self, _key: &K) {}
    fn on_delete(&mut self, _key: &K) {}

    fn select_victim(&mut self, items: &IndexMap<K, CacheItem<V>>) -> Option<K> {
        let mut victim: Option<(&K, u64)> = None;
        for (key, item) in items {
            match victim {
                Some((_, created)) if item.created_at >= created => {}
                _ => victim = Some((key, item.created_at)),
            }
        }
        victim.map(|(key, _)| key.clone())
    }

    fn clear(&mut self) {}
}

/// Time-to-live: an already-expired key if one exists, otherwise the key
/// with the soonest expiry. Keys without expiry are never selected.
pub struct TtlStrategy;

impl<K, V> EvictionStrategy<K, V> for TtlStrategy
where
    K: Eq + Hash + Clone + Send,
{
    fn on_access(&mut self, _key: &K) {}
    fn on_set(&mut self, _key: &K) {}
    fn on_delete(&mut self, _key: &K) {}

    fn select_victim(&mut self, items: &IndexMap<K, CacheItem<V>>) -> Option<K> {
        let now = now_millis();
        let mut soonest: Option<(&K, u64)> = None;
        for (key, item) in items {
            let Some(expires_at) = item.expires_at else {
                continue;
            };
            if expires_at <= now {
                return Some(key.clone());
            }
            match soonest {
                Some((_, at)) if expires_at >= at => {}
                _ => soonest = Some((key, expires_at)),
            }
        }
        soonest.map(|(key, _)| key.clone())
    }

    fn clear(&mut self) {}
}

/// Uniformly random victim.
pub struct RandomStrategy;

impl<K, V> EvictionStrategy<K, V> for RandomStrategy
where
    K: Eq + Hash + Clone + Send,
{
    fn on_access(&mut self, _key: &K) {}
    fn on_set(&mut self, _key: &K) {}
    fn on_delete(&mut self, _key: &K) {}

    fn select_victim(&mut self, items: &IndexMap<K, CacheItem<V>>) -> Option<K> {
        if items.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..items.len());
        items.keys().nth(idx).cloned()
    }

    fn clear(&mut self) {}
}
