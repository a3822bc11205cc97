//! Shared eviction-policy cache subsystem.
//!
//! `MemoryCache` is a bounded key/value store with TTL, stats, and an event
//! stream; the policy deciding which entry to drop under capacity pressure
//! is pluggable (`EvictionStrategy`). `CacheManager` is a named-cache
//! registry with global stats aggregation and optional warmup.
//!
//! The parser layer uses these caches to memoize AST slices; callers use
//! them to memoize query results.

pub mod manager;
pub mod memory;
pub mod strategy;

pub use manager::{CacheManager, GlobalCacheStats, WarmupReport};
pub use memory::{
    CacheEvent, CacheEventKind, CacheItem, CacheOptions, CacheStats, MemoryCache,
};
pub use strategy::{EvictionPolicy, EvictionStrategy};
