//! Elpris Storage - Cache Layer
//!
//! Two cache tiers and the orchestration that combines them with a retrying
//! upstream computation:
//!
//! - [`MemoryCache`]: process-local LRU with per-entry TTL
//! - [`KvStore`]: durable key-value store shared by every instance
//!   ([`InMemoryKvStore`] for development and tests, [`RedisKvStore`] in production)
//! - [`DurableCache`]: JSON gateway over a [`KvStore`] that never fails a read
//! - [`CacheOrchestrator`]: get-or-compute with stale fallback

pub mod cache;

pub use cache::{
    CacheKeys, CacheOrchestrator, CacheOutcome, CacheResult, CacheStatus, CacheTtl, Clock,
    Computed, DurableCache, InMemoryKvStore, KvStore, ManualClock, MemoryCache,
    MemoryCacheStats, RedisKvStore, RedisPolicy, SystemClock,
};
