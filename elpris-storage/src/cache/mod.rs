//! Cache layer with explicit fallback ordering.
//!
//! Reads resolve in a fixed order so every instance behaves the same way:
//!
//! 1. durable primary key (`HIT-KV`)
//! 2. process memory (`HIT-MEMORY`)
//! 3. retried upstream computation, written to both tiers (`MISS`)
//! 4. durable latest-good key (`HIT-STALE`)
//! 5. an empty payload supplied by the caller (`MISS-FALLBACK` / `ERROR`)
//!
//! The durable tier is checked first because memory is per-instance and
//! would otherwise make TTLs diverge across instances.
//!
//! # Example
//!
//! ```ignore
//! let outcome = orchestrator
//!     .get_or_compute(
//!         &CacheKeys::new("tariff:5790000000000:DT_C_01:2024-06-01", "tariff:5790000000000:DT_C_01"),
//!         CacheTtl::new(Duration::from_secs(3600), Duration::from_secs(7 * 86_400)),
//!         move || fetch_tariff(client.clone(), gln.clone()),
//!         || TariffResult::empty("5790000000000"),
//!     )
//!     .await;
//! ```

pub mod clock;
pub mod durable;
pub mod kv_memory;
pub mod memory;
pub mod orchestrator;
pub mod redis_backend;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use durable::DurableCache;
pub use kv_memory::InMemoryKvStore;
pub use memory::{CacheEntry, MemoryCache, MemoryCacheStats};
pub use orchestrator::{CacheKeys, CacheOrchestrator, CacheOutcome, CacheStatus, CacheTtl, Computed};
pub use redis_backend::{RedisKvStore, RedisPolicy};
pub use traits::{CacheResult, KvStore};
