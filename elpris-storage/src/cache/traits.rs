//! Durable key-value store abstraction.
//!
//! The durable tier is a shared string store with per-key expiry. Values are
//! opaque strings here; [`DurableCache`](super::DurableCache) layers JSON on top.

use std::time::Duration;

use async_trait::async_trait;
use elpris_core::CacheError;

/// Result type for store operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Pluggable durable store (Redis in production, in-process for tests).
///
/// Implementations must be safe to share across request tasks. Every method
/// may fail with [`CacheError::Unavailable`] or [`CacheError::Timeout`]; callers
/// decide whether that is fatal.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Raw value for `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl`.
    ///
    /// A TTL under one second is rounded up to one second.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// All live keys starting with `prefix`, without any backend namespace.
    async fn keys(&self, prefix: &str) -> CacheResult<Vec<String>>;

    /// Round-trip to the backend.
    async fn ping(&self) -> CacheResult<()>;

    /// Short name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Whole seconds for a store TTL, never zero.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
