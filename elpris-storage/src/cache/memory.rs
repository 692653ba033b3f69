//! Process-local LRU cache with per-entry TTL.
//!
//! Bounded by entry count. Expired entries are dropped lazily on read, and
//! before an insert would otherwise evict a live entry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use super::clock::{Clock, SystemClock};

/// Stored value plus its absolute expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at_epoch_ms: u64,
}

impl<V> CacheEntry<V> {
    /// Expiry is exclusive: an entry read exactly at its expiry is still live.
    pub fn is_expired(&self, now_epoch_ms: u64) -> bool {
        now_epoch_ms > self.expires_at_epoch_ms
    }
}

/// Counters exposed through the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

/// LRU map from string keys to values with an absolute expiry.
///
/// A read refreshes recency. Setting an existing key replaces its value and
/// expiry without evicting anything.
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl<V: Clone> MemoryCache<V> {
    /// Cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
            counters: Counters::default(),
        }
    }

    /// Live value for `key`, removing it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_epoch_ms();
        let mut entries = self.entries.lock();

        let expired = match entries.peek(key) {
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            entries.pop(key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or replace `key`, expiring `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = self.clock.now_epoch_ms();
        let entry = CacheEntry {
            value,
            expires_at_epoch_ms: now.saturating_add(ttl.as_millis() as u64),
        };

        let mut entries = self.entries.lock();
        if !entries.contains(&key) && entries.len() >= entries.cap().get() {
            self.purge_locked(&mut entries, now);
        }

        if let Some((evicted, _)) = entries.push(key.clone(), entry) {
            if evicted != key {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().pop(key).map(|entry| entry.value)
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_epoch_ms();
        let mut entries = self.entries.lock();
        self.purge_locked(&mut entries, now)
    }

    pub fn stats(&self) -> MemoryCacheStats {
        let entries = self.entries.lock();
        MemoryCacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    fn purge_locked(&self, entries: &mut LruCache<String, CacheEntry<V>>, now: u64) -> usize {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        self.counters
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
