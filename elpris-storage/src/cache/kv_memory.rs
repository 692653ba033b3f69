//! In-process [`KvStore`] for development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::clock::{Clock, SystemClock};
use super::traits::{ttl_secs, CacheResult, KvStore};

/// HashMap-backed store honouring TTLs against an injectable clock.
///
/// Used when no Redis URL is configured. State is lost on restart and is not
/// shared between instances.
#[derive(Debug, Clone)]
pub struct InMemoryKvStore {
    entries: Arc<RwLock<HashMap<String, (String, u64)>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Remaining TTL of `key`, rounded up to whole seconds like Redis `TTL`.
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        let now = self.clock.now_epoch_ms();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|(_, expires)| *expires >= now)
            .map(|(_, expires)| (expires - now).div_ceil(1000))
    }

    pub fn len(&self) -> usize {
        let now = self.clock.now_epoch_ms();
        self.entries
            .read()
            .values()
            .filter(|(_, expires)| *expires >= now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self, key: &str) -> Option<String> {
        let now = self.clock.now_epoch_ms();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|(_, expires)| *expires >= now)
            .map(|(value, _)| value.clone())
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let expires = self
            .clock
            .now_epoch_ms()
            .saturating_add(ttl_secs(ttl) * 1000);
        self.entries
            .write()
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let now = self.clock.now_epoch_ms();
        let mut keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(key, (_, expires))| key.starts_with(prefix) && *expires >= now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
