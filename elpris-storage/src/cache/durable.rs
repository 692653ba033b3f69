//! JSON gateway over the durable key-value store.
//!
//! Reads never fail: an unreachable store or an undecodable value is logged
//! and reported as a miss. Writes return their error so the orchestrator can
//! decide whether to touch the latest-good key.

use std::sync::Arc;
use std::time::Duration;

use elpris_core::CacheError;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::traits::{CacheResult, KvStore};

#[derive(Clone)]
pub struct DurableCache {
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl DurableCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Read and decode `key`, surfacing backend and decode errors.
    pub async fn try_read_json<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::Serialization {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// Read and decode `key`; any failure is logged and reads as absent.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_read_json(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "Durable cache read failed; treating as miss");
                None
            }
        }
    }

    /// Encode and store `value` under `key` for `ttl`.
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.store.set(key, &raw, ttl).await?;
        debug!(key, ttl_secs = ttl.as_secs(), "Durable cache write");
        Ok(())
    }

    /// Write the primary key, then the latest-good key if the primary landed.
    ///
    /// A failed latest write is logged and does not fail the call.
    pub async fn write_json_with_fallback<T: Serialize + ?Sized>(
        &self,
        primary_key: &str,
        latest_key: &str,
        value: &T,
        primary_ttl: Duration,
        latest_ttl: Duration,
    ) -> CacheResult<()> {
        self.write_json(primary_key, value, primary_ttl).await?;
        if let Err(err) = self.write_json(latest_key, value, latest_ttl).await {
            warn!(key = latest_key, error = %err, "Latest-good cache write failed");
        }
        Ok(())
    }

    /// Whether `key` is present; an unreachable store reads as absent.
    pub async fn exists(&self, key: &str) -> bool {
        match self.store.exists(key).await {
            Ok(found) => found,
            Err(err) => {
                warn!(key, error = %err, "Durable cache exists check failed");
                false
            }
        }
    }

    pub async fn keys_by_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        self.store.keys(prefix).await
    }

    pub async fn ping(&self) -> CacheResult<()> {
        self.store.ping().await
    }
}

// =============================================================================
// TESTS
// =============================================================================
