//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use elpris_storage::{
    CacheOrchestrator, DurableCache, InMemoryKvStore, KvStore, MemoryCache, RedisKvStore,
    RedisPolicy,
};
use elpris_upstream::EnergiDataClient;

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Two-tier cache shared by every data route.
    ///
    /// Its memory tier lives as long as this process; the durable tier is
    /// shared with every other instance pointed at the same store.
    pub orchestrator: Arc<CacheOrchestrator>,
    pub upstream: EnergiDataClient,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire state around an explicit durable store and upstream client.
    pub fn new(config: ApiConfig, store: Arc<dyn KvStore>, upstream: EnergiDataClient) -> Self {
        let memory = Arc::new(MemoryCache::new(config.memory_cache_capacity));
        let orchestrator = CacheOrchestrator::new(
            DurableCache::new(store),
            memory,
            config.retry_policy(),
        )
        .with_request_budget(config.request_budget);

        Self {
            orchestrator: Arc::new(orchestrator),
            upstream,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Build state from configuration: Redis when a URL is configured,
    /// otherwise the in-process store.
    pub fn from_config(config: ApiConfig) -> ApiResult<Self> {
        config.validate()?;

        let store: Arc<dyn KvStore> = match config.redis_url.as_deref() {
            Some(url) => Arc::new(
                RedisKvStore::new(url, &config.redis_prefix, RedisPolicy::default())
                    .map_err(elpris_core::ElprisError::from)?,
            ),
            None => {
                tracing::warn!("ELPRIS_REDIS_URL not set; durable cache is process-local");
                Arc::new(InMemoryKvStore::new())
            }
        };
        let upstream = EnergiDataClient::new(&config.upstream_base_url, config.upstream_timeout);

        Ok(Self::new(config, store, upstream))
    }

    pub fn durable(&self) -> &DurableCache {
        self.orchestrator.durable()
    }
}

crate::impl_from_ref!(Arc<CacheOrchestrator>, orchestrator);
crate::impl_from_ref!(EnergiDataClient, upstream);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);
