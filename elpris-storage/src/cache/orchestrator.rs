//! Get-or-compute over the two cache tiers.
//!
//! Resolution order for a read:
//!
//! 1. durable primary key → `HIT-KV`
//! 2. memory cache → `HIT-MEMORY`
//! 3. retried computation, written to both tiers → `MISS`
//! 4. durable latest-good key → `HIT-STALE`
//! 5. caller-supplied empty payload → `MISS-FALLBACK`, or `ERROR` when the
//!    computation itself was lost
//!
//! A durable hit is not copied into memory. Concurrent misses on the same
//! primary key share a single spawned computation.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use elpris_core::{retry_with_backoff_if, RetryPolicy};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

use super::durable::DurableCache;
use super::memory::MemoryCache;

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Durable keys for one resource.
///
/// `primary` is bucketed by request parameters and date; `latest` identifies
/// the resource only and survives much longer as a stale fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    pub primary: String,
    pub latest: String,
}

impl CacheKeys {
    pub fn new(primary: impl Into<String>, latest: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            latest: latest.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub primary: Duration,
    pub latest: Duration,
}

impl CacheTtl {
    pub fn new(primary: Duration, latest: Duration) -> Self {
        Self { primary, latest }
    }

    pub fn from_secs(primary: u64, latest: u64) -> Self {
        Self::new(Duration::from_secs(primary), Duration::from_secs(latest))
    }
}

/// Where a value came from. Rendered verbatim in the `X-Cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStatus {
    #[serde(rename = "HIT-KV")]
    HitKv,
    #[serde(rename = "HIT-MEMORY")]
    HitMemory,
    #[serde(rename = "MISS")]
    Miss,
    #[serde(rename = "HIT-STALE")]
    HitStale,
    #[serde(rename = "MISS-FALLBACK")]
    MissFallback,
    #[serde(rename = "ERROR")]
    Error,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::HitKv => "HIT-KV",
            CacheStatus::HitMemory => "HIT-MEMORY",
            CacheStatus::Miss => "MISS",
            CacheStatus::HitStale => "HIT-STALE",
            CacheStatus::MissFallback => "MISS-FALLBACK",
            CacheStatus::Error => "ERROR",
        }
    }

    /// Stale or placeholder data.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            CacheStatus::HitStale | CacheStatus::MissFallback | CacheStatus::Error
        )
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOutcome<T> {
    pub value: T,
    pub status: CacheStatus,
    /// TTL the value was written with on `MISS`; the configured primary TTL otherwise.
    pub ttl: Duration,
}

/// What a computation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Computed<T> {
    /// Real data: cached in memory and under both durable keys.
    Fresh(T),
    /// Upstream had nothing for this key. Cached in memory and under the
    /// primary key only, for `ttl`, so the latest-good value is not replaced.
    Negative { value: T, ttl: Duration },
}

// =============================================================================
// IN-FLIGHT TABLE
// =============================================================================

#[derive(Debug, Clone)]
struct Flight {
    value: Value,
    ttl: Duration,
}

#[derive(Debug, Clone)]
enum FlightError {
    /// Computation returned an error after retries.
    Failed(Arc<str>),
    /// The computation task panicked or was cancelled.
    Lost(Arc<str>),
}

type SharedFlight = Shared<BoxFuture<'static, Result<Flight, FlightError>>>;

type InflightTable = Arc<Mutex<HashMap<String, (u64, SharedFlight)>>>;

/// Owned by the computation task. Dropping it in any way
/// removes the task's own entry from the in-flight table.
struct FlightGuard {
    inflight: InflightTable,
    key: String,
    id: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        if inflight.get(&self.key).map(|(id, _)| *id) == Some(self.id) {
            inflight.remove(&self.key);
        }
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Two-tier cache with retrying computation and stale fallback.
///
/// Cheap to share behind an `Arc`; the memory tier is injected so tests can
/// give each case a fresh instance.
pub struct CacheOrchestrator {
    durable: DurableCache,
    memory: Arc<MemoryCache<Value>>,
    retry: RetryPolicy,
    request_budget: Option<Duration>,
    inflight: InflightTable,
    next_flight_id: AtomicU64,
}

impl std::fmt::Debug for CacheOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("durable", &self.durable)
            .field("memory", &self.memory.stats())
            .field("retry", &self.retry)
            .field("request_budget", &self.request_budget)
            .finish_non_exhaustive()
    }
}

impl CacheOrchestrator {
    pub fn new(durable: DurableCache, memory: Arc<MemoryCache<Value>>, retry: RetryPolicy) -> Self {
        Self {
            durable,
            memory,
            retry,
            request_budget: None,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_flight_id: AtomicU64::new(1),
        }
    }

    /// Bound each computation's retry loop to `budget` from its start.
    pub fn with_request_budget(mut self, budget: Duration) -> Self {
        self.request_budget = Some(budget);
        self
    }

    pub fn durable(&self) -> &DurableCache {
        &self.durable
    }

    pub fn memory(&self) -> &MemoryCache<Value> {
        &self.memory
    }

    /// Number of computations currently running.
    pub fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// [`get_or_compute_if`](Self::get_or_compute_if) retrying every error.
    pub async fn get_or_compute<T, E, F, Fut, FB>(
        &self,
        keys: &CacheKeys,
        ttl: CacheTtl,
        compute: F,
        fallback: FB,
    ) -> CacheOutcome<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<T>, E>> + Send + 'static,
        FB: FnOnce() -> T,
    {
        self.get_or_compute_if(keys, ttl, compute, |_: &E| true, fallback)
            .await
    }

    /// Resolve `keys`, computing on a miss. Never fails.
    ///
    /// `should_retry` decides whether a failed attempt is retried; a `false`
    /// goes straight to the stale fallback.
    pub async fn get_or_compute_if<T, E, F, Fut, P, FB>(
        &self,
        keys: &CacheKeys,
        ttl: CacheTtl,
        compute: F,
        should_retry: P,
        fallback: FB,
    ) -> CacheOutcome<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<T>, E>> + Send + 'static,
        P: Fn(&E) -> bool + Send + 'static,
        FB: FnOnce() -> T,
    {
        if let Some(value) = self.durable.read_json::<T>(&keys.primary).await {
            debug!(key = %keys.primary, "Durable cache hit");
            return outcome(value, CacheStatus::HitKv, ttl.primary);
        }

        if let Some(value) = self.memory_value::<T>(&keys.primary) {
            debug!(key = %keys.primary, "Memory cache hit");
            return outcome(value, CacheStatus::HitMemory, ttl.primary);
        }

        let result = self.join_or_start(keys, ttl, compute, should_retry).await;

        let failure = match result {
            Ok(flight) => match serde_json::from_value::<T>(flight.value) {
                Ok(value) => return outcome(value, CacheStatus::Miss, flight.ttl),
                Err(err) => FlightError::Failed(Arc::from(err.to_string())),
            },
            Err(err) => err,
        };

        if let Some(value) = self.durable.read_json::<T>(&keys.latest).await {
            warn!(
                key = %keys.primary,
                latest_key = %keys.latest,
                error = %failure.reason(),
                "Serving stale value"
            );
            return outcome(value, CacheStatus::HitStale, ttl.primary);
        }

        let status = match failure {
            FlightError::Failed(_) => CacheStatus::MissFallback,
            FlightError::Lost(_) => CacheStatus::Error,
        };
        warn!(
            key = %keys.primary,
            status = %status,
            error = %failure.reason(),
            "No cached value available; serving fallback"
        );
        outcome(fallback(), status, ttl.primary)
    }

    fn memory_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.memory.get(key)?;
        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "Dropping undecodable memory cache entry");
                self.memory.remove(key);
                None
            }
        }
    }

    fn join_or_start<T, E, F, Fut, P>(
        &self,
        keys: &CacheKeys,
        ttl: CacheTtl,
        compute: F,
        should_retry: P,
    ) -> SharedFlight
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<T>, E>> + Send + 'static,
        P: Fn(&E) -> bool + Send + 'static,
    {
        let mut inflight = self.inflight.lock();
        match inflight.get(&keys.primary) {
            Some((_, flight)) if flight.peek().is_none() => {
                debug!(key = %keys.primary, "Joining in-flight computation");
                return flight.clone();
            }
            _ => {}
        }

        // The table lock is held until the entry is inserted, so the task's
        // guard cannot run its removal first.
        let id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
        let flight = self.spawn_flight(keys, ttl, id, compute, should_retry);
        inflight.insert(keys.primary.clone(), (id, flight.clone()));
        flight
    }

    fn spawn_flight<T, E, F, Fut, P>(
        &self,
        keys: &CacheKeys,
        ttl: CacheTtl,
        flight_id: u64,
        compute: F,
        should_retry: P,
    ) -> SharedFlight
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<T>, E>> + Send + 'static,
        P: Fn(&E) -> bool + Send + 'static,
    {
        let guard = FlightGuard {
            inflight: Arc::clone(&self.inflight),
            key: keys.primary.clone(),
            id: flight_id,
        };
        let durable = self.durable.clone();
        let memory = Arc::clone(&self.memory);
        let keys = keys.clone();
        let mut policy = self.retry.clone();
        if let Some(budget) = self.request_budget {
            policy = policy.with_deadline(Instant::now() + budget);
        }

        let span = info_span!("cache_compute", key = %keys.primary);
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                let computed = retry_with_backoff_if(compute, &policy, should_retry)
                    .await
                    .map_err(|e| FlightError::Failed(Arc::from(e.to_string())))?;

                let (value, written_ttl, negative) = match computed {
                    Computed::Fresh(value) => (value, ttl.primary, false),
                    Computed::Negative {
                        value,
                        ttl: negative_ttl,
                    } => (value, negative_ttl, true),
                };
                let value = serde_json::to_value(&value)
                    .map_err(|e| FlightError::Failed(Arc::from(e.to_string())))?;

                memory.set(keys.primary.clone(), value.clone(), written_ttl);
                let written = if negative {
                    durable.write_json(&keys.primary, &value, written_ttl).await
                } else {
                    durable
                        .write_json_with_fallback(
                            &keys.primary,
                            &keys.latest,
                            &value,
                            written_ttl,
                            ttl.latest,
                        )
                        .await
                };
                if let Err(err) = written {
                    warn!(key = %keys.primary, error = %err, "Durable cache write failed");
                }

                debug!(negative, ttl_secs = written_ttl.as_secs(), "Computed value cached");
                Ok(Flight {
                    value,
                    ttl: written_ttl,
                })
            }
            .instrument(span),
        );

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_err) => Err(FlightError::Lost(Arc::from(join_err.to_string()))),
            }
        }
        .boxed()
        .shared()
    }
}

impl FlightError {
    fn reason(&self) -> &str {
        match self {
            FlightError::Failed(reason) | FlightError::Lost(reason) => reason,
        }
    }
}

fn outcome<T>(value: T, status: CacheStatus, ttl: Duration) -> CacheOutcome<T> {
    CacheOutcome { value, status, ttl }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::kv_memory::InMemoryKvStore;
    use crate::cache::traits::{CacheResult, KvStore};
    use async_trait::async_trait;
    use elpris_core::CacheError;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        value: u32,
    }

    fn reading(value: u32) -> Reading {
        Reading { value }
    }

    fn keys() -> CacheKeys {
        CacheKeys::new("spot:DK1:2024-05-01", "spot:DK1")
    }

    fn ttl() -> CacheTtl {
        CacheTtl::from_secs(900, 172_800)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10))
    }

    fn setup() -> (CacheOrchestrator, Arc<InMemoryKvStore>, Arc<MemoryCache<Value>>) {
        let store = Arc::new(InMemoryKvStore::new());
        let memory = Arc::new(MemoryCache::new(16));
        let orchestrator = CacheOrchestrator::new(
            DurableCache::new(store.clone()),
            memory.clone(),
            fast_retry(),
        );
        (orchestrator, store, memory)
    }

    /// Store whose every operation fails.
    struct DownStore;

    #[async_trait]
    impl KvStore for DownStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Err(down())
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
            Err(down())
        }
        async fn exists(&self, _key: &str) -> CacheResult<bool> {
            Err(down())
        }
        async fn keys(&self, _prefix: &str) -> CacheResult<Vec<String>> {
            Err(down())
        }
        async fn ping(&self) -> CacheResult<()> {
            Err(down())
        }
        fn backend_name(&self) -> &'static str {
            "down"
        }
    }

    fn down() -> CacheError {
        CacheError::Unavailable {
            reason: "connection refused".to_string(),
        }
    }

    fn counting_compute(
        calls: Arc<AtomicUsize>,
        result: Result<Computed<Reading>, String>,
    ) -> impl FnMut() -> BoxFuture<'static, Result<Computed<Reading>, String>> + Send + 'static {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = result.clone();
            async move { result }.boxed()
        }
    }

    #[tokio::test]
    async fn test_durable_hit_takes_precedence_over_memory() {
        let (orchestrator, store, memory) = setup();
        store
            .set(&keys().primary, r#"{"value":1}"#, Duration::from_secs(60))
            .await
            .expect("seed");
        memory.set(keys().primary, serde_json::json!({ "value": 2 }), Duration::from_secs(60));

        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(3)))),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::HitKv);
        assert_eq!(outcome.value, reading(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_memory_hit_when_durable_misses() {
        let (orchestrator, _store, memory) = setup();
        memory.set(keys().primary, serde_json::json!({ "value": 2 }), Duration::from_secs(60));

        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(3)))),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::HitMemory);
        assert_eq!(outcome.value, reading(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_writes_both_tiers_then_hits_durable() {
        let (orchestrator, store, memory) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(7)))),
                || reading(0),
            )
            .await;
        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(first.value, reading(7));
        assert_eq!(first.ttl, Duration::from_secs(900));

        assert!(store.exists(&keys().primary).await.expect("exists"));
        assert!(store.exists(&keys().latest).await.expect("exists"));
        assert_eq!(store.ttl_of(&keys().primary), Some(900));
        assert!(memory.get(&keys().primary).is_some());

        let second = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(8)))),
                || reading(0),
            )
            .await;
        assert_eq!(second.status, CacheStatus::HitKv);
        assert_eq!(second.value, reading(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.inflight_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_serves_latest_good_value() {
        let (orchestrator, store, _memory) = setup();
        store
            .set(&keys().latest, r#"{"value":5}"#, Duration::from_secs(600))
            .await
            .expect("seed");

        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Err("upstream 503".to_string())),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::HitStale);
        assert_eq!(outcome.value, reading(5));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!store.exists(&keys().primary).await.expect("exists"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_stale_uses_fallback() {
        let (orchestrator, _store, _memory) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Err("upstream timeout".to_string())),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::MissFallback);
        assert_eq!(outcome.value, reading(0));
        assert!(outcome.status.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_skips_retries() {
        let (orchestrator, _store, _memory) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = orchestrator
            .get_or_compute_if(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Err("400 bad request".to_string())),
                |err: &String| !err.starts_with("400"),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::MissFallback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_result_is_not_promoted_to_latest() {
        let (orchestrator, store, _memory) = setup();
        store
            .set(&keys().latest, r#"{"value":5}"#, Duration::from_secs(600))
            .await
            .expect("seed");

        let calls = Arc::new(AtomicUsize::new(0));
        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                CacheTtl::from_secs(3600, 604_800),
                counting_compute(
                    calls.clone(),
                    Ok(Computed::Negative {
                        value: reading(0),
                        ttl: Duration::from_secs(900),
                    }),
                ),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::Miss);
        assert_eq!(outcome.ttl, Duration::from_secs(900));
        assert_eq!(store.ttl_of(&keys().primary), Some(900));

        let latest = store.get(&keys().latest).await.expect("get");
        assert_eq!(latest.as_deref(), Some(r#"{"value":5}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_share_one_computation() {
        let (orchestrator, _store, _memory) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = |calls: Arc<AtomicUsize>| {
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, String>(Computed::Fresh(reading(9)))
                }
            }
        };

        let keys = keys();
        let (a, b) = tokio::join!(
            orchestrator.get_or_compute(&keys, ttl(), slow(calls.clone()), || reading(0)),
            orchestrator.get_or_compute(&keys, ttl(), slow(calls.clone()), || reading(0)),
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.status, CacheStatus::Miss);
        assert_eq!(b.status, CacheStatus::Miss);
        assert_eq!(a.value, b.value);
        assert_eq!(orchestrator.inflight_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_computation_does_not_answer_later_requests() {
        let (orchestrator, _store, _memory) = setup();
        let keys = keys();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.get_or_compute(
                &keys,
                ttl(),
                || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Err::<Computed<Reading>, _>("upstream 503".to_string())
                },
                || reading(0),
            ),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(orchestrator.inflight_len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(orchestrator.inflight_len(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        let next = orchestrator
            .get_or_compute(
                &keys,
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(6)))),
                || reading(0),
            )
            .await;

        assert_eq!(next.status, CacheStatus::Miss);
        assert_eq!(next.value, reading(6));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_durable_outage_still_computes_and_fills_memory() {
        let memory = Arc::new(MemoryCache::new(16));
        let orchestrator =
            CacheOrchestrator::new(DurableCache::new(Arc::new(DownStore)), memory, fast_retry());
        let calls = Arc::new(AtomicUsize::new(0));

        let first = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(4)))),
                || reading(0),
            )
            .await;
        assert_eq!(first.status, CacheStatus::Miss);

        let second = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Ok(Computed::Fresh(reading(5)))),
                || reading(0),
            )
            .await;
        assert_eq!(second.status, CacheStatus::HitMemory);
        assert_eq!(second.value, reading(4));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_computation_reports_error_status() {
        let (orchestrator, _store, _memory) = setup();

        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                || async {
                    let fail = true;
                    if fail {
                        panic!("normalizer bug");
                    }
                    Ok::<_, String>(Computed::Fresh(reading(1)))
                },
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::Error);
        assert_eq!(outcome.value, reading(0));
        assert_eq!(orchestrator.inflight_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_budget_cuts_retries_short() {
        let store = Arc::new(InMemoryKvStore::new());
        let orchestrator = CacheOrchestrator::new(
            DurableCache::new(store),
            Arc::new(MemoryCache::new(16)),
            RetryPolicy::new(3, Duration::from_millis(1000)),
        )
        .with_request_budget(Duration::from_millis(1500));
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = orchestrator
            .get_or_compute(
                &keys(),
                ttl(),
                counting_compute(calls.clone(), Err("upstream 502".to_string())),
                || reading(0),
            )
            .await;

        assert_eq!(outcome.status, CacheStatus::MissFallback);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_status_header_values() {
        assert_eq!(CacheStatus::HitKv.as_str(), "HIT-KV");
        assert_eq!(CacheStatus::MissFallback.to_string(), "MISS-FALLBACK");
        assert!(!CacheStatus::Miss.is_degraded());
        assert!(CacheStatus::Error.is_degraded());
        assert_eq!(
            serde_json::to_value(CacheStatus::HitStale).expect("json"),
            serde_json::json!("HIT-STALE")
        );
    }
}
