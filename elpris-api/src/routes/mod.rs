//! REST API Routes
//!
//! - `/api/tariffs`, `/api/pricelists`, `/api/electricity-prices`: cached
//!   upstream data; always HTTP 200 once the query validates
//! - `/health/*`: liveness, readiness and cache inspection
//! - `/metrics`: Prometheus exposition

pub mod electricity_prices;
pub mod health;
pub mod pricelists;
pub mod tariffs;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use elpris_core::{DatasetResponse, UpstreamError};
use elpris_storage::CacheOutcome;
use elpris_upstream::{DatasetQuery, EnergiDataClient};
use serde::de::DeserializeOwned;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache_headers::{CachedJson, X_CACHE, X_DEGRADED};
use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware, METRICS};

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Current UTC wall clock; dates in cache keys and upstream windows use it.
pub(crate) fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn utc_today() -> NaiveDate {
    utc_now().date()
}

/// Run a dataset query and count its outcome.
pub(crate) async fn query_dataset<R: DeserializeOwned>(
    client: &EnergiDataClient,
    dataset: &'static str,
    query: &DatasetQuery,
) -> Result<DatasetResponse<R>, UpstreamError> {
    let result = client.query::<R>(dataset, query).await;
    let outcome = match &result {
        Ok(response) if response.records.is_empty() => "empty",
        Ok(_) => "success",
        Err(UpstreamError::Transient { .. }) => "transient",
        Err(UpstreamError::Client { .. }) => "client",
        Err(UpstreamError::Decode { .. }) => "decode",
    };
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_upstream_request(dataset, outcome);
    }
    result
}

/// Turn a cache outcome into a response, counting the cache status.
pub(crate) fn respond<T>(resource: &str, outcome: CacheOutcome<T>) -> CachedJson<T> {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_cache_lookup(resource, outcome.status.as_str());
    }
    tracing::debug!(resource, status = %outcome.status, "Resolved cached resource");
    CachedJson::from(outcome)
}

// ============================================================================
// ROUTER
// ============================================================================

fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([X_CACHE, X_DEGRADED, header::CACHE_CONTROL])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.is_production() {
        // Development mode: allow all origins
        tracing::info!("CORS: Development mode - allowing all origins");
        return cors.allow_origin(AllowOrigin::any());
    }

    tracing::info!(
        "CORS: Production mode - allowing origins: {:?}",
        config.cors_origins
    );
    let config = Arc::new(config.clone());
    cors.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts| {
            origin
                .to_str()
                .map(|origin| config.is_origin_allowed(origin))
                .unwrap_or(false)
        },
    ))
}

/// Create the complete router: data routes, health checks and metrics, with
/// CORS, request tracing and metrics middleware applied.
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    let api = Router::new()
        .route("/tariffs", get(tariffs::get_tariff))
        .route("/pricelists", get(pricelists::get_price_list))
        .route(
            "/electricity-prices",
            get(electricity_prices::get_electricity_prices),
        );

    Router::new()
        .nest("/api", api)
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
