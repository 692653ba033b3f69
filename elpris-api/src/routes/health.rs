//! Health Check Endpoints
//!
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Durable cache connectivity check
//! - /health/cache - Presence of latest-good keys and key counts by prefix

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use elpris_storage::{DurableCache, MemoryCacheStats};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Latest-good keys the site depends on for its default views.
pub const WATCHED_LATEST_KEYS: &[&str] = &["spot:DK1", "spot:DK2", "pricelist:D03"];

/// Prefixes counted when no `prefix` query parameter is given.
pub const RESOURCE_PREFIXES: &[&str] = &["tariff:", "pricelist:", "spot:"];

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    pub durable_cache: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheHealthQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheHealthResponse {
    pub status: HealthStatus,
    pub backend: String,
    /// Whether each watched latest-good key is present.
    pub latest_keys: BTreeMap<String, bool>,
    /// Key counts per prefix; absent when the store could not be listed.
    pub key_counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub memory: MemoryCacheStats,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (durable cache connectivity)
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let durable = state.durable();
    let cache_health = match check_durable(durable).await {
        Ok(latency) => ComponentHealth {
            status: HealthStatus::Healthy,
            backend: Some(durable.backend_name().to_string()),
            latency_ms: Some(latency),
            error: None,
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            backend: Some(durable.backend_name().to_string()),
            latency_ms: None,
            error: Some(e),
        },
    };

    let overall_status = cache_health.status;
    let response = HealthResponse {
        status: overall_status,
        message: None,
        details: Some(HealthDetails {
            durable_cache: cache_health,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if overall_status == HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}

async fn check_durable(durable: &DurableCache) -> Result<u64, String> {
    let start = Instant::now();
    match durable.ping().await {
        Ok(()) => Ok(start.elapsed().as_millis() as u64),
        Err(e) => Err(format!("Durable cache check failed: {}", e)),
    }
}

/// GET /health/cache - Cache contents overview. Always 200; `degraded` when
/// a watched key is missing or the store cannot be listed.
pub async fn cache_health(
    State(state): State<AppState>,
    Query(query): Query<CacheHealthQuery>,
) -> impl IntoResponse {
    let durable = state.durable();

    let mut latest_keys = BTreeMap::new();
    for key in WATCHED_LATEST_KEYS {
        latest_keys.insert(key.to_string(), durable.exists(key).await);
    }

    let prefixes: Vec<String> = match query.prefix.map(|p| p.trim().to_string()) {
        Some(prefix) if !prefix.is_empty() => vec![prefix],
        _ => RESOURCE_PREFIXES.iter().map(|p| p.to_string()).collect(),
    };

    let mut key_counts = BTreeMap::new();
    let mut errors = Vec::new();
    for prefix in prefixes {
        match durable.keys_by_prefix(&prefix).await {
            Ok(keys) => {
                key_counts.insert(prefix, keys.len());
            }
            Err(e) => errors.push(format!("{}: {}", prefix, e)),
        }
    }

    let status = if errors.is_empty() && latest_keys.values().all(|present| *present) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(CacheHealthResponse {
        status,
        backend: durable.backend_name().to_string(),
        latest_keys,
        key_counts,
        errors,
        memory: state.orchestrator.memory().stats(),
    })
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/cache", get(cache_health))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() -> Result<(), serde_json::Error> {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("All systems operational".to_string()),
            details: None,
        };

        let json = serde_json::to_string(&response)?;
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(!json.contains("details"));
        Ok(())
    }

    #[test]
    fn test_component_health_with_error() -> Result<(), serde_json::Error> {
        let component = ComponentHealth {
            status: HealthStatus::Unhealthy,
            backend: Some("redis".to_string()),
            latency_ms: None,
            error: Some("Connection refused".to_string()),
        };

        let json = serde_json::to_string(&component)?;
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("Connection refused"));
        assert!(!json.contains("latency_ms"));
        Ok(())
    }
}
