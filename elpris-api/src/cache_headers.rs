//! CDN cache headers for the data routes.
//!
//! Every data response carries `X-Cache` with the cache status and a
//! `Cache-Control` policy derived from it. Degraded responses are cached
//! briefly at the edge and flagged with `X-Degraded: true`.

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use elpris_storage::{CacheOutcome, CacheStatus};
use serde::Serialize;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_DEGRADED: HeaderName = HeaderName::from_static("x-degraded");

/// `Cache-Control` value for a response with the given status.
///
/// Fresh data is cached for its primary TTL and may be served stale for twice
/// that while the CDN revalidates.
pub fn cache_control(status: CacheStatus, ttl: Duration) -> String {
    match status {
        CacheStatus::HitKv | CacheStatus::HitMemory | CacheStatus::Miss => {
            let secs = ttl.as_secs();
            format!(
                "public, s-maxage={}, stale-while-revalidate={}",
                secs,
                secs.saturating_mul(2)
            )
        }
        CacheStatus::HitStale => "public, s-maxage=60, stale-while-revalidate=300".to_string(),
        CacheStatus::MissFallback | CacheStatus::Error => {
            "public, s-maxage=30, stale-while-revalidate=60".to_string()
        }
    }
}

/// JSON body plus cache headers. Always HTTP 200.
#[derive(Debug, Clone)]
pub struct CachedJson<T> {
    pub value: T,
    pub status: CacheStatus,
    pub ttl: Duration,
}

impl<T> CachedJson<T> {
    /// Override the TTL advertised to the CDN.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl<T> From<CacheOutcome<T>> for CachedJson<T> {
    fn from(outcome: CacheOutcome<T>) -> Self {
        Self {
            value: outcome.value,
            status: outcome.status,
            ttl: outcome.ttl,
        }
    }
}

impl<T: Serialize> IntoResponse for CachedJson<T> {
    fn into_response(self) -> Response {
        let mut response = Json(self.value).into_response();
        let headers = response.headers_mut();

        headers.insert(X_CACHE, HeaderValue::from_static(self.status.as_str()));
        if let Ok(value) = HeaderValue::from_str(&cache_control(self.status, self.ttl)) {
            headers.insert(header::CACHE_CONTROL, value);
        }
        if self.status.is_degraded() {
            headers.insert(X_DEGRADED, HeaderValue::from_static("true"));
        }

        response
    }
}
