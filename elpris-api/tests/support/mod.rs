//! Shared harness for router tests: an in-process durable store, a mocked
//! upstream dataset service and helpers to drive the router with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use elpris_api::{create_api_router, ApiConfig, AppState};
use elpris_storage::{InMemoryKvStore, KvStore};
use elpris_upstream::EnergiDataClient;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryKvStore,
    pub upstream: MockServer,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Fast retries so failure paths finish in milliseconds.
pub fn test_config(upstream_uri: &str) -> ApiConfig {
    ApiConfig {
        upstream_base_url: upstream_uri.to_string(),
        upstream_timeout: Duration::from_secs(2),
        retry_max_attempts: 3,
        retry_base_delay: Duration::from_millis(10),
        retry_jitter: 0.0,
        ..Default::default()
    }
}

pub async fn spawn_app() -> TestApp {
    let store = InMemoryKvStore::new();
    let upstream = MockServer::start().await;
    let router = build_router(&upstream, Arc::new(store.clone()));
    TestApp {
        router,
        store,
        upstream,
    }
}

/// App whose durable tier is `durable`; `store` is then unused.
pub async fn spawn_app_with_store(durable: Arc<dyn KvStore>) -> TestApp {
    let upstream = MockServer::start().await;
    let router = build_router(&upstream, durable);
    TestApp {
        router,
        store: InMemoryKvStore::new(),
        upstream,
    }
}

fn build_router(upstream: &MockServer, durable: Arc<dyn KvStore>) -> Router {
    let config = test_config(&upstream.uri());
    let client = EnergiDataClient::new(upstream.uri(), config.upstream_timeout);
    create_api_router(AppState::new(config, durable, client))
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().method(Method::GET).uri(uri)).await
    }

    pub async fn send(&self, builder: axum::http::request::Builder) -> TestResponse {
        let request = builder.body(Body::empty()).expect("request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Number of requests the mocked upstream received.
    pub async fn upstream_calls(&self) -> usize {
        self.upstream
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    /// Keys in the durable store under `prefix`.
    pub async fn stored_keys(&self, prefix: &str) -> Vec<String> {
        self.store.keys(prefix).await.unwrap_or_default()
    }
}
