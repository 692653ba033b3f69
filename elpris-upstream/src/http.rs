//! HTTP fetch wrapper.
//!
//! Issues exactly one request and gives back the status and body untouched.
//! Status codes are not interpreted here. The only failure modes are
//! [`FetchError::Timeout`] when the deadline passes and
//! [`FetchError::Network`] / [`FetchError::Body`] for transport failures.

use std::time::Duration;

use elpris_core::FetchError;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

/// Deadline used when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            query: Vec::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status and body as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Send `request`, giving up once `request.timeout` has elapsed.
///
/// The deadline covers connecting, sending and reading the whole body.
pub async fn fetch_with_timeout(
    client: &Client,
    request: FetchRequest,
) -> Result<RawResponse, FetchError> {
    let url = request.url.clone();
    let timeout = request.timeout;

    let mut builder = client.request(request.method, &request.url);
    if !request.query.is_empty() {
        builder = builder.query(&request.query);
    }
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }

    let exchange = async {
        let response = builder.send().await.map_err(|e| transport_error(&url, timeout, e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                timed_out(&url, timeout)
            } else {
                FetchError::Body {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;
        Ok(RawResponse { status, body })
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(timed_out(&url, timeout)),
    }
}

fn timed_out(url: &str, timeout: Duration) -> FetchError {
    FetchError::Timeout {
        url: url.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

fn transport_error(url: &str, timeout: Duration, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return timed_out(url, timeout);
    }
    FetchError::Network {
        url: url.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_returns_status_and_body_unmodified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dataset/Elspotprices"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let response = fetch_with_timeout(
            &Client::new(),
            FetchRequest::get(format!("{}/dataset/Elspotprices", server.uri())).query("limit", "5"),
        )
        .await
        .expect("response");

        assert_eq!(response.status, 503);
        assert_eq!(response.body, "maintenance");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({ "ok": true })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"records":[]}"#))
            .mount(&server)
            .await;

        let response = fetch_with_timeout(
            &Client::new(),
            FetchRequest::post(format!("{}/hook", server.uri()), serde_json::json!({ "ok": true })),
        )
        .await
        .expect("response");

        assert!(response.is_success());
        let parsed: serde_json::Value = response.json().expect("json");
        assert_eq!(parsed["records"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = fetch_with_timeout(
            &Client::new(),
            FetchRequest::get(server.uri()).timeout(Duration::from_millis(50)),
        )
        .await
        .expect_err("timeout");

        assert!(matches!(err, FetchError::Timeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_network_error() {
        let err = fetch_with_timeout(
            &Client::new(),
            FetchRequest::get("http://127.0.0.1:1/unreachable").timeout(Duration::from_secs(2)),
        )
        .await
        .expect_err("network error");

        assert!(matches!(err, FetchError::Network { .. }));
    }
}
