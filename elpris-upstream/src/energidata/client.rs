//! Dataset client with status classification.

use std::time::Duration;

use elpris_core::{DatasetResponse, UpstreamError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::types::{DatasetQuery, DEFAULT_BASE_URL};
use crate::http::{fetch_with_timeout, FetchRequest, DEFAULT_TIMEOUT};

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the public energy-market dataset API.
#[derive(Clone)]
pub struct EnergiDataClient {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl Default for EnergiDataClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }
}

impl EnergiDataClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, timeout)
    }

    /// Reuse an existing connection pool.
    pub fn with_client(http: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one dataset query.
    ///
    /// - 2xx: decoded; a body without `records` decodes as empty
    /// - 400/404 with `empty_on_not_found`: empty records
    /// - 5xx, 408, 429, timeouts and network failures: [`UpstreamError::Transient`]
    /// - any other status: [`UpstreamError::Client`]
    pub async fn query<R: DeserializeOwned>(
        &self,
        dataset: &str,
        query: &DatasetQuery,
    ) -> Result<DatasetResponse<R>, UpstreamError> {
        let mut request =
            FetchRequest::get(format!("{}/{}", self.base_url, dataset)).timeout(self.timeout);
        for (name, value) in query.to_params() {
            request = request.query(name, value);
        }

        let response = fetch_with_timeout(&self.http, request)
            .await
            .map_err(|e| {
                warn!(dataset, error = %e, "Upstream request failed");
                UpstreamError::from_fetch(dataset, e)
            })?;

        if response.is_success() {
            let decoded: DatasetResponse<R> =
                response.json().map_err(|e| UpstreamError::Decode {
                    dataset: dataset.to_string(),
                    reason: e.to_string(),
                })?;
            debug!(dataset, records = decoded.records.len(), "Upstream query succeeded");
            return Ok(decoded);
        }

        if query.empty_on_not_found && matches!(response.status, 400 | 404) {
            debug!(dataset, status = response.status, "Upstream has no data; returning empty records");
            return Ok(DatasetResponse::empty());
        }

        let err = UpstreamError::from_status(dataset, response.status, truncate(&response.body));
        warn!(dataset, status = response.status, error = %err, "Upstream returned an error status");
        Err(err)
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl std::fmt::Debug for EnergiDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnergiDataClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
