//! Error types for Elpris operations

use thiserror::Error;

/// Outbound HTTP errors raised by the fetch wrapper.
///
/// A timeout is kept distinct from other network failures so callers can
/// tell "upstream was slow" apart from "upstream was unreachable".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Errors raised by the upstream energy-market data client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Transient failure from {dataset}: {reason}")]
    Transient { dataset: String, reason: String },

    #[error("Upstream rejected {dataset} query with status {status}: {message}")]
    Client {
        dataset: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {dataset}: {reason}")]
    Decode { dataset: String, reason: String },
}

impl UpstreamError {
    /// Build an error from a non-success status code.
    ///
    /// 5xx, 408 and 429 are transient; any other status is a client error.
    pub fn from_status(dataset: &str, status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status >= 500 || status == 408 || status == 429 {
            UpstreamError::Transient {
                dataset: dataset.to_string(),
                reason: format!("status {}: {}", status, message),
            }
        } else {
            UpstreamError::Client {
                dataset: dataset.to_string(),
                status,
                message,
            }
        }
    }

    /// Wrap a fetch failure for the given dataset.
    pub fn from_fetch(dataset: &str, err: FetchError) -> Self {
        UpstreamError::Transient {
            dataset: dataset.to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient { .. })
    }
}

/// Cache layer errors.
///
/// These never cross the durable gateway's public read boundary; they exist
/// so internal code can tell a missing key from an unreachable backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache value for {key} could not be (de)serialized: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Cache operation '{operation}' timed out")]
    Timeout { operation: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Elpris errors.
#[derive(Debug, Clone, Error)]
pub enum ElprisError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Elpris operations.
pub type ElprisResult<T> = Result<T, ElprisError>;

// =============================================================================
// TESTS
// =============================================================================
