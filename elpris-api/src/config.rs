//! API Configuration Module
//!
//! Server binding, CORS, upstream client, retry, cache backend and per-resource
//! TTL settings. Configuration is loaded from environment variables with
//! defaults suitable for local development (no Redis, permissive CORS).

use std::net::SocketAddr;
use std::time::Duration;

use elpris_core::{ConfigError, RetryPolicy};
use elpris_storage::CacheTtl;
use elpris_upstream::DEFAULT_BASE_URL;

use crate::error::{ApiError, ApiResult};

const DAY_SECS: u64 = 24 * 60 * 60;

// ============================================================================
// RESOURCE TTLS
// ============================================================================

/// Durable and memory TTLs for each data route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTtls {
    pub tariff: CacheTtl,
    /// Primary-key TTL for a GLN upstream has no record for.
    pub tariff_negative: Duration,
    pub pricelist: CacheTtl,
    pub spot: CacheTtl,
}

impl Default for ResourceTtls {
    fn default() -> Self {
        Self {
            tariff: CacheTtl::from_secs(3600, 7 * DAY_SECS),
            tariff_negative: Duration::from_secs(900),
            pricelist: CacheTtl::from_secs(3600, 7 * DAY_SECS),
            spot: CacheTtl::from_secs(900, 2 * DAY_SECS),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    // ========================================================================
    // Server
    // ========================================================================
    pub bind_host: String,
    pub port: u16,

    // ========================================================================
    // CORS Configuration
    // ========================================================================
    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://elpris.dk,*.elpris.dk"
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    // ========================================================================
    // Upstream and retry
    // ========================================================================
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_jitter: f64,
    /// Upper bound on the whole retry sequence for one cold key.
    pub request_budget: Duration,

    // ========================================================================
    // Caching
    // ========================================================================
    /// Redis connection URL. `None` selects the in-process key-value store.
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub memory_cache_capacity: usize,
    pub ttls: ResourceTtls,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,

            cors_origins: Vec::new(), // Empty = allow all
            cors_max_age_secs: 86400, // 24 hours

            upstream_base_url: DEFAULT_BASE_URL.to_string(),
            upstream_timeout: Duration::from_millis(8000),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            retry_jitter: 0.2,
            request_budget: Duration::from_millis(25_000),

            redis_url: None,
            redis_prefix: "elpris".to_string(),
            memory_cache_capacity: 500,
            ttls: ResourceTtls::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ELPRIS_API_BIND`: Listen address (default: 0.0.0.0)
    /// - `PORT` / `ELPRIS_API_PORT`: Listen port (default: 3000)
    /// - `ELPRIS_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `ELPRIS_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `ELPRIS_UPSTREAM_BASE_URL`: Dataset API root
    /// - `ELPRIS_UPSTREAM_TIMEOUT_MS`: Per-call timeout (default: 8000)
    /// - `ELPRIS_RETRY_MAX_ATTEMPTS`: Attempts per cold key (default: 3)
    /// - `ELPRIS_RETRY_BASE_DELAY_MS`: First backoff delay (default: 1000)
    /// - `ELPRIS_RETRY_JITTER`: Relative jitter on each delay (default: 0.2)
    /// - `ELPRIS_REQUEST_BUDGET_MS`: Deadline for the retry sequence (default: 25000)
    /// - `ELPRIS_REDIS_URL`: Durable store; unset = in-process store
    /// - `ELPRIS_REDIS_PREFIX`: Key namespace (default: elpris)
    /// - `ELPRIS_MEMORY_CACHE_CAPACITY`: Memory cache entries (default: 500)
    /// - `ELPRIS_{TARIFF,PRICELIST,SPOT}_TTL_SECS`, `ELPRIS_{..}_LATEST_TTL_SECS`,
    ///   `ELPRIS_TARIFF_NEGATIVE_TTL_SECS`: TTL overrides
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values fall back
    /// to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let secs_or = |key: &str, fallback: Duration| {
            parsed(key).map(Duration::from_secs).unwrap_or(fallback)
        };
        let millis_or = |key: &str, fallback: Duration| {
            parsed(key).map(Duration::from_millis).unwrap_or(fallback)
        };
        let ttl_or = |resource: &str, fallback: CacheTtl| CacheTtl {
            primary: secs_or(&format!("ELPRIS_{}_TTL_SECS", resource), fallback.primary),
            latest: secs_or(&format!("ELPRIS_{}_LATEST_TTL_SECS", resource), fallback.latest),
        };

        let cors_origins = lookup("ELPRIS_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port = lookup("PORT")
            .or_else(|| lookup("ELPRIS_API_PORT"))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.port);

        let redis_url = lookup("ELPRIS_REDIS_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            bind_host: lookup("ELPRIS_API_BIND").unwrap_or(defaults.bind_host),
            port,
            cors_origins,
            cors_max_age_secs: parsed("ELPRIS_CORS_MAX_AGE_SECS")
                .unwrap_or(defaults.cors_max_age_secs),
            upstream_base_url: lookup("ELPRIS_UPSTREAM_BASE_URL")
                .unwrap_or(defaults.upstream_base_url),
            upstream_timeout: millis_or("ELPRIS_UPSTREAM_TIMEOUT_MS", defaults.upstream_timeout),
            retry_max_attempts: lookup("ELPRIS_RETRY_MAX_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.retry_max_attempts),
            retry_base_delay: millis_or("ELPRIS_RETRY_BASE_DELAY_MS", defaults.retry_base_delay),
            retry_jitter: lookup("ELPRIS_RETRY_JITTER")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.retry_jitter),
            request_budget: millis_or("ELPRIS_REQUEST_BUDGET_MS", defaults.request_budget),
            redis_url,
            redis_prefix: lookup("ELPRIS_REDIS_PREFIX").unwrap_or(defaults.redis_prefix),
            memory_cache_capacity: lookup("ELPRIS_MEMORY_CACHE_CAPACITY")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.memory_cache_capacity),
            ttls: ResourceTtls {
                tariff: ttl_or("TARIFF", defaults.ttls.tariff),
                tariff_negative: secs_or(
                    "ELPRIS_TARIFF_NEGATIVE_TTL_SECS",
                    defaults.ttls.tariff_negative,
                ),
                pricelist: ttl_or("PRICELIST", defaults.ttls.pricelist),
                spot: ttl_or("SPOT", defaults.ttls.spot),
            },
        }
    }

    /// Reject settings the cache layer cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_max_attempts == 0 {
            return Err(invalid("ELPRIS_RETRY_MAX_ATTEMPTS", "0", "must be at least 1"));
        }
        if self.memory_cache_capacity == 0 {
            return Err(invalid("ELPRIS_MEMORY_CACHE_CAPACITY", "0", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(invalid(
                "ELPRIS_RETRY_JITTER",
                &self.retry_jitter.to_string(),
                "must be in [0, 1)",
            ));
        }
        for (resource, ttl) in [
            ("TARIFF", self.ttls.tariff),
            ("PRICELIST", self.ttls.pricelist),
            ("SPOT", self.ttls.spot),
        ] {
            if ttl.latest < ttl.primary {
                return Err(invalid(
                    &format!("ELPRIS_{}_LATEST_TTL_SECS", resource),
                    &ttl.latest.as_secs().to_string(),
                    &format!("must not be shorter than the primary TTL ({}s)", ttl.primary.as_secs()),
                ));
            }
        }
        Ok(())
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    /// Backoff policy for upstream calls. The request budget is applied per
    /// computation by the cache orchestrator.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_max_attempts, self.retry_base_delay)
            .with_jitter(self.retry_jitter)
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            // Dev mode: allow all
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.elpris.dk
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern))
                        || origin_domain == pattern;
                }
            }
            false
        })
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ApiConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_millis(1000));
        assert_eq!(config.retry_jitter, 0.2);
        assert_eq!(config.request_budget, Duration::from_millis(25_000));
        assert!(config.redis_url.is_none());
        assert_eq!(config.memory_cache_capacity, 500);
        assert_eq!(config.ttls.tariff, CacheTtl::from_secs(3600, 604_800));
        assert_eq!(config.ttls.tariff_negative, Duration::from_secs(900));
        assert_eq!(config.ttls.spot, CacheTtl::from_secs(900, 172_800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("ELPRIS_API_PORT", "9090"),
            ("ELPRIS_REDIS_URL", "redis://cache:6379"),
            ("ELPRIS_RETRY_MAX_ATTEMPTS", "5"),
            ("ELPRIS_SPOT_TTL_SECS", "600"),
            ("ELPRIS_TARIFF_NEGATIVE_TTL_SECS", "120"),
            ("ELPRIS_CORS_ORIGINS", "https://elpris.dk, *.elpris.dk,"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.ttls.spot.primary, Duration::from_secs(600));
        assert_eq!(config.ttls.spot.latest, Duration::from_secs(172_800));
        assert_eq!(config.ttls.tariff_negative, Duration::from_secs(120));
        assert_eq!(config.cors_origins, vec!["https://elpris.dk", "*.elpris.dk"]);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("PORT", "http"),
            ("ELPRIS_RETRY_JITTER", "lots"),
            ("ELPRIS_REDIS_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.retry_jitter, 0.2);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = config_from(&[("ELPRIS_RETRY_MAX_ATTEMPTS", "0")]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let config = config_from(&[("ELPRIS_MEMORY_CACHE_CAPACITY", "0")]);
        assert!(config.validate().is_err());

        let config = config_from(&[("ELPRIS_RETRY_JITTER", "1.0")]);
        assert!(config.validate().is_err());

        let config = config_from(&[("ELPRIS_PRICELIST_LATEST_TTL_SECS", "60")]);
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "ELPRIS_PRICELIST_LATEST_TTL_SECS")
            }
            other => panic!("expected invalid latest TTL, got {:?}", other),
        }
    }

    #[test]
    fn test_bind_addr() {
        let config = config_from(&[("ELPRIS_API_BIND", "127.0.0.1"), ("PORT", "4000")]);
        assert_eq!(config.bind_addr().map(|a| a.port()), Ok(4000));

        let config = config_from(&[("ELPRIS_API_BIND", "not a host")]);
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_retry_policy_carries_jitter() {
        let policy = config_from(&[]).retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.jitter, 0.2);
        assert!(policy.deadline.is_none());
    }

    #[test]
    fn test_origin_allowed_dev_mode() {
        let config = ApiConfig::default();
        assert!(!config.is_production());
        assert!(config.is_origin_allowed("https://anything.com"));
        assert!(config.is_origin_allowed("http://localhost:3000"));
    }

    #[test]
    fn test_origin_allowed_production() {
        let config = ApiConfig {
            cors_origins: vec!["https://elpris.dk".to_string(), "*.elpris.dk".to_string()],
            ..Default::default()
        };
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://elpris.dk"));
        assert!(config.is_origin_allowed("https://www.elpris.dk"));
        assert!(!config.is_origin_allowed("https://evil.com"));
        assert!(!config.is_origin_allowed("https://notelpris.dk"));
        assert!(!config.is_origin_allowed("http://www.elpris.dk"));
    }
}
