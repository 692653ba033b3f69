//! Elpris API - HTTP Layer
//!
//! Axum router over the cache orchestrator: request validation, cache
//! headers, CORS, health checks and Prometheus metrics. The data routes
//! always answer HTTP 200 once the query validates, serving stale or empty
//! payloads rather than surfacing upstream failures.

pub mod cache_headers;
pub mod config;
pub mod error;
pub mod macros;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod validation;

pub use cache_headers::{cache_control, CachedJson};
pub use config::{ApiConfig, ResourceTtls};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
