//! Elpris API Server Entry Point
//!
//! Loads configuration from the environment, connects the durable cache and
//! starts the Axum HTTP server.

use axum::Router;
use elpris_api::telemetry::{init_tracing, TelemetryConfig};
use elpris_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let addr = api_config.bind_addr()?;
    let state = AppState::from_config(api_config)?;

    tracing::info!(
        durable_backend = state.durable().backend_name(),
        upstream = state.upstream.base_url(),
        "Cache and upstream configured"
    );

    let app: Router = create_api_router(state);

    tracing::info!(%addr, "Starting Elpris API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
