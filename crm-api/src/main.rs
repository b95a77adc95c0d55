//! CRM API server entry point
//!
//! Loads configuration from the environment, picks the storage backend and
//! serves the Axum router until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use crm_api::config::is_production_environment;
use crm_api::services::calendar;
use crm_api::telemetry::{init_tracing, TelemetryConfig};
use crm_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, DbConfig, PgStore,
    SharedStore,
};
use crm_storage::MemoryStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let store = open_store().await?;
    let calendar = calendar::from_config(&api_config.calendar)
        .map_err(|e| ApiError::internal_error(format!("Calendar sync setup failed: {}", e)))?;

    let state = AppState::new(store, calendar, api_config);
    let app = create_api_router(state, auth_config)?;

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting CRM API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

/// PostgreSQL when `CRM_DB_HOST` is set, otherwise the in-memory store.
async fn open_store() -> ApiResult<SharedStore> {
    match DbConfig::from_env() {
        Some(db_config) => {
            let store = PgStore::new(db_config.create_pool()?);
            if db_config.migrate {
                store.migrate().await?;
            }
            tracing::info!(
                host = %db_config.host,
                db = %db_config.dbname,
                "Using PostgreSQL storage"
            );
            Ok(Arc::new(store))
        }
        None if is_production_environment() => Err(ApiError::invalid_input(
            "CRM_DB_HOST must be set in production",
        )),
        None => {
            tracing::warn!("CRM_DB_HOST not set, using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("CRM_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("CRM_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
