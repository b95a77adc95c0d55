//! REST API Routes Module
//!
//! One module per resource, each exposing `create_router()`. The
//! [`SecureRouterBuilder`] nests them under `/api/v1` behind authentication
//! and adds health, metrics, OpenAPI and CORS.

pub mod accounts;
pub mod activities;
pub mod audit;
pub mod contacts;
pub mod documents;
pub mod health;
pub mod i18n;
pub mod imports;
pub mod leads;
pub mod notes;
pub mod opportunities;
pub mod profiles;
pub mod service_contracts;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::{is_production_environment, ApiConfig};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{
    auth_middleware, rate_limit_middleware, AuthMiddlewareState, RateLimitState,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// SECURE ROUTER BUILDER
// ============================================================================

/// Builds the full router with authentication, rate limiting, observability
/// and CORS. Health, metrics and the OpenAPI document skip authentication
/// and are rate-limited per client IP.
pub struct SecureRouterBuilder {
    state: AppState,
    auth_state: AuthMiddlewareState,
    rate_limit_state: RateLimitState,
}

impl SecureRouterBuilder {
    /// Fails in production when the security configuration is incomplete.
    pub fn new(state: AppState, auth_config: AuthConfig) -> ApiResult<Self> {
        if is_production_environment() {
            auth_config.validate_for_production()?;
            state
                .config
                .validate_for_production()
                .map_err(ApiError::invalid_input)?;
        }

        let rate_limit_state = RateLimitState::new(state.config.clone());
        Ok(Self {
            state,
            auth_state: AuthMiddlewareState::new(auth_config),
            rate_limit_state,
        })
    }

    fn build_entity_routes() -> Router<AppState> {
        Router::new()
            .nest("/profiles", profiles::create_router())
            .nest("/leads", leads::create_router())
            .nest("/accounts", accounts::create_router())
            .nest("/contacts", contacts::create_router())
            .nest("/opportunities", opportunities::create_router())
            .nest("/activities", activities::create_router())
            .nest("/notes", notes::create_router())
            .nest("/documents", documents::create_router())
            .nest("/service-contracts", service_contracts::create_router())
            .nest("/imports", imports::create_router())
            .nest("/audit", audit::create_router())
            .nest("/i18n", i18n::create_router())
    }

    /// # Middleware Order (outer to inner)
    /// 1. CORS
    /// 2. Observability
    /// 3. `/api/v1/*`: auth, then rate limiting keyed on the verified tenant
    /// 4. Public routes: rate limiting keyed on client IP
    pub fn build(self) -> Router {
        let api_routes = Self::build_entity_routes()
            .layer(from_fn_with_state(
                self.rate_limit_state.clone(),
                rate_limit_middleware,
            ))
            .layer(from_fn_with_state(self.auth_state, auth_middleware));

        #[allow(unused_mut)]
        let mut public_routes = Router::new()
            .nest("/health", health::create_router())
            .route("/metrics", get(metrics_handler))
            .route("/openapi.json", get(openapi_json));

        #[cfg(feature = "swagger-ui")]
        {
            use utoipa_swagger_ui::SwaggerUi;
            public_routes = public_routes.merge(
                SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
            );
        }

        let public_routes = public_routes.layer(from_fn_with_state(
            self.rate_limit_state,
            rate_limit_middleware,
        ));

        let cors = build_cors_layer(&self.state.config);

        Router::new()
            .nest("/api/v1", api_routes)
            .merge(public_routes)
            .layer(from_fn(observability_middleware))
            .layer(cors)
            .with_state(self.state)
    }
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Empty `cors_origins` allows every origin (development).
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-tenant-id"),
        ])
        .expose_headers([
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("retry-after"),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: development mode, allowing all origins");
        return cors.allow_origin(Any);
    }

    tracing::info!(origins = ?config.cors_origins, "CORS: restricting origins");
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    if config.cors_allow_credentials {
        cors.allow_origin(origins).allow_credentials(true)
    } else {
        cors.allow_origin(origins)
    }
}

/// Create the complete API router.
///
/// - `/api/v1/*`: resource routes, API key or JWT required
/// - `/health/*`, `/metrics`, `/openapi.json`: public
/// - `/swagger-ui`, `/api-docs/openapi.json`: with the `swagger-ui` feature
pub fn create_api_router(state: AppState, auth_config: AuthConfig) -> ApiResult<Router> {
    SecureRouterBuilder::new(state, auth_config).map(SecureRouterBuilder::build)
}
