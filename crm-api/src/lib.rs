//! CRM API - REST layer for the multi-tenant CRM
//!
//! Axum routes over a [`crm_storage::CrmStore`], with API key / JWT
//! authentication, role-based permissions, an audit trail, CSV lead import
//! and service-contract scheduling with calendar sync.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod validation;

pub use auth::{
    authenticate, authenticate_api_key, authenticate_jwt, extract_tenant_id, generate_jwt_token,
    validate_api_key, validate_jwt_token, AuthConfig, AuthContext, AuthMethod, Claims, JwtSecret,
};
pub use config::{ApiConfig, CalendarConfig};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use routes::{create_api_router, SecureRouterBuilder};
pub use state::{AppState, SharedCalendar, SharedStore};
pub use types::*;
