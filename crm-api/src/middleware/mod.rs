//! Middleware for the CRM API
//!
//! - `auth`: authentication, `AuthContext` injection and the typed extractor
//! - `rate_limit`: per-tenant / per-IP request quotas
//!
//! # Middleware Order
//!
//! ```ignore
//! let api_routes = entity_routes
//!     .layer(from_fn_with_state(rate_limit_state.clone(), rate_limit_middleware))
//!     .layer(from_fn_with_state(auth_state, auth_middleware));
//! let public_routes = public_routes
//!     .layer(from_fn_with_state(rate_limit_state, rate_limit_middleware));
//! Router::new()
//!     .nest("/api/v1", api_routes)
//!     .merge(public_routes)
//!     .layer(from_fn(observability_middleware))
//!     .layer(cors)
//! ```

mod auth;
mod rate_limit;

pub use auth::{
    auth_middleware, extract_auth_context, AuthExtractor, AuthMiddlewareError,
    AuthMiddlewareState,
};
pub use rate_limit::{rate_limit_middleware, RateLimitError, RateLimitKey, RateLimitState};
