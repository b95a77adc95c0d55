//! Authentication middleware
//!
//! Authenticates every request under `/api/v1`, injects [`AuthContext`] into
//! request extensions and rejects unauthenticated requests with 401.

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Shared state for authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
        }
    }
}

/// Axum middleware for authentication.
///
/// Reads `X-API-Key` or `Authorization: Bearer`, plus `X-Tenant-ID`.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    // Owned copies so no borrow of the request lives across the await below
    let (api_key, authorization, tenant_header) = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::to_owned)
        };
        (
            header("x-api-key"),
            header("authorization"),
            header("x-tenant-id"),
        )
    };

    let auth_context = authenticate(
        &state.auth_config,
        api_key.as_deref(),
        authorization.as_deref(),
        tenant_header.as_deref(),
    )
    .map_err(AuthMiddlewareError)?;

    tracing::debug!(
        subject = %auth_context.subject,
        tenant_id = %auth_context.tenant_id,
        role = %auth_context.role,
        "request authenticated"
    );

    request.extensions_mut().insert(auth_context);
    Ok(next.run(request).await)
}

/// Error wrapper for middleware rejections.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the authentication context.
///
/// Requires `auth_middleware` on the route; otherwise extraction fails with
/// a 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(AuthExtractor)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "AuthContext not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub fn extract_auth_context(request: &Request) -> ApiResult<&AuthContext> {
    request
        .extensions()
        .get::<AuthContext>()
        .ok_or_else(|| ApiError::unauthorized("Auth context missing from request"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{generate_jwt_token, JwtSecret};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use crm_core::Role;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_auth_config() -> AuthConfig {
        let mut config = AuthConfig::default();
        config.add_api_key("test_key_123".to_string());
        config.jwt_secret =
            JwtSecret::new("test_secret".to_string()).expect("test secret should be valid");
        config.require_tenant_header = true;
        config
    }

    fn test_app(config: AuthConfig) -> Router {
        async fn whoami(auth: AuthExtractor) -> String {
            format!("{}:{}", auth.tenant_id, auth.role)
        }

        Router::new()
            .route("/protected", get(whoami))
            .layer(middleware::from_fn_with_state(
                AuthMiddlewareState::new(config),
                auth_middleware,
            ))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
    }

    #[tokio::test]
    async fn test_valid_api_key_injects_service_role() -> Result<(), String> {
        let tenant_id = Uuid::now_v7();
        let request = Request::builder()
            .uri("/protected")
            .header("x-api-key", "test_key_123")
            .header("x-tenant-id", tenant_id.to_string())
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app(test_auth_config())
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, format!("{}:Admin", tenant_id));
        Ok(())
    }

    #[tokio::test]
    async fn test_valid_jwt_injects_token_role() -> Result<(), String> {
        let config = test_auth_config();
        let tenant_id = Uuid::now_v7();
        let token = generate_jwt_token(
            &config,
            Uuid::now_v7().to_string(),
            Some(tenant_id),
            vec!["viewer".to_string()],
        )
        .map_err(|e| e.to_string())?;

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app(config)
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            format!("{}:{}", tenant_id, Role::Viewer)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_api_key_is_unauthorized() -> Result<(), String> {
        let request = Request::builder()
            .uri("/protected")
            .header("x-api-key", "invalid_key")
            .header("x-tenant-id", Uuid::now_v7().to_string())
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app(test_auth_config())
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unauthorized() -> Result<(), String> {
        let request = Request::builder()
            .uri("/protected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app(test_auth_config())
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_tenant_header_is_bad_request() -> Result<(), String> {
        let request = Request::builder()
            .uri("/protected")
            .header("x-api-key", "test_key_123")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app(test_auth_config())
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn test_extractor_without_middleware_fails() -> Result<(), String> {
        async fn handler(AuthExtractor(_auth): AuthExtractor) -> &'static str {
            "unreachable"
        }

        let app = Router::new().route("/unprotected", get(handler));
        let request = Request::builder()
            .uri("/unprotected")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_authenticated_requests_run_on_spawned_tasks() -> Result<(), String> {
        let app = test_app(test_auth_config());
        let tenant_id = Uuid::now_v7();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let app = app.clone();
                tokio::spawn(async move {
                    let request = Request::builder()
                        .uri("/protected")
                        .header("x-api-key", "test_key_123")
                        .header("x-tenant-id", tenant_id.to_string())
                        .body(Body::empty())
                        .map_err(|e| e.to_string())?;
                    app.oneshot(request)
                        .await
                        .map(|response| response.status())
                        .map_err(|e| format!("Request failed: {:?}", e))
                })
            })
            .collect();

        for handle in handles {
            let status = handle.await.map_err(|e| e.to_string())??;
            assert_eq!(status, StatusCode::OK);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_jwt_with_foreign_tenant_header_is_forbidden() -> Result<(), String> {
        let config = test_auth_config();
        let token = generate_jwt_token(
            &config,
            Uuid::now_v7().to_string(),
            Some(Uuid::now_v7()),
            vec!["admin".to_string()],
        )
        .map_err(|e| e.to_string())?;

        let request = Request::builder()
            .uri("/protected")
            .header("authorization", format!("Bearer {}", token))
            .header("x-tenant-id", Uuid::now_v7().to_string())
            .body(Body::empty())
            .map_err(|e| e.to_string())?;

        let response = test_app(config)
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }
}
