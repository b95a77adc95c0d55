//! In-process test harness: the full router over a `MemoryStore`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use crm_api::{
    create_api_router, generate_jwt_token, services::calendar::NoopCalendarSync, ApiConfig,
    AppState, AuthConfig, JwtSecret,
};
use crm_core::{EntityId, Role, TenantId};
use crm_storage::MemoryStore;
use serde_json::Value;
use tower::ServiceExt;

pub const API_KEY: &str = "integration-test-api-key";

pub struct TestApp {
    pub router: Router,
    pub auth: AuthConfig,
    pub store: Arc<MemoryStore>,
    pub tenant_id: TenantId,
}

pub fn test_app() -> TestApp {
    test_app_with(ApiConfig {
        rate_limit_enabled: false,
        ..ApiConfig::default()
    })
}

pub fn test_app_with(config: ApiConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mut auth = AuthConfig {
        jwt_secret: JwtSecret::new("integration-test-secret-0123456789abcdef".to_string())
            .expect("secret should be accepted"),
        ..AuthConfig::default()
    };
    auth.add_api_key(API_KEY.to_string());

    let state = AppState::new(store.clone(), Arc::new(NoopCalendarSync), config);
    let router = create_api_router(state, auth.clone()).expect("router should build");

    TestApp {
        router,
        auth,
        store,
        tenant_id: TenantId::now_v7(),
    }
}

fn build(
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request should build")
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    /// Call as the API-key service caller of this app's tenant.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let headers = [
            ("x-api-key", API_KEY.to_string()),
            ("x-tenant-id", self.tenant_id.to_string()),
        ];
        self.send(build(method, uri, body, &headers)).await
    }

    /// `Authorization` value for a token bound to this app's tenant.
    pub fn bearer(&self, user_id: EntityId, role: Role) -> String {
        let token = generate_jwt_token(
            &self.auth,
            user_id.to_string(),
            Some(self.tenant_id),
            vec![role.as_db_str().to_string()],
        )
        .expect("token should sign");
        format!("Bearer {}", token)
    }

    /// Call with a bearer token for `user_id` holding `role`.
    pub async fn call_as(
        &self,
        user_id: EntityId,
        role: Role,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let headers = [("authorization", self.bearer(user_id, role))];
        self.send(build(method, uri, body, &headers)).await
    }

    /// Upload CSV text to the staging endpoint as the API-key caller.
    pub async fn upload_csv(&self, csv: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/imports/leads?file_name=leads.csv")
            .header("x-api-key", API_KEY)
            .header("x-tenant-id", self.tenant_id.to_string())
            .header("content-type", "text/csv")
            .body(Body::from(csv.to_string()))
            .expect("request should build");
        self.send(request).await
    }

    /// Upload CSV text as a token holder, optionally with `Accept-Language`.
    pub async fn upload_csv_as(
        &self,
        user_id: EntityId,
        role: Role,
        accept_language: Option<&str>,
        csv: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/imports/leads")
            .header("authorization", self.bearer(user_id, role))
            .header("content-type", "text/csv");
        if let Some(lang) = accept_language {
            builder = builder.header("accept-language", lang);
        }
        let request = builder
            .body(Body::from(csv.to_string()))
            .expect("request should build");
        self.send(request).await
    }
}

/// Parse a JSON id field.
pub fn id(value: &Value, field: &str) -> EntityId {
    value[field]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("missing id field {} in {}", field, value))
}
