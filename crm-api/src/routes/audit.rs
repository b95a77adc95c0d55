//! Audit Log REST API Routes
//!
//! Read-only. Entries are written by the handlers that change records.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use crm_core::permissions::Action;
use crm_core::{AuditLog, ListFilter, Page};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::authorize;
use crate::state::AppState;
use crate::types::TargetQuery;

/// GET /api/v1/audit - List audit entries, newest first
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    tag = "Audit",
    params(TargetQuery, ListFilter),
    responses(
        (status = 200, description = "Page of audit entries", body = Page<AuditLog>),
        (status = 400, description = "Incomplete target filter", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_audit(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(target): Query<TargetQuery>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<AuditLog>>> {
    authorize(&auth, Action::ViewAudit)?;
    let page = state
        .store
        .audit_list(auth.tenant_id, target.target()?, &filter)
        .await?;
    Ok(Json(page))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", get(list_audit))
}
