//! CSV Lead Import REST API Routes
//!
//! Upload stages a batch and returns the preview; nothing becomes a lead
//! until the batch is confirmed.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header::ACCEPT_LANGUAGE, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use crm_core::{EntityId, ImportError};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::{access::resolve_locale, imports};
use crate::state::AppState;
use crate::types::{ConfirmImportRequest, ImportPreviewResponse, ImportReport, StageImportParams};

/// Read the upload without buffering more than `max_bytes + 1` bytes.
async fn read_csv(body: Body, max_bytes: usize) -> ApiResult<String> {
    let bytes = axum::body::to_bytes(body, max_bytes.saturating_add(1))
        .await
        .map_err(|_| ApiError::from(ImportError::TooLarge { max_bytes }))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ApiError::invalid_format("body", "UTF-8 encoded CSV"))
}

/// POST /api/v1/imports/leads - Upload a CSV file of leads
///
/// The raw CSV is the request body. Row messages are rendered in the
/// caller's locale.
#[utoipa::path(
    post,
    path = "/api/v1/imports/leads",
    tag = "Imports",
    params(StageImportParams),
    request_body(content = String, content_type = "text/csv", description = "CSV file with a header row"),
    responses(
        (status = 201, description = "Batch staged", body = ImportPreviewResponse),
        (status = 400, description = "Body is not UTF-8", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 413, description = "File too large", body = ApiError),
        (status = 422, description = "Empty, malformed or unmappable file", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn stage_import(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(params): Query<StageImportParams>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<impl IntoResponse> {
    let text = read_csv(body, state.config.import_limits.max_bytes).await?;
    let accept_language = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
    let locale = resolve_locale(&state.store, &auth, accept_language).await;

    let preview = imports::stage(&state, &auth, params.file_name, &text, locale).await?;
    Ok((StatusCode::CREATED, Json(preview)))
}

/// GET /api/v1/imports/{id} - Get a staged or applied batch
#[utoipa::path(
    get,
    path = "/api/v1/imports/{id}",
    tag = "Imports",
    params(("id" = Uuid, Path, description = "Import batch ID")),
    responses(
        (status = 200, description = "Batch and its rows", body = ImportPreviewResponse),
        (status = 404, description = "Batch not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_import(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<ImportPreviewResponse>> {
    Ok(Json(imports::get(&state, &auth, id).await?))
}

/// POST /api/v1/imports/{id}/confirm - Create leads from the valid rows
#[utoipa::path(
    post,
    path = "/api/v1/imports/{id}/confirm",
    tag = "Imports",
    params(("id" = Uuid, Path, description = "Import batch ID")),
    request_body = ConfirmImportRequest,
    responses(
        (status = 200, description = "Batch applied", body = ImportReport),
        (status = 404, description = "Batch not found", body = ApiError),
        (status = 409, description = "Batch already confirmed or discarded", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn confirm_import(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    headers: HeaderMap,
    Json(req): Json<ConfirmImportRequest>,
) -> ApiResult<Json<ImportReport>> {
    let accept_language = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
    let locale = resolve_locale(&state.store, &auth, accept_language).await;
    Ok(Json(imports::confirm(&state, &auth, id, req, locale).await?))
}

/// DELETE /api/v1/imports/{id} - Discard a staged batch
#[utoipa::path(
    delete,
    path = "/api/v1/imports/{id}",
    tag = "Imports",
    params(("id" = Uuid, Path, description = "Import batch ID")),
    responses(
        (status = 204, description = "Batch discarded"),
        (status = 404, description = "Batch not found", body = ApiError),
        (status = 409, description = "Batch already confirmed or discarded", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn discard_import(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    imports::discard(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route(
            "/leads",
            post(stage_import).layer(DefaultBodyLimit::disable()),
        )
        .route("/:id", get(get_import).delete(discard_import))
        .route("/:id/confirm", post(confirm_import))
}
