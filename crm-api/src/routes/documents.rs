//! Document REST API Routes
//!
//! Only metadata is stored. The bytes live wherever `storage_path` points.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use crm_core::permissions::Action;
use crm_core::{Document, DocumentLink, EntityId, ListFilter, Page};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::authorize;
use crate::services::documents;
use crate::state::AppState;
use crate::types::{CreateDocumentLinkRequest, CreateDocumentRequest, DocumentResponse, TargetQuery};

/// POST /api/v1/documents - Register a document
#[utoipa::path(
    post,
    path = "/api/v1/documents",
    tag = "Documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Linked record not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_document(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = documents::create(&state, &auth, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/documents - List documents, optionally those linked to one record
#[utoipa::path(
    get,
    path = "/api/v1/documents",
    tag = "Documents",
    params(TargetQuery, ListFilter),
    responses(
        (status = 200, description = "Page of documents", body = Page<Document>),
        (status = 400, description = "Incomplete target filter", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_documents(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(target): Query<TargetQuery>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Document>>> {
    authorize(&auth, Action::Read)?;
    let page = state
        .store
        .document_list(auth.tenant_id, target.target()?, &filter)
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/documents/{id} - Get a document and its links
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document", body = DocumentResponse),
        (status = 404, description = "Document not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_document(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<DocumentResponse>> {
    Ok(Json(documents::get(&state, &auth, id).await?))
}

/// GET /api/v1/documents/{id}/links - List the records a document is attached to
#[utoipa::path(
    get,
    path = "/api/v1/documents/{id}/links",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document links", body = Vec<DocumentLink>),
        (status = 404, description = "Document not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_document_links(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Vec<DocumentLink>>> {
    Ok(Json(documents::get(&state, &auth, id).await?.links))
}

/// POST /api/v1/documents/{id}/links - Attach a document to another record
#[utoipa::path(
    post,
    path = "/api/v1/documents/{id}/links",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    request_body = CreateDocumentLinkRequest,
    responses(
        (status = 201, description = "Link created", body = DocumentLink),
        (status = 404, description = "Document or record not found", body = ApiError),
        (status = 409, description = "Already linked", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_document_link(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<CreateDocumentLinkRequest>,
) -> ApiResult<impl IntoResponse> {
    let link = documents::add_link(&state, &auth, id, req.target).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// DELETE /api/v1/documents/{id} - Delete a document and its links
#[utoipa::path(
    delete,
    path = "/api/v1/documents/{id}",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_document(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    documents::delete(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents).post(create_document))
        .route("/:id", get(get_document).delete(delete_document))
        .route(
            "/:id/links",
            get(list_document_links).post(create_document_link),
        )
}
