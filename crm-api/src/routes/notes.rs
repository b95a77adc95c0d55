//! Note REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::{new_entity_id, EntityId, EntityRef, EntityType, ListFilter, Note, Page, TenantId};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::{authorize, authorize_owned, ensure_exists};
use crate::state::AppState;
use crate::types::{validate_link_target, CreateNoteRequest, TargetQuery, UpdateNoteRequest};

fn note_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Note, id)
}

async fn load(state: &AppState, tenant_id: TenantId, id: EntityId) -> ApiResult<Note> {
    state
        .store
        .note_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Note", id))
}

/// POST /api/v1/notes - Add a note to a record
#[utoipa::path(
    post,
    path = "/api/v1/notes",
    tag = "Notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Target record not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_note(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::Create)?;
    req.validate()?;
    let target = req.target();
    validate_link_target(&target)?;
    ensure_exists(&state.store, target, auth.tenant_id).await?;

    let now = Utc::now();
    let note = Note {
        note_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        author_id: auth.user_id,
        entity_type: target.entity_type,
        entity_id: target.entity_id,
        body: req.body.trim().to_string(),
        created_at: now,
        updated_at: now,
    };
    state.store.note_insert(&note).await?;
    state.audit().created(&auth, note_ref(note.note_id), &note).await;

    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/v1/notes - List the notes of one record
#[utoipa::path(
    get,
    path = "/api/v1/notes",
    tag = "Notes",
    params(TargetQuery, ListFilter),
    responses(
        (status = 200, description = "Page of notes", body = Page<Note>),
        (status = 400, description = "Target record not given", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_notes(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(target): Query<TargetQuery>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Note>>> {
    authorize(&auth, Action::Read)?;
    let page = state
        .store
        .note_list(auth.tenant_id, target.require_target()?, &filter)
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/notes/{id} - Get a note
#[utoipa::path(
    get,
    path = "/api/v1/notes/{id}",
    tag = "Notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note", body = Note),
        (status = 404, description = "Note not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_note(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Note>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, auth.tenant_id, id).await?))
}

/// PATCH /api/v1/notes/{id} - Edit a note
#[utoipa::path(
    patch,
    path = "/api/v1/notes/{id}",
    tag = "Notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = UpdateNoteRequest,
    responses(
        (status = 200, description = "Note updated", body = Note),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Not the author", body = ApiError),
        (status = 404, description = "Note not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_note(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateNoteRequest>,
) -> ApiResult<Json<Note>> {
    req.validate()?;
    let mut note = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, note.author_id, Action::Update)?;

    let before = note.clone();
    note.body = req.body.trim().to_string();
    note.updated_at = Utc::now();
    state.store.note_update(&note).await?;
    state.audit().updated(&auth, note_ref(id), &before, &note).await;

    Ok(Json(note))
}

/// DELETE /api/v1/notes/{id} - Delete a note
#[utoipa::path(
    delete,
    path = "/api/v1/notes/{id}",
    tag = "Notes",
    params(("id" = Uuid, Path, description = "Note ID")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 404, description = "Note not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_note(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    let note = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, note.author_id, Action::Delete)?;

    state.store.note_delete(id, auth.tenant_id).await?;
    state.audit().deleted(&auth, note_ref(id), &note).await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notes).post(create_note))
        .route("/:id", get(get_note).patch(update_note).delete(delete_note))
}
