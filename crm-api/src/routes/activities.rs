//! Activity REST API Routes
//!
//! Calls, emails, meetings and tasks attached to a lead, account, contact,
//! opportunity or service contract.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::{
    new_entity_id, Activity, EntityId, EntityRef, EntityType, ListFilter, Page, TenantId,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::{authorize, authorize_owned, ensure_exists};
use crate::state::AppState;
use crate::types::{validate_link_target, CreateActivityRequest, TargetQuery, UpdateActivityRequest};
use crate::validation::clean;

fn activity_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Activity, id)
}

async fn load(state: &AppState, tenant_id: TenantId, id: EntityId) -> ApiResult<Activity> {
    state
        .store
        .activity_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Activity", id))
}

/// POST /api/v1/activities - Log an activity
#[utoipa::path(
    post,
    path = "/api/v1/activities",
    tag = "Activities",
    request_body = CreateActivityRequest,
    responses(
        (status = 201, description = "Activity created", body = Activity),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Target record not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_activity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateActivityRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::Create)?;
    req.validate()?;
    let target = req.target();
    validate_link_target(&target)?;
    ensure_exists(&state.store, target, auth.tenant_id).await?;

    let now = Utc::now();
    let activity = Activity {
        activity_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: req.owner_id.or(auth.user_id),
        activity_type: req.activity_type,
        subject: req.subject.trim().to_string(),
        description: clean(req.description),
        entity_type: target.entity_type,
        entity_id: target.entity_id,
        due_at: req.due_at,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };
    state.store.activity_insert(&activity).await?;
    state
        .audit()
        .created(&auth, activity_ref(activity.activity_id), &activity)
        .await;

    Ok((StatusCode::CREATED, Json(activity)))
}

/// GET /api/v1/activities - List activities, optionally for one record
#[utoipa::path(
    get,
    path = "/api/v1/activities",
    tag = "Activities",
    params(TargetQuery, ListFilter),
    responses(
        (status = 200, description = "Page of activities", body = Page<Activity>),
        (status = 400, description = "Incomplete target filter", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_activities(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(target): Query<TargetQuery>,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Activity>>> {
    authorize(&auth, Action::Read)?;
    let page = state
        .store
        .activity_list(auth.tenant_id, target.target()?, &filter)
        .await?;
    Ok(Json(page))
}

/// GET /api/v1/activities/{id} - Get an activity
#[utoipa::path(
    get,
    path = "/api/v1/activities/{id}",
    tag = "Activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity", body = Activity),
        (status = 404, description = "Activity not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_activity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Activity>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, auth.tenant_id, id).await?))
}

/// PATCH /api/v1/activities/{id} - Update an activity
///
/// `completed: true` stamps `completed_at`; `false` reopens the activity.
#[utoipa::path(
    patch,
    path = "/api/v1/activities/{id}",
    tag = "Activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    request_body = UpdateActivityRequest,
    responses(
        (status = 200, description = "Activity updated", body = Activity),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Activity not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_activity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateActivityRequest>,
) -> ApiResult<Json<Activity>> {
    req.validate()?;
    let mut activity = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, activity.owner_id, Action::Update)?;

    let before = activity.clone();
    let now = Utc::now();
    if let Some(subject) = req.subject {
        activity.subject = subject.trim().to_string();
    }
    if req.description.is_some() {
        activity.description = clean(req.description);
    }
    if let Some(owner_id) = req.owner_id {
        activity.owner_id = Some(owner_id);
    }
    if let Some(due_at) = req.due_at {
        activity.due_at = Some(due_at);
    }
    match req.completed {
        Some(true) if activity.completed_at.is_none() => activity.completed_at = Some(now),
        Some(false) => activity.completed_at = None,
        _ => {}
    }
    activity.updated_at = now;

    state.store.activity_update(&activity).await?;
    state
        .audit()
        .updated(&auth, activity_ref(id), &before, &activity)
        .await;

    Ok(Json(activity))
}

/// DELETE /api/v1/activities/{id} - Delete an activity
#[utoipa::path(
    delete,
    path = "/api/v1/activities/{id}",
    tag = "Activities",
    params(("id" = Uuid, Path, description = "Activity ID")),
    responses(
        (status = 204, description = "Activity deleted"),
        (status = 404, description = "Activity not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_activity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    let activity = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, activity.owner_id, Action::Delete)?;

    state.store.activity_delete(id, auth.tenant_id).await?;
    state
        .audit()
        .deleted(&auth, activity_ref(id), &activity)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_activities).post(create_activity))
        .route(
            "/:id",
            get(get_activity)
                .patch(update_activity)
                .delete(delete_activity),
        )
}
