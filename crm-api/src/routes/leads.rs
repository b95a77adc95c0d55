//! Lead REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use crm_core::import::normalize_email;
use crm_core::permissions::Action;
use crm_core::{new_entity_id, EntityId, EntityRef, EntityType, Lead, ListFilter, Page};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::{authorize, authorize_owned};
use crate::services::leads;
use crate::state::AppState;
use crate::types::{ConvertLeadRequest, ConvertLeadResponse, CreateLeadRequest, UpdateLeadRequest};
use crate::validation::clean;

fn lead_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Lead, id)
}

async fn load(state: &AppState, tenant_id: crm_core::TenantId, id: EntityId) -> ApiResult<Lead> {
    state
        .store
        .lead_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Lead", id))
}

/// POST /api/v1/leads - Create a lead
#[utoipa::path(
    post,
    path = "/api/v1/leads",
    tag = "Leads",
    request_body = CreateLeadRequest,
    responses(
        (status = 201, description = "Lead created", body = Lead),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_lead(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateLeadRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::Create)?;
    req.validate()?;

    let now = Utc::now();
    let lead = Lead {
        lead_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: req.owner_id.or(auth.user_id),
        first_name: clean(req.first_name),
        last_name: req.last_name.trim().to_string(),
        email: clean(req.email).map(|e| normalize_email(&e)),
        phone: clean(req.phone),
        company: clean(req.company),
        title: clean(req.title),
        source: clean(req.source),
        status: req.status.unwrap_or_default(),
        import_batch_id: None,
        converted_account_id: None,
        converted_contact_id: None,
        created_at: now,
        updated_at: now,
    };
    state.store.lead_insert(&lead).await?;
    state.audit().created(&auth, lead_ref(lead.lead_id), &lead).await;

    Ok((StatusCode::CREATED, Json(lead)))
}

/// GET /api/v1/leads - List leads
#[utoipa::path(
    get,
    path = "/api/v1/leads",
    tag = "Leads",
    params(ListFilter),
    responses(
        (status = 200, description = "Page of leads", body = Page<Lead>),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_leads(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Lead>>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(state.store.lead_list(auth.tenant_id, &filter).await?))
}

/// GET /api/v1/leads/{id} - Get a lead
#[utoipa::path(
    get,
    path = "/api/v1/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead", body = Lead),
        (status = 404, description = "Lead not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_lead(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Lead>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, auth.tenant_id, id).await?))
}

/// PATCH /api/v1/leads/{id} - Update a lead
#[utoipa::path(
    patch,
    path = "/api/v1/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = UpdateLeadRequest,
    responses(
        (status = 200, description = "Lead updated", body = Lead),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Lead not found", body = ApiError),
        (status = 409, description = "Lead already converted", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_lead(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateLeadRequest>,
) -> ApiResult<Json<Lead>> {
    let mut lead = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, lead.owner_id, Action::Update)?;
    req.validate(&lead)?;

    let before = lead.clone();
    req.apply(&mut lead);
    lead.updated_at = Utc::now();
    state.store.lead_update(&lead).await?;
    state.audit().updated(&auth, lead_ref(id), &before, &lead).await;

    Ok(Json(lead))
}

/// DELETE /api/v1/leads/{id} - Delete a lead
#[utoipa::path(
    delete,
    path = "/api/v1/leads/{id}",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 404, description = "Lead not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_lead(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    let lead = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, lead.owner_id, Action::Delete)?;

    state.store.lead_delete(id, auth.tenant_id).await?;
    state.audit().deleted(&auth, lead_ref(id), &lead).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/leads/{id}/convert - Convert a lead
#[utoipa::path(
    post,
    path = "/api/v1/leads/{id}/convert",
    tag = "Leads",
    params(("id" = Uuid, Path, description = "Lead ID")),
    request_body = ConvertLeadRequest,
    responses(
        (status = 200, description = "Lead converted", body = ConvertLeadResponse),
        (status = 404, description = "Lead or account not found", body = ApiError),
        (status = 409, description = "Lead already converted", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn convert_lead(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<ConvertLeadRequest>,
) -> ApiResult<Json<ConvertLeadResponse>> {
    Ok(Json(leads::convert(&state, &auth, id, req).await?))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_leads).post(create_lead))
        .route("/:id", get(get_lead).patch(update_lead).delete(delete_lead))
        .route("/:id/convert", post(convert_lead))
}
