//! Opportunity REST API Routes
//!
//! Stage changes go through `Opportunity::apply_stage`, which keeps
//! `probability` and `closed_at` consistent with the stage.

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
    new_entity_id, EntityId, EntityRef, EntityType, ListFilter, Opportunity, Page, TenantId,
};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::{authorize, authorize_owned, ensure_exists};
use crate::state::AppState;
use crate::types::{CreateOpportunityRequest, UpdateOpportunityRequest};

fn opportunity_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Opportunity, id)
}

async fn load(state: &AppState, tenant_id: TenantId, id: EntityId) -> ApiResult<Opportunity> {
    state
        .store
        .opportunity_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Opportunity", id))
}

async fn check_references(
    state: &AppState,
    tenant_id: TenantId,
    account_id: Option<EntityId>,
    contact_id: Option<EntityId>,
) -> ApiResult<()> {
    if let Some(id) = account_id {
        ensure_exists(&state.store, EntityRef::new(EntityType::Account, id), tenant_id).await?;
    }
    if let Some(id) = contact_id {
        ensure_exists(&state.store, EntityRef::new(EntityType::Contact, id), tenant_id).await?;
    }
    Ok(())
}

/// POST /api/v1/opportunities - Create an opportunity
#[utoipa::path(
    post,
    path = "/api/v1/opportunities",
    tag = "Opportunities",
    request_body = CreateOpportunityRequest,
    responses(
        (status = 201, description = "Opportunity created", body = Opportunity),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Account or contact not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_opportunity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateOpportunityRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::Create)?;
    req.validate()?;
    check_references(&state, auth.tenant_id, req.account_id, req.contact_id).await?;

    let now = Utc::now();
    let mut opportunity = Opportunity {
        opportunity_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: req.owner_id.or(auth.user_id),
        account_id: req.account_id,
        contact_id: req.contact_id,
        name: req.name.trim().to_string(),
        stage: Default::default(),
        amount: req.amount,
        probability: 0,
        expected_close_date: req.expected_close_date,
        closed_at: None,
        created_at: now,
        updated_at: now,
    };
    opportunity.apply_stage(req.stage.unwrap_or_default(), req.probability, now);

    state.store.opportunity_insert(&opportunity).await?;
    state
        .audit()
        .created(&auth, opportunity_ref(opportunity.opportunity_id), &opportunity)
        .await;

    Ok((StatusCode::CREATED, Json(opportunity)))
}

/// GET /api/v1/opportunities - List opportunities
///
/// `status` filters by stage.
#[utoipa::path(
    get,
    path = "/api/v1/opportunities",
    tag = "Opportunities",
    params(ListFilter),
    responses(
        (status = 200, description = "Page of opportunities", body = Page<Opportunity>),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_opportunities(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Opportunity>>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(state.store.opportunity_list(auth.tenant_id, &filter).await?))
}

/// GET /api/v1/opportunities/{id} - Get an opportunity
#[utoipa::path(
    get,
    path = "/api/v1/opportunities/{id}",
    tag = "Opportunities",
    params(("id" = Uuid, Path, description = "Opportunity ID")),
    responses(
        (status = 200, description = "Opportunity", body = Opportunity),
        (status = 404, description = "Opportunity not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_opportunity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Opportunity>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, auth.tenant_id, id).await?))
}

/// PATCH /api/v1/opportunities/{id} - Update an opportunity
#[utoipa::path(
    patch,
    path = "/api/v1/opportunities/{id}",
    tag = "Opportunities",
    params(("id" = Uuid, Path, description = "Opportunity ID")),
    request_body = UpdateOpportunityRequest,
    responses(
        (status = 200, description = "Opportunity updated", body = Opportunity),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Opportunity not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_opportunity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateOpportunityRequest>,
) -> ApiResult<Json<Opportunity>> {
    req.validate()?;
    let mut opportunity = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, opportunity.owner_id, Action::Update)?;
    check_references(&state, auth.tenant_id, req.account_id, req.contact_id).await?;

    let before = opportunity.clone();
    let now = Utc::now();
    if let Some(account_id) = req.account_id {
        opportunity.account_id = Some(account_id);
    }
    if let Some(contact_id) = req.contact_id {
        opportunity.contact_id = Some(contact_id);
    }
    if let Some(owner_id) = req.owner_id {
        opportunity.owner_id = Some(owner_id);
    }
    if let Some(name) = req.name {
        opportunity.name = name.trim().to_string();
    }
    if let Some(amount) = req.amount {
        opportunity.amount = Some(amount);
    }
    if let Some(date) = req.expected_close_date {
        opportunity.expected_close_date = Some(date);
    }
    match (req.stage, req.probability) {
        (Some(stage), probability) => opportunity.apply_stage(stage, probability, now),
        (None, Some(probability)) => opportunity.probability = probability,
        (None, None) => {}
    }
    opportunity.updated_at = now;

    state.store.opportunity_update(&opportunity).await?;
    state
        .audit()
        .updated(&auth, opportunity_ref(id), &before, &opportunity)
        .await;

    Ok(Json(opportunity))
}

/// DELETE /api/v1/opportunities/{id} - Delete an opportunity
#[utoipa::path(
    delete,
    path = "/api/v1/opportunities/{id}",
    tag = "Opportunities",
    params(("id" = Uuid, Path, description = "Opportunity ID")),
    responses(
        (status = 204, description = "Opportunity deleted"),
        (status = 404, description = "Opportunity not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_opportunity(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    let opportunity = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, opportunity.owner_id, Action::Delete)?;

    state.store.opportunity_delete(id, auth.tenant_id).await?;
    state
        .audit()
        .deleted(&auth, opportunity_ref(id), &opportunity)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_opportunities).post(create_opportunity))
        .route(
            "/:id",
            get(get_opportunity)
                .patch(update_opportunity)
                .delete(delete_opportunity),
        )
}
