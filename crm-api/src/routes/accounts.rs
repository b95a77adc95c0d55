//! Account REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::{new_entity_id, Account, EntityId, EntityRef, EntityType, ListFilter, Page};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::{authorize, authorize_owned};
use crate::state::AppState;
use crate::types::{CreateAccountRequest, UpdateAccountRequest};
use crate::validation::clean;

fn account_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Account, id)
}

async fn load(state: &AppState, tenant_id: crm_core::TenantId, id: EntityId) -> ApiResult<Account> {
    state
        .store
        .account_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Account", id))
}

/// POST /api/v1/accounts - Create an account
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    tag = "Accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::Create)?;
    req.validate()?;

    let now = Utc::now();
    let account = Account {
        account_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: req.owner_id.or(auth.user_id),
        name: req.name.trim().to_string(),
        industry: clean(req.industry),
        website: clean(req.website),
        phone: clean(req.phone),
        email: clean(req.email).map(|e| e.to_lowercase()),
        billing_address: clean(req.billing_address),
        annual_revenue: req.annual_revenue,
        created_at: now,
        updated_at: now,
    };
    state.store.account_insert(&account).await?;
    state
        .audit()
        .created(&auth, account_ref(account.account_id), &account)
        .await;

    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/v1/accounts - List accounts
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    tag = "Accounts",
    params(ListFilter),
    responses(
        (status = 200, description = "Page of accounts", body = Page<Account>),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Account>>> {
    authorize(&auth, Action::Read)?;
    let page = state.store.account_list(auth.tenant_id, &filter).await?;
    Ok(Json(page))
}

/// GET /api/v1/accounts/{id} - Get an account
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account", body = Account),
        (status = 404, description = "Account not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_account(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Account>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, auth.tenant_id, id).await?))
}

/// PATCH /api/v1/accounts/{id} - Update an account
#[utoipa::path(
    patch,
    path = "/api/v1/accounts/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = Account),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_account(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateAccountRequest>,
) -> ApiResult<Json<Account>> {
    req.validate()?;
    let mut account = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, account.owner_id, Action::Update)?;

    let before = account.clone();
    req.apply(&mut account);
    account.updated_at = Utc::now();
    state.store.account_update(&account).await?;
    state
        .audit()
        .updated(&auth, account_ref(id), &before, &account)
        .await;

    Ok(Json(account))
}

/// DELETE /api/v1/accounts/{id} - Delete an account
#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    let account = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, account.owner_id, Action::Delete)?;

    state.store.account_delete(id, auth.tenant_id).await?;
    state.audit().deleted(&auth, account_ref(id), &account).await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route(
            "/:id",
            get(get_account).patch(update_account).delete(delete_account),
        )
}
