//! Service Contract REST API Routes
//!
//! Completion and rescheduling run the full workflow in
//! [`crate::services::contracts`]: the contract, a service log, an audit diff,
//! calendar sync and log retention.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use crm_core::permissions::Action;
use crm_core::{EntityId, ListFilter, Page, ServiceContract, ServiceLog};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::authorize;
use crate::services::contracts;
use crate::state::AppState;
use crate::types::{
    CompleteServiceRequest, CreateServiceContractRequest, RescheduleServiceRequest,
    ServiceContractUpdateResponse, UpdateServiceContractRequest,
};

/// POST /api/v1/service-contracts - Create a service contract
#[utoipa::path(
    post,
    path = "/api/v1/service-contracts",
    tag = "Service Contracts",
    request_body = CreateServiceContractRequest,
    responses(
        (status = 201, description = "Contract created", body = ServiceContractUpdateResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_contract(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateServiceContractRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = contracts::create(&state, &auth, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/service-contracts - List service contracts
///
/// `status` filters by contract status, `account_id` by account.
#[utoipa::path(
    get,
    path = "/api/v1/service-contracts",
    tag = "Service Contracts",
    params(ListFilter),
    responses(
        (status = 200, description = "Page of contracts", body = Page<ServiceContract>),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_contracts(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<ServiceContract>>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(
        state
            .store
            .service_contract_list(auth.tenant_id, &filter)
            .await?,
    ))
}

/// GET /api/v1/service-contracts/{id} - Get a service contract
#[utoipa::path(
    get,
    path = "/api/v1/service-contracts/{id}",
    tag = "Service Contracts",
    params(("id" = Uuid, Path, description = "Service contract ID")),
    responses(
        (status = 200, description = "Contract", body = ServiceContract),
        (status = 404, description = "Contract not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_contract(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<ServiceContract>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(contracts::load(&state, &auth, id).await?))
}

/// PATCH /api/v1/service-contracts/{id} - Edit contract terms
#[utoipa::path(
    patch,
    path = "/api/v1/service-contracts/{id}",
    tag = "Service Contracts",
    params(("id" = Uuid, Path, description = "Service contract ID")),
    request_body = UpdateServiceContractRequest,
    responses(
        (status = 200, description = "Contract updated", body = ServiceContractUpdateResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Contract not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_contract(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateServiceContractRequest>,
) -> ApiResult<Json<ServiceContractUpdateResponse>> {
    Ok(Json(contracts::update(&state, &auth, id, req).await?))
}

/// DELETE /api/v1/service-contracts/{id} - Delete a contract
#[utoipa::path(
    delete,
    path = "/api/v1/service-contracts/{id}",
    tag = "Service Contracts",
    params(("id" = Uuid, Path, description = "Service contract ID")),
    responses(
        (status = 204, description = "Contract deleted"),
        (status = 404, description = "Contract not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_contract(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    contracts::delete(&state, &auth, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/service-contracts/{id}/complete - Record a completed visit
#[utoipa::path(
    post,
    path = "/api/v1/service-contracts/{id}/complete",
    tag = "Service Contracts",
    params(("id" = Uuid, Path, description = "Service contract ID")),
    request_body = CompleteServiceRequest,
    responses(
        (status = 200, description = "Service completed", body = ServiceContractUpdateResponse),
        (status = 400, description = "Completion date outside the contract term", body = ApiError),
        (status = 404, description = "Contract not found", body = ApiError),
        (status = 409, description = "Contract is not active", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn complete_service(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<CompleteServiceRequest>,
) -> ApiResult<Json<ServiceContractUpdateResponse>> {
    Ok(Json(contracts::complete(&state, &auth, id, req).await?))
}

/// POST /api/v1/service-contracts/{id}/reschedule - Move the next due date
#[utoipa::path(
    post,
    path = "/api/v1/service-contracts/{id}/reschedule",
    tag = "Service Contracts",
    params(("id" = Uuid, Path, description = "Service contract ID")),
    request_body = RescheduleServiceRequest,
    responses(
        (status = 200, description = "Service rescheduled", body = ServiceContractUpdateResponse),
        (status = 400, description = "New date outside the contract term", body = ApiError),
        (status = 404, description = "Contract not found", body = ApiError),
        (status = 409, description = "Contract is not active", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn reschedule_service(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<RescheduleServiceRequest>,
) -> ApiResult<Json<ServiceContractUpdateResponse>> {
    Ok(Json(contracts::reschedule(&state, &auth, id, req).await?))
}

/// GET /api/v1/service-contracts/{id}/logs - Service history, newest first
#[utoipa::path(
    get,
    path = "/api/v1/service-contracts/{id}/logs",
    tag = "Service Contracts",
    params(("id" = Uuid, Path, description = "Service contract ID")),
    responses(
        (status = 200, description = "Service logs", body = Vec<ServiceLog>),
        (status = 404, description = "Contract not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_service_logs(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Vec<ServiceLog>>> {
    authorize(&auth, Action::Read)?;
    let contract = contracts::load(&state, &auth, id).await?;
    let logs = state
        .store
        .service_log_list(contract.contract_id, auth.tenant_id)
        .await?;
    Ok(Json(logs))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contracts).post(create_contract))
        .route(
            "/:id",
            get(get_contract)
                .patch(update_contract)
                .delete(delete_contract),
        )
        .route("/:id/complete", post(complete_service))
        .route("/:id/reschedule", post(reschedule_service))
        .route("/:id/logs", get(list_service_logs))
}
