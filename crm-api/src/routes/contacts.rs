//! Contact REST API Routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::{new_entity_id, Contact, EntityId, EntityRef, EntityType, ListFilter, Page};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::{authorize, authorize_owned, ensure_exists};
use crate::state::AppState;
use crate::types::{CreateContactRequest, UpdateContactRequest};
use crate::validation::clean;

fn contact_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Contact, id)
}

async fn load(state: &AppState, tenant_id: crm_core::TenantId, id: EntityId) -> ApiResult<Contact> {
    state
        .store
        .contact_get(id, tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Contact", id))
}

async fn check_account(
    state: &AppState,
    tenant_id: crm_core::TenantId,
    account_id: Option<EntityId>,
) -> ApiResult<()> {
    match account_id {
        Some(id) => {
            let target = EntityRef::new(EntityType::Account, id);
            ensure_exists(&state.store, target, tenant_id).await
        }
        None => Ok(()),
    }
}

/// POST /api/v1/contacts - Create a contact
#[utoipa::path(
    post,
    path = "/api/v1/contacts",
    tag = "Contacts",
    request_body = CreateContactRequest,
    responses(
        (status = 201, description = "Contact created", body = Contact),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_contact(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateContactRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::Create)?;
    req.validate()?;
    check_account(&state, auth.tenant_id, req.account_id).await?;

    let now = Utc::now();
    let contact = Contact {
        contact_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: req.owner_id.or(auth.user_id),
        account_id: req.account_id,
        first_name: clean(req.first_name),
        last_name: req.last_name.trim().to_string(),
        email: clean(req.email).map(|e| e.to_lowercase()),
        phone: clean(req.phone),
        title: clean(req.title),
        created_at: now,
        updated_at: now,
    };
    state.store.contact_insert(&contact).await?;
    state
        .audit()
        .created(&auth, contact_ref(contact.contact_id), &contact)
        .await;

    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/v1/contacts - List contacts
#[utoipa::path(
    get,
    path = "/api/v1/contacts",
    tag = "Contacts",
    params(ListFilter),
    responses(
        (status = 200, description = "Page of contacts", body = Page<Contact>),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_contacts(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Contact>>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(state.store.contact_list(auth.tenant_id, &filter).await?))
}

/// GET /api/v1/contacts/{id} - Get a contact
#[utoipa::path(
    get,
    path = "/api/v1/contacts/{id}",
    tag = "Contacts",
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Contact", body = Contact),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_contact(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Contact>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, auth.tenant_id, id).await?))
}

/// PATCH /api/v1/contacts/{id} - Update a contact
#[utoipa::path(
    patch,
    path = "/api/v1/contacts/{id}",
    tag = "Contacts",
    params(("id" = Uuid, Path, description = "Contact ID")),
    request_body = UpdateContactRequest,
    responses(
        (status = 200, description = "Contact updated", body = Contact),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Not the owner", body = ApiError),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_contact(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateContactRequest>,
) -> ApiResult<Json<Contact>> {
    req.validate()?;
    let mut contact = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, contact.owner_id, Action::Update)?;
    check_account(&state, auth.tenant_id, req.account_id).await?;

    let before = contact.clone();
    req.apply(&mut contact);
    contact.updated_at = Utc::now();
    state.store.contact_update(&contact).await?;
    state
        .audit()
        .updated(&auth, contact_ref(id), &before, &contact)
        .await;

    Ok(Json(contact))
}

/// DELETE /api/v1/contacts/{id} - Delete a contact
#[utoipa::path(
    delete,
    path = "/api/v1/contacts/{id}",
    tag = "Contacts",
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 404, description = "Contact not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn delete_contact(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<StatusCode> {
    let contact = load(&state, auth.tenant_id, id).await?;
    authorize_owned(&auth, contact.owner_id, Action::Delete)?;

    state.store.contact_delete(id, auth.tenant_id).await?;
    state.audit().deleted(&auth, contact_ref(id), &contact).await;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts).post(create_contact))
        .route(
            "/:id",
            get(get_contact).patch(update_contact).delete(delete_contact),
        )
}
