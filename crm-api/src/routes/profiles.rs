//! Profile REST API Routes
//!
//! A profile is the CRM-side record of a user. Its id is the JWT `sub`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use crm_core::import::normalize_email;
use crm_core::permissions::Action;
use crm_core::{new_entity_id, EntityId, EntityRef, EntityType, ListFilter, Page, Profile};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthExtractor;
use crate::services::access::authorize;
use crate::state::AppState;
use crate::types::{CreateProfileRequest, UpdateProfileRequest};
use crate::validation::{clean, HasUpdates, ValidateText};

fn profile_ref(id: EntityId) -> EntityRef {
    EntityRef::new(EntityType::Profile, id)
}

async fn load(state: &AppState, auth: &AuthContext, id: EntityId) -> ApiResult<Profile> {
    state
        .store
        .profile_get(id, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Profile", id))
}

/// GET /api/v1/profiles/me - Profile of the caller
#[utoipa::path(
    get,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    responses(
        (status = 200, description = "Caller profile", body = Profile),
        (status = 404, description = "Caller has no profile", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<Json<Profile>> {
    let user_id = auth
        .user_id
        .ok_or_else(|| ApiError::entity_not_found("Profile", &auth.subject))?;
    Ok(Json(load(&state, &auth, user_id).await?))
}

/// POST /api/v1/profiles - Create a profile
#[utoipa::path(
    post,
    path = "/api/v1/profiles",
    tag = "Profiles",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = Profile),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 409, description = "Profile already exists", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn create_profile(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<CreateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&auth, Action::ManageUsers)?;
    req.validate()?;

    let profile_id = req.profile_id.unwrap_or_else(new_entity_id);
    if state
        .store
        .profile_get(profile_id, auth.tenant_id)
        .await?
        .is_some()
    {
        return Err(ApiError::entity_already_exists(format!(
            "Profile {} already exists",
            profile_id
        )));
    }

    let now = Utc::now();
    let profile = Profile {
        profile_id,
        tenant_id: auth.tenant_id,
        email: normalize_email(&req.email),
        full_name: clean(req.full_name),
        role: req.role,
        locale: req.locale,
        created_at: now,
        updated_at: now,
    };
    state.store.profile_insert(&profile).await?;
    state.audit().created(&auth, profile_ref(profile_id), &profile).await;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /api/v1/profiles - List profiles
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    tag = "Profiles",
    params(ListFilter),
    responses(
        (status = 200, description = "Page of profiles", body = Page<Profile>),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn list_profiles(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Query(filter): Query<ListFilter>,
) -> ApiResult<Json<Page<Profile>>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(state.store.profile_list(auth.tenant_id, &filter).await?))
}

/// GET /api/v1/profiles/{id} - Get a profile
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 404, description = "Profile not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
) -> ApiResult<Json<Profile>> {
    authorize(&auth, Action::Read)?;
    Ok(Json(load(&state, &auth, id).await?))
}

/// PATCH /api/v1/profiles/{id} - Update a profile
///
/// Users may change their own name and locale. Changing a role or editing
/// someone else requires user management rights.
#[utoipa::path(
    patch,
    path = "/api/v1/profiles/{id}",
    tag = "Profiles",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Profile),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 403, description = "Forbidden", body = ApiError),
        (status = 404, description = "Profile not found", body = ApiError),
    ),
    security(
        ("api_key" = []),
        ("bearer_auth" = [])
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(id): Path<EntityId>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    req.validate_has_updates()?;
    req.full_name.validate_max_len("full_name")?;

    let is_self = auth.user_id == Some(id);
    if !is_self || req.role.is_some() {
        authorize(&auth, Action::ManageUsers)?;
    }

    let mut profile = load(&state, &auth, id).await?;
    let before = profile.clone();
    if req.full_name.is_some() {
        profile.full_name = clean(req.full_name);
    }
    if let Some(role) = req.role {
        profile.role = role;
    }
    if let Some(locale) = req.locale {
        profile.locale = locale;
    }
    profile.updated_at = Utc::now();

    state.store.profile_update(&profile).await?;
    state.audit().updated(&auth, profile_ref(id), &before, &profile).await;

    Ok(Json(profile))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_profiles).post(create_profile))
        .route("/me", get(get_me))
        .route("/:id", get(get_profile).patch(update_profile))
}
