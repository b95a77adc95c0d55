//! Permission and reference checks shared by handlers and services.

use crm_core::permissions::{self, Action};
use crm_core::{EntityId, EntityRef, Locale, TenantId};

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::SharedStore;

pub fn authorize(auth: &AuthContext, action: Action) -> ApiResult<()> {
    permissions::authorize(auth.role, action)?;
    Ok(())
}

/// Role check plus the ownership rule for `owner_id`.
pub fn authorize_owned(
    auth: &AuthContext,
    owner_id: Option<EntityId>,
    action: Action,
) -> ApiResult<()> {
    permissions::authorize_owned(auth.role, auth.user_id, owner_id, action)?;
    Ok(())
}

/// Fail with `ReferenceNotFound` unless `target` exists in the tenant.
pub async fn ensure_exists(
    store: &SharedStore,
    target: EntityRef,
    tenant_id: TenantId,
) -> ApiResult<()> {
    if store.entity_exists(target, tenant_id).await? {
        Ok(())
    } else {
        Err(ApiError::reference_not_found(
            target.entity_type.as_db_str(),
            target.entity_id,
        ))
    }
}

/// Locale for user-facing messages: the caller's profile locale, then the
/// `Accept-Language` header, then English.
pub async fn resolve_locale(
    store: &SharedStore,
    auth: &AuthContext,
    accept_language: Option<&str>,
) -> Locale {
    if let Some(user_id) = auth.user_id {
        match store.profile_get(user_id, auth.tenant_id).await {
            Ok(Some(profile)) => return profile.locale,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load profile locale"),
        }
    }
    accept_language
        .and_then(Locale::from_accept_language)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use chrono::Utc;
    use crm_core::{new_entity_id, EntityType, Profile, Role};
    use crm_storage::MemoryStore;
    use std::sync::Arc;

    fn ctx(role: Role, user_id: EntityId, tenant_id: TenantId) -> AuthContext {
        AuthContext::new(user_id.to_string(), tenant_id, role, AuthMethod::Jwt)
    }

    #[test]
    fn test_sales_rep_cannot_modify_foreign_record() {
        let me = new_entity_id();
        let auth = ctx(Role::SalesRep, me, new_entity_id());
        assert!(authorize_owned(&auth, Some(me), Action::Update).is_ok());
        assert!(authorize_owned(&auth, None, Action::Update).is_ok());
        let err = authorize_owned(&auth, Some(new_entity_id()), Action::Delete).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_viewer_cannot_create() {
        let auth = ctx(Role::Viewer, new_entity_id(), new_entity_id());
        assert!(authorize(&auth, Action::Read).is_ok());
        assert!(authorize(&auth, Action::Create).is_err());
    }

    #[tokio::test]
    async fn test_ensure_exists_is_tenant_scoped() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let target = EntityRef::new(EntityType::Account, new_entity_id());
        let err = ensure_exists(&store, target, new_entity_id())
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ReferenceNotFound);
    }

    #[tokio::test]
    async fn test_profile_locale_wins_over_header() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let tenant = new_entity_id();
        let user = new_entity_id();
        let now = Utc::now();
        store
            .profile_insert(&Profile {
                profile_id: user,
                tenant_id: tenant,
                email: "ana@example.com".to_string(),
                full_name: None,
                role: Role::SalesRep,
                locale: Locale::Es,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let auth = ctx(Role::SalesRep, user, tenant);
        assert_eq!(resolve_locale(&store, &auth, Some("de")).await, Locale::Es);

        let stranger = ctx(Role::SalesRep, new_entity_id(), tenant);
        assert_eq!(resolve_locale(&store, &stranger, Some("de-DE")).await, Locale::De);
        assert_eq!(resolve_locale(&store, &stranger, None).await, Locale::En);
    }
}
