//! Document metadata and attachment links

use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::{new_entity_id, Document, DocumentLink, EntityId, EntityRef, EntityType};

use super::access::{authorize, authorize_owned, ensure_exists};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{validate_link_target, CreateDocumentRequest, DocumentResponse};

fn new_link(document: &Document, target: EntityRef) -> DocumentLink {
    DocumentLink {
        link_id: new_entity_id(),
        tenant_id: document.tenant_id,
        document_id: document.document_id,
        entity_type: target.entity_type,
        entity_id: target.entity_id,
        created_at: Utc::now(),
    }
}

/// Store document metadata and attach it to every requested record. All
/// targets are checked before anything is written.
pub async fn create(
    state: &AppState,
    auth: &AuthContext,
    req: CreateDocumentRequest,
) -> ApiResult<DocumentResponse> {
    authorize(auth, Action::Create)?;
    req.validate()?;
    for target in &req.links {
        ensure_exists(&state.store, *target, auth.tenant_id).await?;
    }

    let document = Document {
        document_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: auth.user_id,
        file_name: req.file_name.trim().to_string(),
        mime_type: req.mime_type.trim().to_lowercase(),
        size_bytes: req.size_bytes,
        storage_path: req.storage_path.trim().to_string(),
        checksum: req.checksum.map(|c| c.to_lowercase()),
        created_at: Utc::now(),
    };
    state.store.document_insert(&document).await?;

    let mut links = Vec::with_capacity(req.links.len());
    for target in req.links {
        let linked = links.iter().any(|l: &DocumentLink| {
            l.entity_type == target.entity_type && l.entity_id == target.entity_id
        });
        if linked {
            continue;
        }
        let link = new_link(&document, target);
        state.store.document_link_insert(&link).await?;
        links.push(link);
    }

    state
        .audit()
        .created(auth, EntityRef::new(EntityType::Document, document.document_id), &document)
        .await;
    Ok(DocumentResponse { document, links })
}

async fn load(state: &AppState, auth: &AuthContext, document_id: EntityId) -> ApiResult<Document> {
    state
        .store
        .document_get(document_id, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Document", document_id))
}

pub async fn get(
    state: &AppState,
    auth: &AuthContext,
    document_id: EntityId,
) -> ApiResult<DocumentResponse> {
    authorize(auth, Action::Read)?;
    let document = load(state, auth, document_id).await?;
    let links = state
        .store
        .document_links(document_id, auth.tenant_id)
        .await?;
    Ok(DocumentResponse { document, links })
}

/// Attach an existing document to one more record. Linking twice is a
/// conflict.
pub async fn add_link(
    state: &AppState,
    auth: &AuthContext,
    document_id: EntityId,
    target: EntityRef,
) -> ApiResult<DocumentLink> {
    let document = load(state, auth, document_id).await?;
    authorize_owned(auth, document.owner_id, Action::Update)?;
    validate_link_target(&target)?;
    ensure_exists(&state.store, target, auth.tenant_id).await?;

    let existing = state
        .store
        .document_links(document_id, auth.tenant_id)
        .await?;
    if existing
        .iter()
        .any(|l| l.entity_type == target.entity_type && l.entity_id == target.entity_id)
    {
        return Err(ApiError::entity_already_exists(format!(
            "Document {} is already linked to {} {}",
            document_id, target.entity_type, target.entity_id
        )));
    }

    let link = new_link(&document, target);
    state.store.document_link_insert(&link).await?;
    state
        .audit()
        .created(auth, EntityRef::new(EntityType::DocumentLink, link.link_id), &link)
        .await;
    Ok(link)
}

pub async fn delete(state: &AppState, auth: &AuthContext, document_id: EntityId) -> ApiResult<()> {
    let document = load(state, auth, document_id).await?;
    authorize_owned(auth, document.owner_id, Action::Delete)?;
    state
        .store
        .document_delete(document_id, auth.tenant_id)
        .await?;
    state
        .audit()
        .deleted(auth, EntityRef::new(EntityType::Document, document_id), &document)
        .await;
    Ok(())
}
