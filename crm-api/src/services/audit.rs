//! Audit log writer
//!
//! Audit rows are written after the business write succeeded. A failed
//! audit write is logged and swallowed.

use crm_core::audit::{diff_fields, to_object, FieldChange};
use crm_core::{new_entity_id, AuditAction, AuditLog, EntityId, EntityRef, TenantId};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::state::SharedStore;

#[derive(Clone)]
pub struct AuditWriter {
    store: SharedStore,
}

/// Build one audit row per changed field.
pub fn change_entries(
    tenant_id: TenantId,
    actor_id: Option<EntityId>,
    target: EntityRef,
    action: AuditAction,
    changes: Vec<FieldChange>,
) -> Vec<AuditLog> {
    let now = chrono::Utc::now();
    changes
        .into_iter()
        .map(|change| AuditLog {
            audit_id: new_entity_id(),
            tenant_id,
            entity_type: target.entity_type,
            entity_id: target.entity_id,
            action,
            field: Some(change.field),
            old_value: change.old_value,
            new_value: change.new_value,
            actor_id,
            created_at: now,
        })
        .collect()
}

/// Build a single whole-record audit row.
pub fn record_entry(
    tenant_id: TenantId,
    actor_id: Option<EntityId>,
    target: EntityRef,
    action: AuditAction,
    old_value: Option<Value>,
    new_value: Option<Value>,
) -> AuditLog {
    AuditLog {
        audit_id: new_entity_id(),
        tenant_id,
        entity_type: target.entity_type,
        entity_id: target.entity_id,
        action,
        field: None,
        old_value,
        new_value,
        actor_id,
        created_at: chrono::Utc::now(),
    }
}

impl AuditWriter {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn created<T: Serialize>(&self, auth: &AuthContext, target: EntityRef, entity: &T) {
        let value = Value::Object(to_object(entity));
        self.action(auth, target, AuditAction::Create, None, Some(value))
            .await;
    }

    /// Write one Update row per changed field. Returns the number of rows.
    pub async fn updated<T: Serialize>(
        &self,
        auth: &AuthContext,
        target: EntityRef,
        before: &T,
        after: &T,
    ) -> usize {
        self.changed(auth, target, AuditAction::Update, before, after)
            .await
    }

    /// Field-level diff recorded under `action`.
    pub async fn changed<T: Serialize>(
        &self,
        auth: &AuthContext,
        target: EntityRef,
        action: AuditAction,
        before: &T,
        after: &T,
    ) -> usize {
        let entries = change_entries(
            auth.tenant_id,
            auth.user_id,
            target,
            action,
            diff_fields(before, after),
        );
        let count = entries.len();
        self.write(&entries).await;
        count
    }

    pub async fn deleted<T: Serialize>(&self, auth: &AuthContext, target: EntityRef, entity: &T) {
        let value = Value::Object(to_object(entity));
        self.action(auth, target, AuditAction::Delete, Some(value), None)
            .await;
    }

    /// Whole-record row for workflow actions such as Import and Convert.
    pub async fn action(
        &self,
        auth: &AuthContext,
        target: EntityRef,
        action: AuditAction,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) {
        let entry = record_entry(
            auth.tenant_id,
            auth.user_id,
            target,
            action,
            old_value,
            new_value,
        );
        self.write(std::slice::from_ref(&entry)).await;
    }

    async fn write(&self, entries: &[AuditLog]) {
        if entries.is_empty() {
            return;
        }
        if let Err(e) = self.store.audit_append(entries).await {
            tracing::error!(
                error = %e,
                entity_type = %entries[0].entity_type,
                entity_id = %entries[0].entity_id,
                rows = entries.len(),
                "Failed to write audit log"
            );
        }
    }
}
