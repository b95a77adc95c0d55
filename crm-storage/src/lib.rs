//! CRM Storage - storage trait and in-memory implementation
//!
//! `CrmStore` is the only seam between the API and persistence. Every
//! method is tenant-scoped: a row belonging to another tenant behaves as if
//! it did not exist.

mod memory;

pub use memory::MemoryStore;

use ::async_trait::async_trait;
use crm_core::{
    Account, Activity, AuditLog, Contact, CrmResult, Document, DocumentLink, EntityId, EntityRef,
    ImportBatch, Lead, ListFilter, Note, Opportunity, Page, Profile, ServiceContract, ServiceLog,
    StagedLead, TenantId,
};
use std::collections::HashSet;

/// Async storage trait for CRM entities.
///
/// `*_update` and `*_delete` return `StorageError::NotFound` when the row
/// does not exist in the tenant. List methods order newest first.
#[async_trait]
pub trait CrmStore: Send + Sync {
    // ========================================================================
    // PROFILE OPERATIONS
    // ========================================================================

    async fn profile_insert(&self, p: &Profile) -> CrmResult<()>;

    async fn profile_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Profile>>;

    async fn profile_update(&self, p: &Profile) -> CrmResult<()>;

    async fn profile_list(&self, tenant_id: TenantId, filter: &ListFilter)
        -> CrmResult<Page<Profile>>;

    // ========================================================================
    // LEAD OPERATIONS
    // ========================================================================

    async fn lead_insert(&self, l: &Lead) -> CrmResult<()>;

    /// Bulk insert used by import confirmation.
    async fn lead_insert_many(&self, leads: &[Lead]) -> CrmResult<()>;

    async fn lead_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Lead>>;

    async fn lead_update(&self, l: &Lead) -> CrmResult<()>;

    async fn lead_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    async fn lead_list(&self, tenant_id: TenantId, filter: &ListFilter) -> CrmResult<Page<Lead>>;

    /// Every lead email in the tenant, trimmed and lowercased.
    async fn lead_emails(&self, tenant_id: TenantId) -> CrmResult<HashSet<String>>;

    // ========================================================================
    // ACCOUNT OPERATIONS
    // ========================================================================

    async fn account_insert(&self, a: &Account) -> CrmResult<()>;

    async fn account_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Account>>;

    /// Case-insensitive exact name lookup.
    async fn account_find_by_name(
        &self,
        name: &str,
        tenant_id: TenantId,
    ) -> CrmResult<Option<Account>>;

    async fn account_update(&self, a: &Account) -> CrmResult<()>;

    async fn account_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    async fn account_list(&self, tenant_id: TenantId, filter: &ListFilter)
        -> CrmResult<Page<Account>>;

    // ========================================================================
    // CONTACT OPERATIONS
    // ========================================================================

    async fn contact_insert(&self, c: &Contact) -> CrmResult<()>;

    async fn contact_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Contact>>;

    async fn contact_update(&self, c: &Contact) -> CrmResult<()>;

    async fn contact_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    async fn contact_list(&self, tenant_id: TenantId, filter: &ListFilter)
        -> CrmResult<Page<Contact>>;

    // ========================================================================
    // OPPORTUNITY OPERATIONS
    // ========================================================================

    async fn opportunity_insert(&self, o: &Opportunity) -> CrmResult<()>;

    async fn opportunity_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<Opportunity>>;

    async fn opportunity_update(&self, o: &Opportunity) -> CrmResult<()>;

    async fn opportunity_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    async fn opportunity_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Opportunity>>;

    // ========================================================================
    // ACTIVITY OPERATIONS
    // ========================================================================

    async fn activity_insert(&self, a: &Activity) -> CrmResult<()>;

    async fn activity_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Activity>>;

    async fn activity_update(&self, a: &Activity) -> CrmResult<()>;

    async fn activity_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    /// Activities, optionally restricted to one target record.
    async fn activity_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<Activity>>;

    // ========================================================================
    // NOTE OPERATIONS
    // ========================================================================

    async fn note_insert(&self, n: &Note) -> CrmResult<()>;

    async fn note_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Note>>;

    async fn note_update(&self, n: &Note) -> CrmResult<()>;

    async fn note_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    async fn note_list(
        &self,
        tenant_id: TenantId,
        target: EntityRef,
        filter: &ListFilter,
    ) -> CrmResult<Page<Note>>;

    // ========================================================================
    // DOCUMENT OPERATIONS
    // ========================================================================

    async fn document_insert(&self, d: &Document) -> CrmResult<()>;

    async fn document_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Document>>;

    /// Delete a document and all of its links.
    async fn document_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    /// Documents, optionally restricted to those linked to one record.
    async fn document_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<Document>>;

    async fn document_link_insert(&self, link: &DocumentLink) -> CrmResult<()>;

    async fn document_links(
        &self,
        document_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<DocumentLink>>;

    // ========================================================================
    // AUDIT OPERATIONS
    // ========================================================================

    async fn audit_append(&self, entries: &[AuditLog]) -> CrmResult<()>;

    async fn audit_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<AuditLog>>;

    // ========================================================================
    // SERVICE CONTRACT OPERATIONS
    // ========================================================================

    async fn service_contract_insert(&self, c: &ServiceContract) -> CrmResult<()>;

    async fn service_contract_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<ServiceContract>>;

    async fn service_contract_update(&self, c: &ServiceContract) -> CrmResult<()>;

    async fn service_contract_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()>;

    async fn service_contract_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<ServiceContract>>;

    async fn service_log_insert(&self, log: &ServiceLog) -> CrmResult<()>;

    /// All logs of one contract, newest first.
    async fn service_log_list(
        &self,
        contract_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<ServiceLog>>;

    /// Returns the number of rows removed.
    async fn service_log_delete_many(&self, ids: &[EntityId], tenant_id: TenantId)
        -> CrmResult<u64>;

    // ========================================================================
    // IMPORT STAGING OPERATIONS
    // ========================================================================

    async fn import_batch_insert(&self, b: &ImportBatch) -> CrmResult<()>;

    async fn import_batch_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<ImportBatch>>;

    async fn import_batch_update(&self, b: &ImportBatch) -> CrmResult<()>;

    async fn staged_lead_insert_many(&self, rows: &[StagedLead]) -> CrmResult<()>;

    /// Staged rows of one batch in file order.
    async fn staged_lead_list(
        &self,
        batch_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<StagedLead>>;

    async fn staged_lead_delete_batch(&self, batch_id: EntityId, tenant_id: TenantId)
        -> CrmResult<u64>;

    // ========================================================================
    // MISC
    // ========================================================================

    /// Whether the referenced record exists in the tenant.
    async fn entity_exists(&self, target: EntityRef, tenant_id: TenantId) -> CrmResult<bool>;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> CrmResult<()>;
}
