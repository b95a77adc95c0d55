//! In-memory `CrmStore` for tests and local development.

use crate::CrmStore;
use ::async_trait::async_trait;
use crm_core::{
    Account, Activity, AuditLog, Contact, CrmError, CrmResult, Document, DocumentLink, EntityId,
    EntityRef, EntityType, ImportBatch, Lead, ListFilter, Note, Opportunity, Page, Profile,
    ServiceContract, ServiceLog, StagedLead, StorageError, TenantId, Timestamp,
};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

/// Row accessors needed by the generic table.
trait Row: Clone + Send + Sync {
    const ENTITY: EntityType;
    fn id(&self) -> EntityId;
    fn tenant_id(&self) -> TenantId;
    fn created_at(&self) -> Timestamp;
}

macro_rules! impl_row {
    ($type:ty, $entity:expr, $id_field:ident) => {
        impl Row for $type {
            const ENTITY: EntityType = $entity;

            fn id(&self) -> EntityId {
                self.$id_field
            }

            fn tenant_id(&self) -> TenantId {
                self.tenant_id
            }

            fn created_at(&self) -> Timestamp {
                self.created_at
            }
        }
    };
}

impl_row!(Profile, EntityType::Profile, profile_id);
impl_row!(Lead, EntityType::Lead, lead_id);
impl_row!(Account, EntityType::Account, account_id);
impl_row!(Contact, EntityType::Contact, contact_id);
impl_row!(Opportunity, EntityType::Opportunity, opportunity_id);
impl_row!(Activity, EntityType::Activity, activity_id);
impl_row!(Note, EntityType::Note, note_id);
impl_row!(Document, EntityType::Document, document_id);
impl_row!(DocumentLink, EntityType::DocumentLink, link_id);
impl_row!(AuditLog, EntityType::AuditLog, audit_id);
impl_row!(ServiceContract, EntityType::ServiceContract, contract_id);
impl_row!(ServiceLog, EntityType::ServiceLog, log_id);
impl_row!(ImportBatch, EntityType::ImportBatch, batch_id);
impl_row!(StagedLead, EntityType::StagedLead, staged_id);

struct Table<T> {
    rows: RwLock<HashMap<EntityId, T>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

fn not_found<T: Row>(id: EntityId) -> CrmError {
    CrmError::Storage(StorageError::NotFound {
        entity_type: T::ENTITY,
        id,
    })
}

impl<T: Row> Table<T> {
    async fn insert(&self, row: &T) -> CrmResult<()> {
        self.insert_many(std::slice::from_ref(row)).await
    }

    /// All-or-nothing: nothing is written if any id already exists.
    async fn insert_many(&self, rows: &[T]) -> CrmResult<()> {
        let mut table = self.rows.write().await;
        if let Some(existing) = rows.iter().find(|r| table.contains_key(&r.id())) {
            return Err(CrmError::Storage(StorageError::Conflict {
                entity_type: T::ENTITY,
                reason: format!("{} already exists", existing.id()),
            }));
        }
        for row in rows {
            table.insert(row.id(), row.clone());
        }
        Ok(())
    }

    async fn get(&self, id: EntityId, tenant_id: TenantId) -> Option<T> {
        let table = self.rows.read().await;
        table
            .get(&id)
            .filter(|r| r.tenant_id() == tenant_id)
            .cloned()
    }

    async fn exists(&self, id: EntityId, tenant_id: TenantId) -> bool {
        self.get(id, tenant_id).await.is_some()
    }

    async fn update(&self, row: &T) -> CrmResult<()> {
        let mut table = self.rows.write().await;
        match table.get_mut(&row.id()) {
            Some(existing) if existing.tenant_id() == row.tenant_id() => {
                *existing = row.clone();
                Ok(())
            }
            _ => Err(not_found::<T>(row.id())),
        }
    }

    async fn delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<T> {
        let mut table = self.rows.write().await;
        let owned = table.get(&id).is_some_and(|r| r.tenant_id() == tenant_id);
        if !owned {
            return Err(not_found::<T>(id));
        }
        table.remove(&id).ok_or_else(|| not_found::<T>(id))
    }

    async fn delete_where(&self, tenant_id: TenantId, pred: impl Fn(&T) -> bool) -> u64 {
        let mut table = self.rows.write().await;
        let before = table.len();
        table.retain(|_, r| r.tenant_id() != tenant_id || !pred(&*r));
        (before - table.len()) as u64
    }

    /// Matching rows, newest first.
    async fn select(&self, tenant_id: TenantId, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let table = self.rows.read().await;
        let mut rows: Vec<T> = table
            .values()
            .filter(|r| r.tenant_id() == tenant_id && pred(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        rows
    }

    async fn page(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
        pred: impl Fn(&T) -> bool,
    ) -> Page<T> {
        Page::from_vec(self.select(tenant_id, pred).await, filter)
    }
}

fn owner_matches(filter: &ListFilter, owner_id: Option<EntityId>) -> bool {
    filter.owner_id.map_or(true, |o| owner_id == Some(o))
}

fn account_matches(filter: &ListFilter, account_id: Option<EntityId>) -> bool {
    filter.account_id.map_or(true, |a| account_id == Some(a))
}

fn status_matches(filter: &ListFilter, status: &str) -> bool {
    filter
        .status
        .as_deref()
        .map_or(true, |s| s.trim().eq_ignore_ascii_case(status))
}

/// In-memory store backed by one hash map per table.
#[derive(Default)]
pub struct MemoryStore {
    profiles: Table<Profile>,
    leads: Table<Lead>,
    accounts: Table<Account>,
    contacts: Table<Contact>,
    opportunities: Table<Opportunity>,
    activities: Table<Activity>,
    notes: Table<Note>,
    documents: Table<Document>,
    document_links: Table<DocumentLink>,
    audit: Table<AuditLog>,
    contracts: Table<ServiceContract>,
    service_logs: Table<ServiceLog>,
    import_batches: Table<ImportBatch>,
    staged_leads: Table<StagedLead>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CrmStore for MemoryStore {
    // === Profile Operations ===

    async fn profile_insert(&self, p: &Profile) -> CrmResult<()> {
        let duplicate = self
            .profiles
            .select(p.tenant_id, |existing| existing.email.eq_ignore_ascii_case(&p.email))
            .await;
        if !duplicate.is_empty() {
            return Err(CrmError::Storage(StorageError::Conflict {
                entity_type: EntityType::Profile,
                reason: format!("email {} already registered", p.email),
            }));
        }
        self.profiles.insert(p).await
    }

    async fn profile_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Profile>> {
        Ok(self.profiles.get(id, tenant_id).await)
    }

    async fn profile_update(&self, p: &Profile) -> CrmResult<()> {
        self.profiles.update(p).await
    }

    async fn profile_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Profile>> {
        Ok(self
            .profiles
            .page(tenant_id, filter, |p| {
                status_matches(filter, p.role.as_db_str())
                    && filter.matches_search([Some(p.email.as_str()), p.full_name.as_deref()])
            })
            .await)
    }

    // === Lead Operations ===

    async fn lead_insert(&self, l: &Lead) -> CrmResult<()> {
        self.leads.insert(l).await
    }

    async fn lead_insert_many(&self, leads: &[Lead]) -> CrmResult<()> {
        self.leads.insert_many(leads).await
    }

    async fn lead_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Lead>> {
        Ok(self.leads.get(id, tenant_id).await)
    }

    async fn lead_update(&self, l: &Lead) -> CrmResult<()> {
        self.leads.update(l).await
    }

    async fn lead_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.leads.delete(id, tenant_id).await.map(|_| ())
    }

    async fn lead_list(&self, tenant_id: TenantId, filter: &ListFilter) -> CrmResult<Page<Lead>> {
        Ok(self
            .leads
            .page(tenant_id, filter, |l| {
                owner_matches(filter, l.owner_id)
                    && status_matches(filter, l.status.as_db_str())
                    && filter.matches_search([
                        l.first_name.as_deref(),
                        Some(l.last_name.as_str()),
                        l.email.as_deref(),
                        l.company.as_deref(),
                    ])
            })
            .await)
    }

    async fn lead_emails(&self, tenant_id: TenantId) -> CrmResult<HashSet<String>> {
        Ok(self
            .leads
            .select(tenant_id, |l| l.email.is_some())
            .await
            .into_iter()
            .filter_map(|l| l.email)
            .map(|e| crm_core::import::normalize_email(&e))
            .collect())
    }

    // === Account Operations ===

    async fn account_insert(&self, a: &Account) -> CrmResult<()> {
        self.accounts.insert(a).await
    }

    async fn account_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Account>> {
        Ok(self.accounts.get(id, tenant_id).await)
    }

    async fn account_find_by_name(
        &self,
        name: &str,
        tenant_id: TenantId,
    ) -> CrmResult<Option<Account>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .accounts
            .select(tenant_id, |a| a.name.trim().to_lowercase() == wanted)
            .await
            .pop())
    }

    async fn account_update(&self, a: &Account) -> CrmResult<()> {
        self.accounts.update(a).await
    }

    async fn account_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.accounts.delete(id, tenant_id).await.map(|_| ())
    }

    async fn account_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Account>> {
        Ok(self
            .accounts
            .page(tenant_id, filter, |a| {
                owner_matches(filter, a.owner_id)
                    && filter.matches_search([
                        Some(a.name.as_str()),
                        a.email.as_deref(),
                        a.industry.as_deref(),
                    ])
            })
            .await)
    }

    // === Contact Operations ===

    async fn contact_insert(&self, c: &Contact) -> CrmResult<()> {
        self.contacts.insert(c).await
    }

    async fn contact_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Contact>> {
        Ok(self.contacts.get(id, tenant_id).await)
    }

    async fn contact_update(&self, c: &Contact) -> CrmResult<()> {
        self.contacts.update(c).await
    }

    async fn contact_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.contacts.delete(id, tenant_id).await.map(|_| ())
    }

    async fn contact_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Contact>> {
        Ok(self
            .contacts
            .page(tenant_id, filter, |c| {
                owner_matches(filter, c.owner_id)
                    && account_matches(filter, c.account_id)
                    && filter.matches_search([
                        c.first_name.as_deref(),
                        Some(c.last_name.as_str()),
                        c.email.as_deref(),
                    ])
            })
            .await)
    }

    // === Opportunity Operations ===

    async fn opportunity_insert(&self, o: &Opportunity) -> CrmResult<()> {
        self.opportunities.insert(o).await
    }

    async fn opportunity_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<Opportunity>> {
        Ok(self.opportunities.get(id, tenant_id).await)
    }

    async fn opportunity_update(&self, o: &Opportunity) -> CrmResult<()> {
        self.opportunities.update(o).await
    }

    async fn opportunity_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.opportunities.delete(id, tenant_id).await.map(|_| ())
    }

    async fn opportunity_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Opportunity>> {
        Ok(self
            .opportunities
            .page(tenant_id, filter, |o| {
                owner_matches(filter, o.owner_id)
                    && account_matches(filter, o.account_id)
                    && status_matches(filter, o.stage.as_db_str())
                    && filter.matches_search([Some(o.name.as_str())])
            })
            .await)
    }

    // === Activity Operations ===

    async fn activity_insert(&self, a: &Activity) -> CrmResult<()> {
        self.activities.insert(a).await
    }

    async fn activity_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Activity>> {
        Ok(self.activities.get(id, tenant_id).await)
    }

    async fn activity_update(&self, a: &Activity) -> CrmResult<()> {
        self.activities.update(a).await
    }

    async fn activity_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.activities.delete(id, tenant_id).await.map(|_| ())
    }

    async fn activity_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<Activity>> {
        Ok(self
            .activities
            .page(tenant_id, filter, |a| {
                target.map_or(true, |t| a.entity_ref() == t)
                    && owner_matches(filter, a.owner_id)
                    && status_matches(filter, a.activity_type.as_db_str())
                    && filter.matches_search([Some(a.subject.as_str()), a.description.as_deref()])
            })
            .await)
    }

    // === Note Operations ===

    async fn note_insert(&self, n: &Note) -> CrmResult<()> {
        self.notes.insert(n).await
    }

    async fn note_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Note>> {
        Ok(self.notes.get(id, tenant_id).await)
    }

    async fn note_update(&self, n: &Note) -> CrmResult<()> {
        self.notes.update(n).await
    }

    async fn note_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.notes.delete(id, tenant_id).await.map(|_| ())
    }

    async fn note_list(
        &self,
        tenant_id: TenantId,
        target: EntityRef,
        filter: &ListFilter,
    ) -> CrmResult<Page<Note>> {
        Ok(self
            .notes
            .page(tenant_id, filter, |n| {
                n.entity_type == target.entity_type && n.entity_id == target.entity_id
            })
            .await)
    }

    // === Document Operations ===

    async fn document_insert(&self, d: &Document) -> CrmResult<()> {
        self.documents.insert(d).await
    }

    async fn document_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Document>> {
        Ok(self.documents.get(id, tenant_id).await)
    }

    async fn document_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.documents.delete(id, tenant_id).await?;
        self.document_links
            .delete_where(tenant_id, |l| l.document_id == id)
            .await;
        Ok(())
    }

    async fn document_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<Document>> {
        let linked: Option<HashSet<EntityId>> = match target {
            Some(t) => Some(
                self.document_links
                    .select(tenant_id, |l| {
                        l.entity_type == t.entity_type && l.entity_id == t.entity_id
                    })
                    .await
                    .into_iter()
                    .map(|l| l.document_id)
                    .collect(),
            ),
            None => None,
        };
        Ok(self
            .documents
            .page(tenant_id, filter, |d| {
                linked.as_ref().map_or(true, |ids| ids.contains(&d.document_id))
                    && owner_matches(filter, d.owner_id)
                    && filter.matches_search([Some(d.file_name.as_str())])
            })
            .await)
    }

    async fn document_link_insert(&self, link: &DocumentLink) -> CrmResult<()> {
        self.document_links.insert(link).await
    }

    async fn document_links(
        &self,
        document_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<DocumentLink>> {
        Ok(self
            .document_links
            .select(tenant_id, |l| l.document_id == document_id)
            .await)
    }

    // === Audit Operations ===

    async fn audit_append(&self, entries: &[AuditLog]) -> CrmResult<()> {
        self.audit.insert_many(entries).await
    }

    async fn audit_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<AuditLog>> {
        Ok(self
            .audit
            .page(tenant_id, filter, |e| {
                target.map_or(true, |t| {
                    e.entity_type == t.entity_type && e.entity_id == t.entity_id
                }) && status_matches(filter, e.action.as_db_str())
            })
            .await)
    }

    // === Service Contract Operations ===

    async fn service_contract_insert(&self, c: &ServiceContract) -> CrmResult<()> {
        self.contracts.insert(c).await
    }

    async fn service_contract_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<ServiceContract>> {
        Ok(self.contracts.get(id, tenant_id).await)
    }

    async fn service_contract_update(&self, c: &ServiceContract) -> CrmResult<()> {
        self.contracts.update(c).await
    }

    async fn service_contract_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.contracts.delete(id, tenant_id).await?;
        self.service_logs
            .delete_where(tenant_id, |l| l.contract_id == id)
            .await;
        Ok(())
    }

    async fn service_contract_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<ServiceContract>> {
        Ok(self
            .contracts
            .page(tenant_id, filter, |c| {
                owner_matches(filter, c.owner_id)
                    && account_matches(filter, Some(c.account_id))
                    && status_matches(filter, c.status.as_db_str())
                    && filter.matches_search([Some(c.name.as_str()), c.description.as_deref()])
            })
            .await)
    }

    async fn service_log_insert(&self, log: &ServiceLog) -> CrmResult<()> {
        self.service_logs.insert(log).await
    }

    async fn service_log_list(
        &self,
        contract_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<ServiceLog>> {
        Ok(self
            .service_logs
            .select(tenant_id, |l| l.contract_id == contract_id)
            .await)
    }

    async fn service_log_delete_many(
        &self,
        ids: &[EntityId],
        tenant_id: TenantId,
    ) -> CrmResult<u64> {
        let ids: HashSet<&EntityId> = ids.iter().collect();
        Ok(self
            .service_logs
            .delete_where(tenant_id, |l| ids.contains(&l.log_id))
            .await)
    }

    // === Import Staging Operations ===

    async fn import_batch_insert(&self, b: &ImportBatch) -> CrmResult<()> {
        self.import_batches.insert(b).await
    }

    async fn import_batch_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<ImportBatch>> {
        Ok(self.import_batches.get(id, tenant_id).await)
    }

    async fn import_batch_update(&self, b: &ImportBatch) -> CrmResult<()> {
        self.import_batches.update(b).await
    }

    async fn staged_lead_insert_many(&self, rows: &[StagedLead]) -> CrmResult<()> {
        self.staged_leads.insert_many(rows).await
    }

    async fn staged_lead_list(
        &self,
        batch_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<StagedLead>> {
        let mut rows = self
            .staged_leads
            .select(tenant_id, |r| r.batch_id == batch_id)
            .await;
        rows.sort_by_key(|r| r.row_number);
        Ok(rows)
    }

    async fn staged_lead_delete_batch(
        &self,
        batch_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<u64> {
        Ok(self
            .staged_leads
            .delete_where(tenant_id, |r| r.batch_id == batch_id)
            .await)
    }

    // === Misc ===

    async fn entity_exists(&self, target: EntityRef, tenant_id: TenantId) -> CrmResult<bool> {
        let id = target.entity_id;
        let exists = match target.entity_type {
            EntityType::Profile => self.profiles.exists(id, tenant_id).await,
            EntityType::Lead => self.leads.exists(id, tenant_id).await,
            EntityType::Account => self.accounts.exists(id, tenant_id).await,
            EntityType::Contact => self.contacts.exists(id, tenant_id).await,
            EntityType::Opportunity => self.opportunities.exists(id, tenant_id).await,
            EntityType::Activity => self.activities.exists(id, tenant_id).await,
            EntityType::Document => self.documents.exists(id, tenant_id).await,
            EntityType::Note => self.notes.exists(id, tenant_id).await,
            EntityType::ServiceContract => self.contracts.exists(id, tenant_id).await,
            EntityType::ServiceLog => self.service_logs.exists(id, tenant_id).await,
            EntityType::ImportBatch => self.import_batches.exists(id, tenant_id).await,
            EntityType::StagedLead => self.staged_leads.exists(id, tenant_id).await,
            EntityType::DocumentLink => self.document_links.exists(id, tenant_id).await,
            EntityType::AuditLog => self.audit.exists(id, tenant_id).await,
        };
        Ok(exists)
    }

    async fn health_check(&self) -> CrmResult<()> {
        Ok(())
    }
}
