//! `CrmStore` backed by PostgreSQL.
//!
//! Every table has the same shape: `id`, `tenant_id` and `created_at`
//! columns for keys and ordering, plus the serialized entity in a JSONB
//! `body`. List filters read the JSON fields named by each table's
//! [`TableSpec`].

use ::async_trait::async_trait;
use crm_core::import::normalize_email;
use crm_core::{
    Account, Activity, AuditLog, Contact, CrmError, CrmResult, Document, DocumentLink, EntityId,
    EntityRef, EntityType, ImportBatch, Lead, ListFilter, Note, Opportunity, Page, Profile,
    ServiceContract, ServiceLog, StagedLead, StorageError, TenantId, Timestamp,
};
use crm_storage::CrmStore;
use deadpool_postgres::{Object, Pool, PoolError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Table name and the JSON keys list filters apply to.
struct TableSpec {
    table: &'static str,
    entity: EntityType,
    owner: Option<&'static str>,
    account: Option<&'static str>,
    status: Option<&'static str>,
    search: &'static [&'static str],
}

trait Record: Serialize + DeserializeOwned + Send + Sync {
    const SPEC: TableSpec;
    fn id(&self) -> EntityId;
    fn tenant_id(&self) -> TenantId;
    fn created_at(&self) -> Timestamp;
}

macro_rules! impl_record {
    ($type:ty, $id_field:ident, $spec:expr) => {
        impl Record for $type {
            const SPEC: TableSpec = $spec;

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

const fn plain(table: &'static str, entity: EntityType) -> TableSpec {
    TableSpec {
        table,
        entity,
        owner: None,
        account: None,
        status: None,
        search: &[],
    }
}

impl_record!(Profile, profile_id, TableSpec {
    status: Some("role"),
    search: &["email", "full_name"],
    ..plain("crm_profiles", EntityType::Profile)
});
impl_record!(Lead, lead_id, TableSpec {
    owner: Some("owner_id"),
    status: Some("status"),
    search: &["first_name", "last_name", "email", "company"],
    ..plain("crm_leads", EntityType::Lead)
});
impl_record!(Account, account_id, TableSpec {
    owner: Some("owner_id"),
    search: &["name", "email", "industry"],
    ..plain("crm_accounts", EntityType::Account)
});
impl_record!(Contact, contact_id, TableSpec {
    owner: Some("owner_id"),
    account: Some("account_id"),
    search: &["first_name", "last_name", "email"],
    ..plain("crm_contacts", EntityType::Contact)
});
impl_record!(Opportunity, opportunity_id, TableSpec {
    owner: Some("owner_id"),
    account: Some("account_id"),
    status: Some("stage"),
    search: &["name"],
    ..plain("crm_opportunities", EntityType::Opportunity)
});
impl_record!(Activity, activity_id, TableSpec {
    owner: Some("owner_id"),
    status: Some("activity_type"),
    search: &["subject", "description"],
    ..plain("crm_activities", EntityType::Activity)
});
impl_record!(Note, note_id, plain("crm_notes", EntityType::Note));
impl_record!(Document, document_id, TableSpec {
    owner: Some("owner_id"),
    search: &["file_name"],
    ..plain("crm_documents", EntityType::Document)
});
impl_record!(DocumentLink, link_id, plain("crm_document_links", EntityType::DocumentLink));
impl_record!(AuditLog, audit_id, TableSpec {
    status: Some("action"),
    ..plain("crm_audit_log", EntityType::AuditLog)
});
impl_record!(ServiceContract, contract_id, TableSpec {
    owner: Some("owner_id"),
    account: Some("account_id"),
    status: Some("status"),
    search: &["name", "description"],
    ..plain("crm_service_contracts", EntityType::ServiceContract)
});
impl_record!(ServiceLog, log_id, plain("crm_service_logs", EntityType::ServiceLog));
impl_record!(ImportBatch, batch_id, plain("crm_import_batches", EntityType::ImportBatch));
impl_record!(StagedLead, staged_id, plain("crm_staged_leads", EntityType::StagedLead));

fn table_for(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Profile => Profile::SPEC.table,
        EntityType::Lead => Lead::SPEC.table,
        EntityType::Account => Account::SPEC.table,
        EntityType::Contact => Contact::SPEC.table,
        EntityType::Opportunity => Opportunity::SPEC.table,
        EntityType::Activity => Activity::SPEC.table,
        EntityType::Document => Document::SPEC.table,
        EntityType::DocumentLink => DocumentLink::SPEC.table,
        EntityType::Note => Note::SPEC.table,
        EntityType::AuditLog => AuditLog::SPEC.table,
        EntityType::ServiceContract => ServiceContract::SPEC.table,
        EntityType::ServiceLog => ServiceLog::SPEC.table,
        EntityType::ImportBatch => ImportBatch::SPEC.table,
        EntityType::StagedLead => StagedLead::SPEC.table,
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn backend(err: tokio_postgres::Error) -> CrmError {
    tracing::error!(error = ?err, "Database error");
    StorageError::Backend {
        reason: "database operation failed".to_string(),
    }
    .into()
}

fn insert_error(entity_type: EntityType, err: tokio_postgres::Error) -> CrmError {
    if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let reason = err
            .as_db_error()
            .map(|e| e.message().to_string())
            .unwrap_or_else(|| "duplicate key".to_string());
        return StorageError::Conflict { entity_type, reason }.into();
    }
    backend(err)
}

fn pool_error(err: PoolError) -> CrmError {
    tracing::error!(error = ?err, "Connection pool error");
    let reason = match err {
        PoolError::Timeout(_) => "connection pool exhausted",
        PoolError::Closed => "connection pool is closed",
        _ => "failed to acquire database connection",
    };
    StorageError::Backend {
        reason: reason.to_string(),
    }
    .into()
}

fn encode<T: Record>(row: &T) -> CrmResult<JsonValue> {
    serde_json::to_value(row).map_err(|e| {
        StorageError::InsertFailed {
            entity_type: T::SPEC.entity,
            reason: e.to_string(),
        }
        .into()
    })
}

fn decode<T: Record>(body: JsonValue) -> CrmResult<T> {
    serde_json::from_value(body).map_err(|e| {
        StorageError::Corrupt {
            entity_type: T::SPEC.entity,
            reason: e.to_string(),
        }
        .into()
    })
}

fn not_found<T: Record>(id: EntityId) -> CrmError {
    StorageError::NotFound {
        entity_type: T::SPEC.entity,
        id,
    }
    .into()
}

// ============================================================================
// QUERY BUILDER
// ============================================================================

type Param = Box<dyn ToSql + Sync + Send>;

/// A tenant-scoped `WHERE` clause with positional parameters.
struct Query {
    clauses: Vec<String>,
    params: Vec<Param>,
}

impl Query {
    fn new(tenant_id: TenantId) -> Self {
        let mut query = Self {
            clauses: Vec::new(),
            params: Vec::new(),
        };
        let p = query.bind(tenant_id);
        query.clauses.push(format!("tenant_id = {}", p));
        query
    }

    fn bind<V: ToSql + Sync + Send + 'static>(&mut self, value: V) -> String {
        self.params.push(Box::new(value));
        format!("${}", self.params.len())
    }

    /// `body->>'key' = value`
    fn field_eq(&mut self, key: &str, value: impl ToString) -> &mut Self {
        let p = self.bind(value.to_string());
        self.clauses.push(format!("body->>'{}' = {}", key, p));
        self
    }

    fn target(&mut self, target: EntityRef) -> &mut Self {
        self.field_eq("entity_type", target.entity_type.as_db_str())
            .field_eq("entity_id", target.entity_id)
    }

    fn list_filter(&mut self, spec: &TableSpec, filter: &ListFilter) -> &mut Self {
        if let (Some(key), Some(owner_id)) = (spec.owner, filter.owner_id) {
            self.field_eq(key, owner_id);
        }
        if let (Some(key), Some(account_id)) = (spec.account, filter.account_id) {
            self.field_eq(key, account_id);
        }
        if let (Some(key), Some(status)) = (spec.status, filter.status.as_deref()) {
            let p = self.bind(status.trim().to_lowercase());
            self.clauses.push(format!("lower(body->>'{}') = {}", key, p));
        }
        if let Some(term) = filter.search_term().filter(|_| !spec.search.is_empty()) {
            let p = self.bind(format!("%{}%", escape_like(&term)));
            let any = spec
                .search
                .iter()
                .map(|key| format!("lower(body->>'{}') LIKE {}", key, p))
                .collect::<Vec<_>>()
                .join(" OR ");
            self.clauses.push(format!("({})", any));
        }
        self
    }

    fn where_sql(&self) -> String {
        self.clauses.join(" AND ")
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ============================================================================
// STORE
// ============================================================================

/// PostgreSQL implementation of [`CrmStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create missing tables and indexes. Safe to run on every start.
    pub async fn migrate(&self) -> CrmResult<()> {
        let conn = self.conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(backend)?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn conn(&self) -> CrmResult<Object> {
        self.pool.get().await.map_err(pool_error)
    }

    /// All rows are written in one transaction.
    async fn insert_many<T: Record>(&self, rows: &[T]) -> CrmResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(backend)?;
        let sql = format!(
            "INSERT INTO {} (id, tenant_id, created_at, body) VALUES ($1, $2, $3, $4)",
            T::SPEC.table
        );
        let stmt = tx.prepare(&sql).await.map_err(backend)?;
        for row in rows {
            let body = encode(row)?;
            tx.execute(&stmt, &[&row.id(), &row.tenant_id(), &row.created_at(), &body])
                .await
                .map_err(|e| insert_error(T::SPEC.entity, e))?;
        }
        tx.commit().await.map_err(backend)
    }

    async fn insert<T: Record>(&self, row: &T) -> CrmResult<()> {
        self.insert_many(std::slice::from_ref(row)).await
    }

    async fn get<T: Record>(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<T>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT body FROM {} WHERE id = $1 AND tenant_id = $2",
            T::SPEC.table
        );
        let row = conn
            .query_opt(&sql, &[&id, &tenant_id])
            .await
            .map_err(backend)?;
        row.map(|r| decode(r.get(0))).transpose()
    }

    async fn update<T: Record>(&self, row: &T) -> CrmResult<()> {
        let conn = self.conn().await?;
        let body = encode(row)?;
        let sql = format!(
            "UPDATE {} SET body = $3 WHERE id = $1 AND tenant_id = $2",
            T::SPEC.table
        );
        let updated = conn
            .execute(&sql, &[&row.id(), &row.tenant_id(), &body])
            .await
            .map_err(backend)?;
        if updated == 0 {
            return Err(not_found::<T>(row.id()));
        }
        Ok(())
    }

    async fn delete<T: Record>(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        let conn = self.conn().await?;
        let sql = format!("DELETE FROM {} WHERE id = $1 AND tenant_id = $2", T::SPEC.table);
        let deleted = conn.execute(&sql, &[&id, &tenant_id]).await.map_err(backend)?;
        if deleted == 0 {
            return Err(not_found::<T>(id));
        }
        Ok(())
    }

    /// Delete a row together with its dependents in `child_table`, which
    /// reference it through `child_key`.
    async fn delete_cascade<T: Record>(
        &self,
        id: EntityId,
        tenant_id: TenantId,
        child_table: &str,
        child_key: &str,
    ) -> CrmResult<()> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(backend)?;
        let sql = format!("DELETE FROM {} WHERE id = $1 AND tenant_id = $2", T::SPEC.table);
        let deleted = tx.execute(&sql, &[&id, &tenant_id]).await.map_err(backend)?;
        if deleted == 0 {
            return Err(not_found::<T>(id));
        }
        let sql = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND body->>'{}' = $2",
            child_table, child_key
        );
        tx.execute(&sql, &[&tenant_id, &id.to_string()])
            .await
            .map_err(backend)?;
        tx.commit().await.map_err(backend)
    }

    async fn delete_where<T: Record>(&self, query: Query) -> CrmResult<u64> {
        let conn = self.conn().await?;
        let sql = format!("DELETE FROM {} WHERE {}", T::SPEC.table, query.where_sql());
        conn.execute(&sql, &query.params()).await.map_err(backend)
    }

    async fn select<T: Record>(&self, query: Query, order_by: &str) -> CrmResult<Vec<T>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT body FROM {} WHERE {} ORDER BY {}",
            T::SPEC.table,
            query.where_sql(),
            order_by
        );
        let rows = conn.query(&sql, &query.params()).await.map_err(backend)?;
        rows.into_iter().map(|r| decode(r.get(0))).collect()
    }

    /// Newest first, with the total count before pagination.
    async fn page<T: Record>(&self, mut query: Query, filter: &ListFilter) -> CrmResult<Page<T>> {
        query.list_filter(&T::SPEC, filter);
        let conn = self.conn().await?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            T::SPEC.table,
            query.where_sql()
        );
        let total: i64 = conn
            .query_one(&count_sql, &query.params())
            .await
            .map_err(backend)?
            .get(0);

        let limit = filter.effective_limit();
        let offset = filter.effective_offset();
        let limit_p = query.bind(limit);
        let offset_p = query.bind(offset);
        let sql = format!(
            "SELECT body FROM {} WHERE {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            T::SPEC.table,
            query.where_sql(),
            limit_p,
            offset_p
        );
        let rows = conn.query(&sql, &query.params()).await.map_err(backend)?;
        let items = rows
            .into_iter()
            .map(|r| decode(r.get(0)))
            .collect::<CrmResult<Vec<T>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    async fn list<T: Record>(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<T>> {
        self.page(Query::new(tenant_id), filter).await
    }
}

const NEWEST_FIRST: &str = "created_at DESC, id DESC";

#[async_trait]
impl CrmStore for PgStore {
    // === Profile Operations ===

    async fn profile_insert(&self, p: &Profile) -> CrmResult<()> {
        self.insert(p).await
    }

    async fn profile_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Profile>> {
        self.get(id, tenant_id).await
    }

    async fn profile_update(&self, p: &Profile) -> CrmResult<()> {
        self.update(p).await
    }

    async fn profile_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Profile>> {
        self.list(tenant_id, filter).await
    }

    // === Lead Operations ===

    async fn lead_insert(&self, l: &Lead) -> CrmResult<()> {
        self.insert(l).await
    }

    async fn lead_insert_many(&self, leads: &[Lead]) -> CrmResult<()> {
        self.insert_many(leads).await
    }

    async fn lead_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Lead>> {
        self.get(id, tenant_id).await
    }

    async fn lead_update(&self, l: &Lead) -> CrmResult<()> {
        self.update(l).await
    }

    async fn lead_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete::<Lead>(id, tenant_id).await
    }

    async fn lead_list(&self, tenant_id: TenantId, filter: &ListFilter) -> CrmResult<Page<Lead>> {
        self.list(tenant_id, filter).await
    }

    async fn lead_emails(&self, tenant_id: TenantId) -> CrmResult<HashSet<String>> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT body->>'email' FROM {} WHERE tenant_id = $1 AND body->>'email' IS NOT NULL",
            Lead::SPEC.table
        );
        let rows = conn.query(&sql, &[&tenant_id]).await.map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(|r| normalize_email(r.get::<_, &str>(0)))
            .collect())
    }

    // === Account Operations ===

    async fn account_insert(&self, a: &Account) -> CrmResult<()> {
        self.insert(a).await
    }

    async fn account_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Account>> {
        self.get(id, tenant_id).await
    }

    async fn account_find_by_name(
        &self,
        name: &str,
        tenant_id: TenantId,
    ) -> CrmResult<Option<Account>> {
        let mut query = Query::new(tenant_id);
        let p = query.bind(name.trim().to_lowercase());
        query
            .clauses
            .push(format!("lower(trim(body->>'name')) = {}", p));
        let oldest: Vec<Account> = self
            .select(query, "created_at ASC, id ASC LIMIT 1")
            .await?;
        Ok(oldest.into_iter().next())
    }

    async fn account_update(&self, a: &Account) -> CrmResult<()> {
        self.update(a).await
    }

    async fn account_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete::<Account>(id, tenant_id).await
    }

    async fn account_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Account>> {
        self.list(tenant_id, filter).await
    }

    // === Contact Operations ===

    async fn contact_insert(&self, c: &Contact) -> CrmResult<()> {
        self.insert(c).await
    }

    async fn contact_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Contact>> {
        self.get(id, tenant_id).await
    }

    async fn contact_update(&self, c: &Contact) -> CrmResult<()> {
        self.update(c).await
    }

    async fn contact_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete::<Contact>(id, tenant_id).await
    }

    async fn contact_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Contact>> {
        self.list(tenant_id, filter).await
    }

    // === Opportunity Operations ===

    async fn opportunity_insert(&self, o: &Opportunity) -> CrmResult<()> {
        self.insert(o).await
    }

    async fn opportunity_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<Opportunity>> {
        self.get(id, tenant_id).await
    }

    async fn opportunity_update(&self, o: &Opportunity) -> CrmResult<()> {
        self.update(o).await
    }

    async fn opportunity_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete::<Opportunity>(id, tenant_id).await
    }

    async fn opportunity_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<Opportunity>> {
        self.list(tenant_id, filter).await
    }

    // === Activity Operations ===

    async fn activity_insert(&self, a: &Activity) -> CrmResult<()> {
        self.insert(a).await
    }

    async fn activity_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Activity>> {
        self.get(id, tenant_id).await
    }

    async fn activity_update(&self, a: &Activity) -> CrmResult<()> {
        self.update(a).await
    }

    async fn activity_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete::<Activity>(id, tenant_id).await
    }

    async fn activity_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<Activity>> {
        let mut query = Query::new(tenant_id);
        if let Some(target) = target {
            query.target(target);
        }
        self.page(query, filter).await
    }

    // === Note Operations ===

    async fn note_insert(&self, n: &Note) -> CrmResult<()> {
        self.insert(n).await
    }

    async fn note_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Note>> {
        self.get(id, tenant_id).await
    }

    async fn note_update(&self, n: &Note) -> CrmResult<()> {
        self.update(n).await
    }

    async fn note_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete::<Note>(id, tenant_id).await
    }

    async fn note_list(
        &self,
        tenant_id: TenantId,
        target: EntityRef,
        filter: &ListFilter,
    ) -> CrmResult<Page<Note>> {
        let mut query = Query::new(tenant_id);
        query.target(target);
        self.page(query, filter).await
    }

    // === Document Operations ===

    async fn document_insert(&self, d: &Document) -> CrmResult<()> {
        self.insert(d).await
    }

    async fn document_get(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<Option<Document>> {
        self.get(id, tenant_id).await
    }

    async fn document_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete_cascade::<Document>(id, tenant_id, DocumentLink::SPEC.table, "document_id")
            .await
    }

    async fn document_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<Document>> {
        let mut query = Query::new(tenant_id);
        if let Some(target) = target {
            let t = query.bind(target.entity_type.as_db_str().to_string());
            let e = query.bind(target.entity_id.to_string());
            query.clauses.push(format!(
                "id IN (SELECT (body->>'document_id')::uuid FROM {} \
                 WHERE tenant_id = $1 AND body->>'entity_type' = {} AND body->>'entity_id' = {})",
                DocumentLink::SPEC.table,
                t,
                e
            ));
        }
        self.page(query, filter).await
    }

    async fn document_link_insert(&self, link: &DocumentLink) -> CrmResult<()> {
        self.insert(link).await
    }

    async fn document_links(
        &self,
        document_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<DocumentLink>> {
        let mut query = Query::new(tenant_id);
        query.field_eq("document_id", document_id);
        self.select(query, NEWEST_FIRST).await
    }

    // === Audit Operations ===

    async fn audit_append(&self, entries: &[AuditLog]) -> CrmResult<()> {
        self.insert_many(entries).await
    }

    async fn audit_list(
        &self,
        tenant_id: TenantId,
        target: Option<EntityRef>,
        filter: &ListFilter,
    ) -> CrmResult<Page<AuditLog>> {
        let mut query = Query::new(tenant_id);
        if let Some(target) = target {
            query.target(target);
        }
        self.page(query, filter).await
    }

    // === Service Contract Operations ===

    async fn service_contract_insert(&self, c: &ServiceContract) -> CrmResult<()> {
        self.insert(c).await
    }

    async fn service_contract_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<ServiceContract>> {
        self.get(id, tenant_id).await
    }

    async fn service_contract_update(&self, c: &ServiceContract) -> CrmResult<()> {
        self.update(c).await
    }

    async fn service_contract_delete(&self, id: EntityId, tenant_id: TenantId) -> CrmResult<()> {
        self.delete_cascade::<ServiceContract>(id, tenant_id, ServiceLog::SPEC.table, "contract_id")
            .await
    }

    async fn service_contract_list(
        &self,
        tenant_id: TenantId,
        filter: &ListFilter,
    ) -> CrmResult<Page<ServiceContract>> {
        self.list(tenant_id, filter).await
    }

    async fn service_log_insert(&self, log: &ServiceLog) -> CrmResult<()> {
        self.insert(log).await
    }

    async fn service_log_list(
        &self,
        contract_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<ServiceLog>> {
        let mut query = Query::new(tenant_id);
        query.field_eq("contract_id", contract_id);
        self.select(query, NEWEST_FIRST).await
    }

    async fn service_log_delete_many(
        &self,
        ids: &[EntityId],
        tenant_id: TenantId,
    ) -> CrmResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut query = Query::new(tenant_id);
        let p = query.bind(ids.to_vec());
        query.clauses.push(format!("id = ANY({})", p));
        self.delete_where::<ServiceLog>(query).await
    }

    // === Import Staging Operations ===

    async fn import_batch_insert(&self, b: &ImportBatch) -> CrmResult<()> {
        self.insert(b).await
    }

    async fn import_batch_get(
        &self,
        id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Option<ImportBatch>> {
        self.get(id, tenant_id).await
    }

    async fn import_batch_update(&self, b: &ImportBatch) -> CrmResult<()> {
        self.update(b).await
    }

    async fn staged_lead_insert_many(&self, rows: &[StagedLead]) -> CrmResult<()> {
        self.insert_many(rows).await
    }

    async fn staged_lead_list(
        &self,
        batch_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<Vec<StagedLead>> {
        let mut query = Query::new(tenant_id);
        query.field_eq("batch_id", batch_id);
        self.select(query, "(body->>'row_number')::int ASC").await
    }

    async fn staged_lead_delete_batch(
        &self,
        batch_id: EntityId,
        tenant_id: TenantId,
    ) -> CrmResult<u64> {
        let mut query = Query::new(tenant_id);
        query.field_eq("batch_id", batch_id);
        self.delete_where::<StagedLead>(query).await
    }

    // === Misc ===

    async fn entity_exists(&self, target: EntityRef, tenant_id: TenantId) -> CrmResult<bool> {
        let conn = self.conn().await?;
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1 AND tenant_id = $2)",
            table_for(target.entity_type)
        );
        let row = conn
            .query_one(&sql, &[&target.entity_id, &tenant_id])
            .await
            .map_err(backend)?;
        Ok(row.get(0))
    }

    async fn health_check(&self) -> CrmResult<()> {
        let conn = self.conn().await?;
        conn.query_one("SELECT 1", &[]).await.map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_query_binds_tenant_first() {
        let tenant = Uuid::now_v7();
        let query = Query::new(tenant);
        assert_eq!(query.where_sql(), "tenant_id = $1");
        assert_eq!(query.params().len(), 1);
    }

    #[test]
    fn test_list_filter_uses_table_keys() {
        let filter = ListFilter {
            owner_id: Some(Uuid::nil()),
            status: Some(" Qualified ".to_string()),
            search: Some("Acme".to_string()),
            ..ListFilter::default()
        };
        let mut query = Query::new(Uuid::now_v7());
        query.list_filter(&Lead::SPEC, &filter);

        let sql = query.where_sql();
        assert!(sql.contains("body->>'owner_id' = $2"));
        assert!(sql.contains("lower(body->>'status') = $3"));
        assert!(sql.contains("lower(body->>'company') LIKE $4"));
        assert_eq!(query.params().len(), 4);
    }

    #[test]
    fn test_list_filter_skips_unsupported_keys() {
        let filter = ListFilter {
            account_id: Some(Uuid::nil()),
            search: Some("x".to_string()),
            ..ListFilter::default()
        };
        let mut query = Query::new(Uuid::now_v7());
        query.list_filter(&Note::SPEC, &filter);
        assert_eq!(query.where_sql(), "tenant_id = $1");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_every_entity_type_has_a_table() {
        let tables: HashSet<&str> = EntityType::ALL.iter().map(|t| table_for(*t)).collect();
        assert_eq!(tables.len(), EntityType::ALL.len());
    }
}
