//! CSV lead import pipeline
//!
//! `stage` parses the upload into the holding table; nothing reaches the
//! lead table until `confirm`. Confirmation fans valid rows out into leads
//! and, on request, accounts and contacts.

use chrono::Utc;
use crm_core::import::{normalize_email, prepare_import, LeadField, RowIssue};
use crm_core::permissions::Action;
use crm_core::{
    new_entity_id, Account, AuditAction, Contact, EntityId, EntityRef, EntityType, ImportBatch,
    ImportError, ImportStatus, Lead, LeadStatus, Locale, StagedLead, StagedRowStatus,
};
use std::collections::HashMap;

use super::access::authorize;
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;
use crate::types::{ConfirmImportRequest, ImportFailure, ImportPreviewResponse, ImportReport};

const DEFAULT_FILE_NAME: &str = "upload.csv";

fn record(stage: &str, outcome: &str, rows: usize) {
    if rows == 0 {
        return;
    }
    if let Some(m) = metrics() {
        m.record_import_rows(stage, outcome, rows);
    }
}

fn count(rows: usize) -> i32 {
    i32::try_from(rows).unwrap_or(i32::MAX)
}

/// Parse, validate and dedupe `text`, then persist it as a Staged batch.
pub async fn stage(
    state: &AppState,
    auth: &AuthContext,
    file_name: Option<String>,
    text: &str,
    locale: Locale,
) -> ApiResult<ImportPreviewResponse> {
    authorize(auth, Action::Import)?;

    let existing = state.store.lead_emails(auth.tenant_id).await?;
    let preview = prepare_import(text, &state.config.import_limits, &existing)?;

    let now = Utc::now();
    let batch = ImportBatch {
        batch_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        uploaded_by: auth.user_id,
        file_name: file_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()),
        status: ImportStatus::Staged,
        total_rows: count(preview.rows.len()),
        valid_rows: count(preview.count(StagedRowStatus::Valid)),
        invalid_rows: count(preview.count(StagedRowStatus::Invalid)),
        duplicate_rows: count(preview.count(StagedRowStatus::Duplicate)),
        unmapped_columns: preview.unmapped_columns.clone(),
        created_at: now,
        confirmed_at: None,
    };

    let rows: Vec<StagedLead> = preview
        .rows
        .into_iter()
        .map(|row| StagedLead {
            staged_id: new_entity_id(),
            tenant_id: auth.tenant_id,
            batch_id: batch.batch_id,
            row_number: row.row_number,
            errors: row.issues.iter().map(|i| i.render(locale)).collect(),
            record: row.record,
            status: row.status,
            created_at: now,
        })
        .collect();

    state.store.import_batch_insert(&batch).await?;
    state.store.staged_lead_insert_many(&rows).await?;

    record("staged", "valid", batch.valid_rows as usize);
    record("staged", "invalid", batch.invalid_rows as usize);
    record("staged", "duplicate", batch.duplicate_rows as usize);
    tracing::info!(
        batch_id = %batch.batch_id,
        total = batch.total_rows,
        valid = batch.valid_rows,
        invalid = batch.invalid_rows,
        duplicate = batch.duplicate_rows,
        "Lead import staged"
    );

    Ok(ImportPreviewResponse { batch, rows })
}

async fn load_batch(
    state: &AppState,
    auth: &AuthContext,
    batch_id: EntityId,
) -> ApiResult<ImportBatch> {
    state
        .store
        .import_batch_get(batch_id, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("ImportBatch", batch_id))
}

fn require_staged(batch: &ImportBatch) -> ApiResult<()> {
    if batch.status == ImportStatus::Staged {
        Ok(())
    } else {
        Err(ImportError::InvalidState {
            batch_id: batch.batch_id,
            status: batch.status,
        }
        .into())
    }
}

pub async fn get(
    state: &AppState,
    auth: &AuthContext,
    batch_id: EntityId,
) -> ApiResult<ImportPreviewResponse> {
    authorize(auth, Action::Read)?;
    let batch = load_batch(state, auth, batch_id).await?;
    let rows = state
        .store
        .staged_lead_list(batch_id, auth.tenant_id)
        .await?;
    Ok(ImportPreviewResponse { batch, rows })
}

fn lead_from_row(row: &StagedLead, batch_id: EntityId, owner_id: Option<EntityId>) -> Option<Lead> {
    let record = &row.record;
    let last_name = record.last_name.clone()?;
    let now = Utc::now();
    Some(Lead {
        lead_id: new_entity_id(),
        tenant_id: row.tenant_id,
        owner_id,
        first_name: record.first_name.clone(),
        last_name,
        email: record.email.as_deref().map(normalize_email),
        phone: record.phone.clone(),
        company: record.company.clone(),
        title: record.title.clone(),
        source: record.source.clone(),
        status: LeadStatus::New,
        import_batch_id: Some(batch_id),
        converted_account_id: None,
        converted_contact_id: None,
        created_at: now,
        updated_at: now,
    })
}

/// Accounts resolved while confirming one batch, keyed by lowercased name.
#[derive(Default)]
struct AccountCache {
    by_name: HashMap<String, EntityId>,
}

impl AccountCache {
    async fn resolve(
        &mut self,
        state: &AppState,
        auth: &AuthContext,
        company: &str,
        owner_id: Option<EntityId>,
        report: &mut ImportReport,
    ) -> ApiResult<EntityId> {
        let key = company.trim().to_lowercase();
        if let Some(id) = self.by_name.get(&key) {
            return Ok(*id);
        }

        let account_id = match state
            .store
            .account_find_by_name(company.trim(), auth.tenant_id)
            .await?
        {
            Some(existing) => {
                report.accounts_reused += 1;
                existing.account_id
            }
            None => {
                let now = Utc::now();
                let account = Account {
                    account_id: new_entity_id(),
                    tenant_id: auth.tenant_id,
                    owner_id,
                    name: company.trim().to_string(),
                    industry: None,
                    website: None,
                    phone: None,
                    email: None,
                    billing_address: None,
                    annual_revenue: None,
                    created_at: now,
                    updated_at: now,
                };
                state.store.account_insert(&account).await?;
                report.accounts_created += 1;
                account.account_id
            }
        };
        self.by_name.insert(key, account_id);
        Ok(account_id)
    }
}

fn contact_from_lead(lead: &Lead, account_id: Option<EntityId>) -> Contact {
    let now = Utc::now();
    Contact {
        contact_id: new_entity_id(),
        tenant_id: lead.tenant_id,
        owner_id: lead.owner_id,
        account_id,
        first_name: lead.first_name.clone(),
        last_name: lead.last_name.clone(),
        email: lead.email.clone(),
        phone: lead.phone.clone(),
        title: lead.title.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Apply a staged batch. A batch is applied at most once. Row failures are
/// rendered in `locale`.
pub async fn confirm(
    state: &AppState,
    auth: &AuthContext,
    batch_id: EntityId,
    req: ConfirmImportRequest,
    locale: Locale,
) -> ApiResult<ImportReport> {
    authorize(auth, Action::Import)?;
    let mut batch = load_batch(state, auth, batch_id).await?;
    require_staged(&batch)?;

    let rows = state
        .store
        .staged_lead_list(batch_id, auth.tenant_id)
        .await?;
    let owner_id = req.owner_id.or(auth.user_id);

    // Emails may have been taken by other writes since staging
    let existing = state.store.lead_emails(auth.tenant_id).await?;

    let mut report = ImportReport {
        batch_id,
        ..Default::default()
    };
    let mut leads = Vec::new();
    for row in &rows {
        if row.status != StagedRowStatus::Valid {
            report.skipped_rows += 1;
            continue;
        }
        match lead_from_row(row, batch_id, owner_id) {
            Some(lead) => match lead.email.as_ref().filter(|e| existing.contains(*e)) {
                Some(email) => report.failures.push(ImportFailure {
                    row_number: row.row_number,
                    reason: RowIssue::DuplicateExisting {
                        email: email.clone(),
                    }
                    .render(locale),
                }),
                None => leads.push((row.row_number, lead)),
            },
            None => report.failures.push(ImportFailure {
                row_number: row.row_number,
                reason: RowIssue::Required {
                    field: LeadField::LastName,
                }
                .render(locale),
            }),
        }
    }

    let batch_leads: Vec<Lead> = leads.iter().map(|(_, lead)| lead.clone()).collect();
    state.store.lead_insert_many(&batch_leads).await?;
    report.leads_created = batch_leads.len();

    if req.create_accounts || req.create_contacts {
        let mut accounts = AccountCache::default();
        for (row_number, lead) in &leads {
            if let Err(e) = fan_out(state, auth, lead, &req, &mut accounts, &mut report).await {
                tracing::warn!(
                    batch_id = %batch_id,
                    row_number,
                    error = %e,
                    "Import fan-out failed"
                );
                report.failures.push(ImportFailure {
                    row_number: *row_number,
                    reason: e.message,
                });
            }
        }
    }

    let before = batch.clone();
    batch.status = ImportStatus::Confirmed;
    batch.confirmed_at = Some(Utc::now());
    state.store.import_batch_update(&batch).await?;

    state
        .audit()
        .action(
            auth,
            EntityRef::new(EntityType::ImportBatch, batch_id),
            AuditAction::Import,
            Some(serde_json::json!({ "status": before.status })),
            Some(serde_json::to_value(&report)?),
        )
        .await;

    record("confirmed", "created", report.leads_created);
    record("confirmed", "skipped", report.skipped_rows);
    record("confirmed", "failed", report.failures.len());
    tracing::info!(
        batch_id = %batch_id,
        leads = report.leads_created,
        accounts_created = report.accounts_created,
        contacts = report.contacts_created,
        failures = report.failures.len(),
        "Lead import confirmed"
    );
    Ok(report)
}

async fn fan_out(
    state: &AppState,
    auth: &AuthContext,
    lead: &Lead,
    req: &ConfirmImportRequest,
    accounts: &mut AccountCache,
    report: &mut ImportReport,
) -> ApiResult<()> {
    let mut account_id = None;
    if req.create_accounts {
        if let Some(company) = lead.company.as_deref().filter(|c| !c.trim().is_empty()) {
            account_id = Some(
                accounts
                    .resolve(state, auth, company, lead.owner_id, report)
                    .await?,
            );
        }
    }
    if req.create_contacts {
        state
            .store
            .contact_insert(&contact_from_lead(lead, account_id))
            .await?;
        report.contacts_created += 1;
    }
    Ok(())
}

/// Drop a staged batch and its holding rows.
pub async fn discard(state: &AppState, auth: &AuthContext, batch_id: EntityId) -> ApiResult<()> {
    authorize(auth, Action::Import)?;
    let mut batch = load_batch(state, auth, batch_id).await?;
    require_staged(&batch)?;

    batch.status = ImportStatus::Discarded;
    state.store.import_batch_update(&batch).await?;
    let removed = state
        .store
        .staged_lead_delete_batch(batch_id, auth.tenant_id)
        .await?;
    tracing::info!(batch_id = %batch_id, removed, "Lead import discarded");
    Ok(())
}
