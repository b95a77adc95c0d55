//! Service-contract workflow
//!
//! Every write follows the same cascade: persist the contract, append a
//! service log where one applies, write the audit diff, push the calendar
//! event, then prune logs beyond the contract's retention.

use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::schedule::{self, ScheduleChange};
use crm_core::{
    new_entity_id, AuditAction, ContractStatus, Date, EntityRef, EntityType, ServiceContract,
    ServiceLog, ServiceLogKind,
};

use super::access::{authorize, authorize_owned, ensure_exists};
use super::calendar::{sync_contract, SyncOutcome};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::telemetry::metrics;
use crate::types::{
    CompleteServiceRequest, CreateServiceContractRequest, RescheduleServiceRequest,
    ServiceContractUpdateResponse, UpdateServiceContractRequest,
};
use crate::validation::clean;

fn contract_ref(contract: &ServiceContract) -> EntityRef {
    EntityRef::new(EntityType::ServiceContract, contract.contract_id)
}

fn record(operation: &str, result: &ApiResult<ServiceContractUpdateResponse>) {
    if let Some(m) = metrics() {
        m.record_contract_operation(operation, result.is_ok());
    }
}

pub async fn load(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
) -> ApiResult<ServiceContract> {
    state
        .store
        .service_contract_get(contract_id, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("ServiceContract", contract_id))
}

/// Push the contract to the calendar and persist a changed event id.
async fn sync_calendar(state: &AppState, contract: &mut ServiceContract) -> SyncOutcome {
    let outcome = sync_contract(state.calendar.as_ref(), contract).await;
    if outcome.synced {
        let event_id = if contract.next_due_date.is_some() && contract.status.is_active() {
            outcome.event_id.clone().or_else(|| contract.calendar_event_id.clone())
        } else {
            None
        };
        if event_id != contract.calendar_event_id {
            contract.calendar_event_id = event_id;
            if let Err(e) = state.store.service_contract_update(contract).await {
                tracing::warn!(
                    contract_id = %contract.contract_id,
                    error = %e,
                    "Failed to store calendar event id"
                );
            }
        }
    }
    outcome
}

/// Delete logs beyond the contract's retention. Failures are logged.
async fn prune_logs(state: &AppState, contract: &ServiceContract) -> u64 {
    let logs = match state
        .store
        .service_log_list(contract.contract_id, contract.tenant_id)
        .await
    {
        Ok(logs) => logs,
        Err(e) => {
            tracing::warn!(
                contract_id = %contract.contract_id,
                error = %e,
                "Failed to list service logs"
            );
            return 0;
        }
    };

    let stale = schedule::logs_to_prune(&logs, contract.log_retention);
    if stale.is_empty() {
        return 0;
    }
    match state
        .store
        .service_log_delete_many(&stale, contract.tenant_id)
        .await
    {
        Ok(removed) => {
            tracing::debug!(contract_id = %contract.contract_id, removed, "Pruned service logs");
            removed
        }
        Err(e) => {
            tracing::warn!(
                contract_id = %contract.contract_id,
                error = %e,
                "Failed to prune service logs"
            );
            0
        }
    }
}

fn response(
    contract: ServiceContract,
    log: Option<ServiceLog>,
    pruned_logs: u64,
    calendar: SyncOutcome,
) -> ServiceContractUpdateResponse {
    ServiceContractUpdateResponse {
        contract,
        log,
        pruned_logs,
        calendar_synced: calendar.synced,
        calendar_error: calendar.error,
    }
}

pub async fn create(
    state: &AppState,
    auth: &AuthContext,
    req: CreateServiceContractRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    let result = create_inner(state, auth, req).await;
    record("create", &result);
    result
}

async fn create_inner(
    state: &AppState,
    auth: &AuthContext,
    req: CreateServiceContractRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    authorize(auth, Action::Create)?;
    authorize(auth, Action::ManageContracts)?;
    req.validate()?;
    ensure_exists(
        &state.store,
        EntityRef::new(EntityType::Account, req.account_id),
        auth.tenant_id,
    )
    .await?;

    let now = Utc::now();
    let mut contract = ServiceContract {
        contract_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id: req.owner_id.or(auth.user_id),
        account_id: req.account_id,
        name: req.name.trim().to_string(),
        description: clean(req.description),
        frequency: req.frequency,
        start_date: req.start_date,
        end_date: req.end_date,
        next_due_date: Some(req.next_due_date.unwrap_or(req.start_date)),
        last_completed_on: None,
        status: ContractStatus::Active,
        calendar_event_id: None,
        log_retention: req.log_retention.unwrap_or(state.config.default_log_retention),
        created_at: now,
        updated_at: now,
    };
    state.store.service_contract_insert(&contract).await?;
    state
        .audit()
        .created(auth, contract_ref(&contract), &contract)
        .await;

    let calendar = sync_calendar(state, &mut contract).await;
    tracing::info!(contract_id = %contract.contract_id, "Service contract created");
    Ok(response(contract, None, 0, calendar))
}

/// Plain edit. Only dates are validated; the schedule is not recomputed.
pub async fn update(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
    req: UpdateServiceContractRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    let result = update_inner(state, auth, contract_id, req).await;
    record("update", &result);
    result
}

async fn update_inner(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
    req: UpdateServiceContractRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    req.validate()?;
    let mut contract = load(state, auth, contract_id).await?;
    authorize_owned(auth, contract.owner_id, Action::Update)?;
    authorize(auth, Action::ManageContracts)?;

    let before = contract.clone();
    req.apply(&mut contract);
    schedule::validate_term(contract.start_date, contract.end_date, contract.next_due_date)?;
    contract.updated_at = Utc::now();

    state.store.service_contract_update(&contract).await?;
    state
        .audit()
        .updated(auth, contract_ref(&contract), &before, &contract)
        .await;

    let calendar_relevant = before.status != contract.status
        || before.name != contract.name
        || before.end_date != contract.end_date;
    let calendar = if calendar_relevant {
        sync_calendar(state, &mut contract).await
    } else {
        SyncOutcome::default()
    };
    Ok(response(contract, None, 0, calendar))
}

/// Record a completed visit and roll the due date forward from it.
pub async fn complete(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
    req: CompleteServiceRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    let result = complete_inner(state, auth, contract_id, req).await;
    record("complete", &result);
    result
}

async fn complete_inner(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
    req: CompleteServiceRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    let mut contract = load(state, auth, contract_id).await?;
    authorize_owned(auth, contract.owner_id, Action::ManageContracts)?;

    let completed_on = req.completed_on.unwrap_or_else(|| Utc::now().date_naive());
    let plan = schedule::plan_completion(&contract, completed_on)?;
    apply_schedule_change(
        state,
        auth,
        &mut contract,
        plan,
        ServiceLogKind::Completed,
        completed_on,
        clean(req.notes),
    )
    .await
}

/// Move the next visit to a new date inside the contract term.
pub async fn reschedule(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
    req: RescheduleServiceRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    let result = reschedule_inner(state, auth, contract_id, req).await;
    record("reschedule", &result);
    result
}

async fn reschedule_inner(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
    req: RescheduleServiceRequest,
) -> ApiResult<ServiceContractUpdateResponse> {
    let mut contract = load(state, auth, contract_id).await?;
    authorize_owned(auth, contract.owner_id, Action::ManageContracts)?;

    let plan = schedule::plan_reschedule(&contract, req.new_due_date)?;
    apply_schedule_change(
        state,
        auth,
        &mut contract,
        plan,
        ServiceLogKind::Rescheduled,
        Utc::now().date_naive(),
        clean(req.reason),
    )
    .await
}

async fn apply_schedule_change(
    state: &AppState,
    auth: &AuthContext,
    contract: &mut ServiceContract,
    plan: ScheduleChange,
    kind: ServiceLogKind,
    performed_on: Date,
    notes: Option<String>,
) -> ApiResult<ServiceContractUpdateResponse> {
    let before = contract.clone();
    plan.apply_to(contract);
    contract.updated_at = Utc::now();
    state.store.service_contract_update(contract).await?;

    let log = ServiceLog {
        log_id: new_entity_id(),
        tenant_id: contract.tenant_id,
        contract_id: contract.contract_id,
        kind,
        performed_on,
        previous_due_date: plan.previous_due_date,
        next_due_date: plan.next_due_date,
        notes,
        performed_by: auth.user_id,
        created_at: contract.updated_at,
    };
    state.store.service_log_insert(&log).await?;

    let action = match kind {
        ServiceLogKind::Completed => AuditAction::Complete,
        ServiceLogKind::Rescheduled => AuditAction::Reschedule,
    };
    state
        .audit()
        .changed(auth, contract_ref(contract), action, &before, &*contract)
        .await;

    let calendar = sync_calendar(state, contract).await;
    let pruned = prune_logs(state, contract).await;

    tracing::info!(
        contract_id = %contract.contract_id,
        kind = %kind,
        next_due_date = ?contract.next_due_date,
        status = %contract.status,
        "Service contract schedule updated"
    );
    Ok(response(contract.clone(), Some(log), pruned, calendar))
}

/// Delete the contract and cancel its calendar event.
pub async fn delete(
    state: &AppState,
    auth: &AuthContext,
    contract_id: crm_core::EntityId,
) -> ApiResult<()> {
    let contract = load(state, auth, contract_id).await?;
    authorize_owned(auth, contract.owner_id, Action::Delete)?;
    authorize(auth, Action::ManageContracts)?;

    state
        .store
        .service_contract_delete(contract_id, auth.tenant_id)
        .await?;
    state
        .audit()
        .deleted(auth, contract_ref(&contract), &contract)
        .await;

    if contract.calendar_event_id.is_some() {
        let mut cancelled = contract;
        cancelled.status = ContractStatus::Cancelled;
        cancelled.next_due_date = None;
        let _ = sync_contract(state.calendar.as_ref(), &cancelled).await;
    }
    if let Some(m) = metrics() {
        m.record_contract_operation("delete", true);
    }
    Ok(())
}
