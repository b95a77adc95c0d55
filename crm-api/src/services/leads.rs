//! Lead conversion

use chrono::Utc;
use crm_core::permissions::Action;
use crm_core::{
    new_entity_id, Account, AuditAction, Contact, EntityId, EntityRef, EntityType, Lead,
    LeadStatus, Opportunity, OpportunityStage,
};

use super::access::authorize_owned;
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{ConvertLeadRequest, ConvertLeadResponse};
use crate::validation::clean;

/// Turn a lead into an account (matched by company name or created), a
/// contact and optionally an opportunity, then mark it Converted.
pub async fn convert(
    state: &AppState,
    auth: &AuthContext,
    lead_id: EntityId,
    req: ConvertLeadRequest,
) -> ApiResult<ConvertLeadResponse> {
    let mut lead = state
        .store
        .lead_get(lead_id, auth.tenant_id)
        .await?
        .ok_or_else(|| ApiError::entity_not_found("Lead", lead_id))?;
    authorize_owned(auth, lead.owner_id, Action::Update)?;
    if !lead.status.can_convert() {
        return Err(ApiError::state_conflict(format!(
            "Lead {} is already converted",
            lead_id
        )));
    }
    if let Some(amount) = req.amount {
        if amount < 0.0 {
            return Err(ApiError::invalid_input("amount must not be negative"));
        }
    }

    let owner_id = req.owner_id.or(lead.owner_id).or(auth.user_id);
    let (account, account_created) = resolve_account(state, auth, &lead, &req, owner_id).await?;

    let now = Utc::now();
    let contact = Contact {
        contact_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id,
        account_id: Some(account.account_id),
        first_name: lead.first_name.clone(),
        last_name: lead.last_name.clone(),
        email: lead.email.clone(),
        phone: lead.phone.clone(),
        title: lead.title.clone(),
        created_at: now,
        updated_at: now,
    };
    state.store.contact_insert(&contact).await?;

    let opportunity = if req.create_opportunity {
        let stage = OpportunityStage::Prospecting;
        let opportunity = Opportunity {
            opportunity_id: new_entity_id(),
            tenant_id: auth.tenant_id,
            owner_id,
            account_id: Some(account.account_id),
            contact_id: Some(contact.contact_id),
            name: clean(req.opportunity_name)
                .unwrap_or_else(|| format!("{} - {}", account.name, lead.display_name())),
            stage,
            amount: req.amount,
            probability: stage.default_probability(),
            expected_close_date: req.expected_close_date,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        state.store.opportunity_insert(&opportunity).await?;
        Some(opportunity)
    } else {
        None
    };

    let before = lead.clone();
    lead.status = LeadStatus::Converted;
    lead.converted_account_id = Some(account.account_id);
    lead.converted_contact_id = Some(contact.contact_id);
    lead.updated_at = now;
    state.store.lead_update(&lead).await?;

    let audit = state.audit();
    audit
        .changed(
            auth,
            EntityRef::new(EntityType::Lead, lead_id),
            AuditAction::Convert,
            &before,
            &lead,
        )
        .await;
    if account_created {
        audit
            .created(auth, EntityRef::new(EntityType::Account, account.account_id), &account)
            .await;
    }
    audit
        .created(auth, EntityRef::new(EntityType::Contact, contact.contact_id), &contact)
        .await;
    if let Some(opp) = &opportunity {
        audit
            .created(auth, EntityRef::new(EntityType::Opportunity, opp.opportunity_id), opp)
            .await;
    }

    tracing::info!(
        lead_id = %lead_id,
        account_id = %account.account_id,
        account_created,
        contact_id = %contact.contact_id,
        "Lead converted"
    );
    Ok(ConvertLeadResponse {
        lead,
        account,
        account_created,
        contact,
        opportunity,
    })
}

async fn resolve_account(
    state: &AppState,
    auth: &AuthContext,
    lead: &Lead,
    req: &ConvertLeadRequest,
    owner_id: Option<EntityId>,
) -> ApiResult<(Account, bool)> {
    if let Some(account_id) = req.account_id {
        let account = state
            .store
            .account_get(account_id, auth.tenant_id)
            .await?
            .ok_or_else(|| ApiError::reference_not_found("Account", account_id))?;
        return Ok((account, false));
    }

    let name = lead
        .company
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| lead.display_name());

    if let Some(existing) = state
        .store
        .account_find_by_name(&name, auth.tenant_id)
        .await?
    {
        return Ok((existing, false));
    }

    let now = Utc::now();
    let account = Account {
        account_id: new_entity_id(),
        tenant_id: auth.tenant_id,
        owner_id,
        name,
        industry: None,
        website: None,
        phone: lead.phone.clone(),
        email: None,
        billing_address: None,
        annual_revenue: None,
        created_at: now,
        updated_at: now,
    };
    state.store.account_insert(&account).await?;
    Ok((account, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthMethod;
    use crate::config::ApiConfig;
    use crate::error::ErrorCode;
    use crate::services::calendar::NoopCalendarSync;
    use crm_core::{ListFilter, Role};
    use crm_storage::MemoryStore;
    use std::sync::Arc;

    async fn setup(company: Option<&str>) -> (AppState, AuthContext, Lead) {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(NoopCalendarSync),
            ApiConfig::default(),
        );
        let auth = AuthContext::new(
            new_entity_id().to_string(),
            new_entity_id(),
            Role::SalesRep,
            AuthMethod::Jwt,
        );
        let now = Utc::now();
        let lead = Lead {
            lead_id: new_entity_id(),
            tenant_id: auth.tenant_id,
            owner_id: auth.user_id,
            first_name: Some("Grace".to_string()),
            last_name: "Hopper".to_string(),
            email: Some("grace@navy.example".to_string()),
            phone: None,
            company: company.map(str::to_string),
            title: Some("Rear Admiral".to_string()),
            source: None,
            status: LeadStatus::Qualified,
            import_batch_id: None,
            converted_account_id: None,
            converted_contact_id: None,
            created_at: now,
            updated_at: now,
        };
        state.store.lead_insert(&lead).await.unwrap();
        (state, auth, lead)
    }

    #[tokio::test]
    async fn test_convert_creates_account_contact_and_opportunity() {
        let (state, auth, lead) = setup(Some("US Navy")).await;
        let resp = convert(
            &state,
            &auth,
            lead.lead_id,
            ConvertLeadRequest {
                create_opportunity: true,
                amount: Some(5000.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(resp.account_created);
        assert_eq!(resp.account.name, "US Navy");
        assert_eq!(resp.contact.account_id, Some(resp.account.account_id));
        let opp = resp.opportunity.unwrap();
        assert_eq!(opp.name, "US Navy - Grace Hopper");
        assert_eq!(opp.stage, OpportunityStage::Prospecting);
        assert_eq!(resp.lead.status, LeadStatus::Converted);
        assert_eq!(resp.lead.converted_contact_id, Some(resp.contact.contact_id));

        let err = convert(&state, &auth, lead.lead_id, ConvertLeadRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StateConflict);
    }

    #[tokio::test]
    async fn test_convert_reuses_account_by_name() {
        let (state, auth, lead) = setup(Some("navy corp")).await;
        let now = Utc::now();
        let existing = Account {
            account_id: new_entity_id(),
            tenant_id: auth.tenant_id,
            owner_id: None,
            name: "Navy Corp".to_string(),
            industry: None,
            website: None,
            phone: None,
            email: None,
            billing_address: None,
            annual_revenue: None,
            created_at: now,
            updated_at: now,
        };
        state.store.account_insert(&existing).await.unwrap();

        let resp = convert(&state, &auth, lead.lead_id, ConvertLeadRequest::default())
            .await
            .unwrap();
        assert!(!resp.account_created);
        assert_eq!(resp.account.account_id, existing.account_id);
        assert!(resp.opportunity.is_none());

        let accounts = state
            .store
            .account_list(auth.tenant_id, &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(accounts.total, 1);
    }

    #[tokio::test]
    async fn test_convert_without_company_uses_lead_name() {
        let (state, auth, lead) = setup(None).await;
        let resp = convert(&state, &auth, lead.lead_id, ConvertLeadRequest::default())
            .await
            .unwrap();
        assert_eq!(resp.account.name, "Grace Hopper");
    }

    #[tokio::test]
    async fn test_convert_with_unknown_account_fails() {
        let (state, auth, lead) = setup(None).await;
        let err = convert(
            &state,
            &auth,
            lead.lead_id,
            ConvertLeadRequest {
                account_id: Some(new_entity_id()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReferenceNotFound);
    }
}
