//! Lead API types

use crm_core::{Account, Contact, Date, EntityId, Lead, LeadStatus, Opportunity};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::validation::{clean, HasUpdates, ValidateNonEmpty, ValidateText};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateLeadRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
}

impl CreateLeadRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.last_name.validate_non_empty("last_name")?;
        self.last_name.validate_max_len("last_name")?;
        self.first_name.validate_max_len("first_name")?;
        self.email.validate_email("email")?;
        self.phone.validate_max_len("phone")?;
        self.company.validate_max_len("company")?;
        self.title.validate_max_len("title")?;
        self.source.validate_max_len("source")?;
        if self.status == Some(LeadStatus::Converted) {
            return Err(ApiError::invalid_input(
                "Leads become Converted through POST /api/v1/leads/{id}/convert",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateLeadRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub status: Option<LeadStatus>,
}

impl HasUpdates for UpdateLeadRequest {
    fn has_any_updates(&self) -> bool {
        self.owner_id.is_some()
            || self.first_name.is_some()
            || self.last_name.is_some()
            || self.email.is_some()
            || self.phone.is_some()
            || self.company.is_some()
            || self.title.is_some()
            || self.source.is_some()
            || self.status.is_some()
    }
}

impl UpdateLeadRequest {
    pub fn validate(&self, current: &Lead) -> ApiResult<()> {
        self.validate_has_updates()?;
        if let Some(last_name) = &self.last_name {
            last_name.validate_non_empty("last_name")?;
            last_name.validate_max_len("last_name")?;
        }
        self.first_name.validate_max_len("first_name")?;
        self.email.validate_email("email")?;
        self.phone.validate_max_len("phone")?;
        self.company.validate_max_len("company")?;
        self.title.validate_max_len("title")?;
        self.source.validate_max_len("source")?;

        match self.status {
            Some(LeadStatus::Converted) if current.status != LeadStatus::Converted => {
                Err(ApiError::invalid_input(
                    "Leads become Converted through POST /api/v1/leads/{id}/convert",
                ))
            }
            Some(status) if current.status == LeadStatus::Converted && status != current.status => {
                Err(ApiError::state_conflict("A converted lead cannot change status"))
            }
            _ => Ok(()),
        }
    }

    pub fn apply(self, lead: &mut Lead) {
        if let Some(owner_id) = self.owner_id {
            lead.owner_id = Some(owner_id);
        }
        if self.first_name.is_some() {
            lead.first_name = clean(self.first_name);
        }
        if let Some(last_name) = self.last_name {
            lead.last_name = last_name.trim().to_string();
        }
        if let Some(email) = self.email {
            lead.email = Some(crm_core::import::normalize_email(&email)).filter(|e| !e.is_empty());
        }
        if self.phone.is_some() {
            lead.phone = clean(self.phone);
        }
        if self.company.is_some() {
            lead.company = clean(self.company);
        }
        if self.title.is_some() {
            lead.title = clean(self.title);
        }
        if self.source.is_some() {
            lead.source = clean(self.source);
        }
        if let Some(status) = self.status {
            lead.status = status;
        }
    }
}

/// Request to convert a lead into an account, a contact and optionally an
/// opportunity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConvertLeadRequest {
    /// Attach to this account instead of matching by company name
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub account_id: Option<EntityId>,
    /// Owner of the created records. Defaults to the lead's owner.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    #[serde(default)]
    pub create_opportunity: bool,
    /// Defaults to "<company> - <lead name>"
    pub opportunity_name: Option<String>,
    pub amount: Option<f64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub expected_close_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConvertLeadResponse {
    pub lead: Lead,
    pub account: Account,
    /// False when an existing account was reused
    pub account_created: bool,
    pub contact: Contact,
    pub opportunity: Option<Opportunity>,
}
