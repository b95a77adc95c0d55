//! Account API types

use crm_core::{Account, EntityId};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::validation::{clean, HasUpdates, ValidateNonEmpty, ValidateText};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAccountRequest {
    pub name: String,
    /// Defaults to the caller
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub billing_address: Option<String>,
    pub annual_revenue: Option<f64>,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.name.validate_non_empty("name")?;
        self.name.validate_max_len("name")?;
        self.industry.validate_max_len("industry")?;
        self.website.validate_max_len("website")?;
        self.phone.validate_max_len("phone")?;
        self.email.validate_email("email")?;
        validate_revenue(self.annual_revenue)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub billing_address: Option<String>,
    pub annual_revenue: Option<f64>,
}

impl HasUpdates for UpdateAccountRequest {
    fn has_any_updates(&self) -> bool {
        self.name.is_some()
            || self.owner_id.is_some()
            || self.industry.is_some()
            || self.website.is_some()
            || self.phone.is_some()
            || self.email.is_some()
            || self.billing_address.is_some()
            || self.annual_revenue.is_some()
    }
}

impl UpdateAccountRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.validate_has_updates()?;
        if let Some(name) = &self.name {
            name.validate_non_empty("name")?;
            name.validate_max_len("name")?;
        }
        self.industry.validate_max_len("industry")?;
        self.website.validate_max_len("website")?;
        self.phone.validate_max_len("phone")?;
        self.email.validate_email("email")?;
        validate_revenue(self.annual_revenue)
    }

    pub fn apply(self, account: &mut Account) {
        if let Some(name) = self.name {
            account.name = name.trim().to_string();
        }
        if let Some(owner_id) = self.owner_id {
            account.owner_id = Some(owner_id);
        }
        if self.industry.is_some() {
            account.industry = clean(self.industry);
        }
        if self.website.is_some() {
            account.website = clean(self.website);
        }
        if self.phone.is_some() {
            account.phone = clean(self.phone);
        }
        if self.email.is_some() {
            account.email = clean(self.email);
        }
        if self.billing_address.is_some() {
            account.billing_address = clean(self.billing_address);
        }
        if let Some(revenue) = self.annual_revenue {
            account.annual_revenue = Some(revenue);
        }
    }
}

fn validate_revenue(value: Option<f64>) -> ApiResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(crate::error::ApiError::invalid_input(
            "annual_revenue must be a non-negative number",
        )),
        _ => Ok(()),
    }
}
