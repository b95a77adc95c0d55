//! Opportunity API types

use crm_core::{Date, EntityId, OpportunityStage};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::validation::{HasUpdates, ValidateNonEmpty, ValidateRange, ValidateText};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateOpportunityRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub account_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub contact_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub name: String,
    /// Defaults to Prospecting
    pub stage: Option<OpportunityStage>,
    pub amount: Option<f64>,
    /// Defaults to the stage's probability
    pub probability: Option<i32>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub expected_close_date: Option<Date>,
}

impl CreateOpportunityRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.name.validate_non_empty("name")?;
        self.name.validate_max_len("name")?;
        validate_amount(self.amount)?;
        if let Some(p) = self.probability {
            p.validate_range("probability", 0, 100)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateOpportunityRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub account_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub contact_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub name: Option<String>,
    pub stage: Option<OpportunityStage>,
    pub amount: Option<f64>,
    pub probability: Option<i32>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub expected_close_date: Option<Date>,
}

impl HasUpdates for UpdateOpportunityRequest {
    fn has_any_updates(&self) -> bool {
        self.account_id.is_some()
            || self.contact_id.is_some()
            || self.owner_id.is_some()
            || self.name.is_some()
            || self.stage.is_some()
            || self.amount.is_some()
            || self.probability.is_some()
            || self.expected_close_date.is_some()
    }
}

impl UpdateOpportunityRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.validate_has_updates()?;
        if let Some(name) = &self.name {
            name.validate_non_empty("name")?;
            name.validate_max_len("name")?;
        }
        validate_amount(self.amount)?;
        if let Some(p) = self.probability {
            p.validate_range("probability", 0, 100)?;
        }
        Ok(())
    }
}

fn validate_amount(amount: Option<f64>) -> ApiResult<()> {
    match amount {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ApiError::invalid_input(
            "amount must be a non-negative number",
        )),
        _ => Ok(()),
    }
}
