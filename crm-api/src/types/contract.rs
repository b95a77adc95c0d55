//! Service contract API types

use crm_core::{
    ContractStatus, Date, EntityId, ServiceContract, ServiceFrequency, ServiceLog,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::validation::{HasUpdates, ValidateNonEmpty, ValidateRange, ValidateText};

/// Upper bound for `log_retention`.
pub const MAX_LOG_RETENTION: i32 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateServiceContractRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub account_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub name: String,
    pub description: Option<String>,
    pub frequency: ServiceFrequency,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date"))]
    pub start_date: Date,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub end_date: Option<Date>,
    /// First visit. Defaults to `start_date`.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub next_due_date: Option<Date>,
    /// Defaults to `CRM_DEFAULT_LOG_RETENTION`
    pub log_retention: Option<i32>,
}

impl CreateServiceContractRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.name.validate_non_empty("name")?;
        self.name.validate_max_len("name")?;
        self.frequency.validate()?;
        if let Some(retention) = self.log_retention {
            retention.validate_range("log_retention", 1, MAX_LOG_RETENTION)?;
        }
        crm_core::schedule::validate_term(
            self.start_date,
            self.end_date,
            Some(self.next_due_date.unwrap_or(self.start_date)),
        )?;
        Ok(())
    }
}

/// Plain edit of a contract. Schedule dates move only through the
/// complete/reschedule endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateServiceContractRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<ServiceFrequency>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub end_date: Option<Date>,
    pub status: Option<ContractStatus>,
    pub log_retention: Option<i32>,
}

impl HasUpdates for UpdateServiceContractRequest {
    fn has_any_updates(&self) -> bool {
        self.owner_id.is_some()
            || self.name.is_some()
            || self.description.is_some()
            || self.frequency.is_some()
            || self.end_date.is_some()
            || self.status.is_some()
            || self.log_retention.is_some()
    }
}

impl UpdateServiceContractRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.validate_has_updates()?;
        if let Some(name) = &self.name {
            name.validate_non_empty("name")?;
            name.validate_max_len("name")?;
        }
        if let Some(frequency) = &self.frequency {
            frequency.validate()?;
        }
        if let Some(retention) = self.log_retention {
            retention.validate_range("log_retention", 1, MAX_LOG_RETENTION)?;
        }
        Ok(())
    }

    pub fn apply(self, contract: &mut ServiceContract) {
        if let Some(owner_id) = self.owner_id {
            contract.owner_id = Some(owner_id);
        }
        if let Some(name) = self.name {
            contract.name = name.trim().to_string();
        }
        if self.description.is_some() {
            contract.description = crate::validation::clean(self.description);
        }
        if let Some(frequency) = self.frequency {
            contract.frequency = frequency;
        }
        if let Some(end_date) = self.end_date {
            contract.end_date = Some(end_date);
        }
        if let Some(status) = self.status {
            contract.status = status;
        }
        if let Some(retention) = self.log_retention {
            contract.log_retention = retention;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompleteServiceRequest {
    /// Defaults to today (UTC)
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date"))]
    pub completed_on: Option<Date>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RescheduleServiceRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date"))]
    pub new_due_date: Date,
    pub reason: Option<String>,
}

/// Result of a contract write, including the outcome of its side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ServiceContractUpdateResponse {
    pub contract: ServiceContract,
    /// Log written by complete/reschedule
    pub log: Option<ServiceLog>,
    /// Old logs deleted by retention
    pub pruned_logs: u64,
    pub calendar_synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_error: Option<String>,
}
