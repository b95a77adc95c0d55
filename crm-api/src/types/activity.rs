//! Activity API types

use crm_core::{ActivityType, EntityId, EntityRef, EntityType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::validation::{HasUpdates, ValidateNonEmpty, ValidateText};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateActivityRequest {
    pub activity_type: ActivityType,
    pub subject: String,
    pub description: Option<String>,
    pub entity_type: EntityType,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub entity_id: EntityId,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub due_at: Option<Timestamp>,
}

impl CreateActivityRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.subject.validate_non_empty("subject")?;
        self.subject.validate_max_len("subject")
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateActivityRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub due_at: Option<Timestamp>,
    /// `true` stamps `completed_at`, `false` clears it
    pub completed: Option<bool>,
}

impl HasUpdates for UpdateActivityRequest {
    fn has_any_updates(&self) -> bool {
        self.subject.is_some()
            || self.description.is_some()
            || self.owner_id.is_some()
            || self.due_at.is_some()
            || self.completed.is_some()
    }
}

impl UpdateActivityRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.validate_has_updates()?;
        if let Some(subject) = &self.subject {
            subject.validate_non_empty("subject")?;
            subject.validate_max_len("subject")?;
        }
        Ok(())
    }
}

/// Optional target filter for activity and document listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct TargetQuery {
    pub entity_type: Option<EntityType>,
    #[cfg_attr(feature = "openapi", param(value_type = Option<String>, format = "uuid"))]
    pub entity_id: Option<EntityId>,
}

impl TargetQuery {
    /// Both halves or neither.
    pub fn target(&self) -> ApiResult<Option<EntityRef>> {
        match (self.entity_type, self.entity_id) {
            (Some(entity_type), Some(entity_id)) => {
                Ok(Some(EntityRef::new(entity_type, entity_id)))
            }
            (None, None) => Ok(None),
            _ => Err(ApiError::invalid_input(
                "entity_type and entity_id must be given together",
            )),
        }
    }

    pub fn require_target(&self) -> ApiResult<EntityRef> {
        self.target()?
            .ok_or_else(|| ApiError::missing_field("entity_type and entity_id"))
    }
}
