//! Note API types

use crm_core::{EntityId, EntityRef, EntityType};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::validation::ValidateNonEmpty;

/// Maximum note body length in characters.
pub const MAX_NOTE_LEN: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateNoteRequest {
    pub entity_type: EntityType,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub entity_id: EntityId,
    pub body: String,
}

impl CreateNoteRequest {
    pub fn validate(&self) -> ApiResult<()> {
        validate_body(&self.body)
    }

    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateNoteRequest {
    pub body: String,
}

impl UpdateNoteRequest {
    pub fn validate(&self) -> ApiResult<()> {
        validate_body(&self.body)
    }
}

fn validate_body(body: &str) -> ApiResult<()> {
    body.validate_non_empty("body")?;
    if body.chars().count() > MAX_NOTE_LEN {
        return Err(crate::error::ApiError::invalid_input(format!(
            "body must be at most {} characters",
            MAX_NOTE_LEN
        )));
    }
    Ok(())
}
