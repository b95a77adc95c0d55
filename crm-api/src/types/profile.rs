//! Profile API types

use crm_core::{EntityId, Locale, Role};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::validation::{HasUpdates, ValidateText};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateProfileRequest {
    /// Id used as the JWT `sub` of this user. Generated when absent.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub profile_id: Option<EntityId>,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub locale: Locale,
}

impl CreateProfileRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.email.validate_email("email")?;
        self.full_name.validate_max_len("full_name")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub locale: Option<Locale>,
}

impl HasUpdates for UpdateProfileRequest {
    fn has_any_updates(&self) -> bool {
        self.full_name.is_some() || self.role.is_some() || self.locale.is_some()
    }
}
