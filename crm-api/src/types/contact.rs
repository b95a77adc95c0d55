//! Contact API types

use crm_core::{Contact, EntityId};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::validation::{clean, HasUpdates, ValidateNonEmpty, ValidateText};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateContactRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub account_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
}

impl CreateContactRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.last_name.validate_non_empty("last_name")?;
        self.last_name.validate_max_len("last_name")?;
        self.first_name.validate_max_len("first_name")?;
        self.email.validate_email("email")?;
        self.phone.validate_max_len("phone")?;
        self.title.validate_max_len("title")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateContactRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub account_id: Option<EntityId>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub title: Option<String>,
}

impl HasUpdates for UpdateContactRequest {
    fn has_any_updates(&self) -> bool {
        self.account_id.is_some()
            || self.owner_id.is_some()
            || self.first_name.is_some()
            || self.last_name.is_some()
            || self.email.is_some()
            || self.phone.is_some()
            || self.title.is_some()
    }
}

impl UpdateContactRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.validate_has_updates()?;
        if let Some(last_name) = &self.last_name {
            last_name.validate_non_empty("last_name")?;
            last_name.validate_max_len("last_name")?;
        }
        self.first_name.validate_max_len("first_name")?;
        self.email.validate_email("email")?;
        self.phone.validate_max_len("phone")?;
        self.title.validate_max_len("title")
    }

    pub fn apply(self, contact: &mut Contact) {
        if let Some(account_id) = self.account_id {
            contact.account_id = Some(account_id);
        }
        if let Some(owner_id) = self.owner_id {
            contact.owner_id = Some(owner_id);
        }
        if self.first_name.is_some() {
            contact.first_name = clean(self.first_name);
        }
        if let Some(last_name) = self.last_name {
            contact.last_name = last_name.trim().to_string();
        }
        if self.email.is_some() {
            contact.email = clean(self.email);
        }
        if self.phone.is_some() {
            contact.phone = clean(self.phone);
        }
        if self.title.is_some() {
            contact.title = clean(self.title);
        }
    }
}
