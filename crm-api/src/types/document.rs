//! Document metadata API types

use crm_core::{Document, DocumentLink, EntityRef};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::validation::{ValidateNonEmpty, ValidateRange, ValidateText};

/// Metadata for a file already uploaded to object storage, plus the records
/// it should be attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateDocumentRequest {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    /// Hex SHA-256 of the file body
    pub checksum: Option<String>,
    #[serde(default)]
    pub links: Vec<EntityRef>,
}

impl CreateDocumentRequest {
    pub fn validate(&self) -> ApiResult<()> {
        self.file_name.validate_non_empty("file_name")?;
        self.file_name.validate_max_len("file_name")?;
        self.mime_type.validate_non_empty("mime_type")?;
        if !self.mime_type.contains('/') {
            return Err(ApiError::invalid_format("mime_type", "type/subtype"));
        }
        self.storage_path.validate_non_empty("storage_path")?;
        self.size_bytes.validate_positive("size_bytes")?;
        if let Some(checksum) = &self.checksum {
            let is_sha256 =
                checksum.len() == 64 && checksum.chars().all(|c| c.is_ascii_hexdigit());
            if !is_sha256 {
                return Err(ApiError::invalid_format("checksum", "hex SHA-256 digest"));
            }
        }
        for link in &self.links {
            validate_link_target(link)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateDocumentLinkRequest {
    pub target: EntityRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DocumentResponse {
    pub document: Document,
    pub links: Vec<DocumentLink>,
}

pub fn validate_link_target(target: &EntityRef) -> ApiResult<()> {
    if !target.entity_type.is_linkable() {
        return Err(ApiError::invalid_input(format!(
            "Records of type {} cannot have attachments",
            target.entity_type
        )));
    }
    Ok(())
}
