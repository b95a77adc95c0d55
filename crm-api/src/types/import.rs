//! CSV lead import API types

use crm_core::{EntityId, ImportBatch, StagedLead};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct StageImportParams {
    /// Original name of the uploaded file
    pub file_name: Option<String>,
}

/// Staged batch with every parsed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportPreviewResponse {
    pub batch: ImportBatch,
    pub rows: Vec<StagedLead>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ConfirmImportRequest {
    /// Owner of created records. Defaults to the confirming user.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub owner_id: Option<EntityId>,
    /// Find or create an account per distinct company
    #[serde(default)]
    pub create_accounts: bool,
    /// Create a contact per lead, linked to its account when there is one
    #[serde(default)]
    pub create_contacts: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportFailure {
    pub row_number: i32,
    pub reason: String,
}

/// Outcome of confirming a staged batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ImportReport {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub batch_id: EntityId,
    pub leads_created: usize,
    pub accounts_created: usize,
    pub accounts_reused: usize,
    pub contacts_created: usize,
    /// Invalid and duplicate rows left out of the import
    pub skipped_rows: usize,
    pub failures: Vec<ImportFailure>,
}
