//! OpenAPI document for the CRM API
//!
//! Served at `/openapi.json` and written to stdout by the
//! `generate-openapi` binary.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{
    accounts, activities, audit, contacts, documents, health, i18n, imports, leads, notes,
    opportunities, profiles, service_contracts,
};
use crate::types::*;

use crm_core::{
    Account, Activity, ActivityType, AuditAction, AuditLog, Contact, ContractStatus, Document,
    DocumentLink, EntityRef, EntityType, ImportBatch, ImportStatus, Lead, LeadRecord, LeadStatus,
    Locale, Note, Opportunity, OpportunityStage, Profile, Role, ServiceContract, ServiceFrequency,
    ServiceLog, ServiceLogKind, StagedLead, StagedRowStatus,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CRM API",
        version = "0.1.0",
        description = "Multi-tenant CRM: leads, accounts, contacts, opportunities, activities, documents and service contracts",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Profiles", description = "Users of a tenant and their roles"),
        (name = "Leads", description = "Prospects and lead conversion"),
        (name = "Accounts", description = "Customer organizations"),
        (name = "Contacts", description = "People at accounts"),
        (name = "Opportunities", description = "Sales pipeline"),
        (name = "Activities", description = "Calls, emails, meetings and tasks"),
        (name = "Notes", description = "Free-text notes on records"),
        (name = "Documents", description = "Document metadata and attachments"),
        (name = "Service Contracts", description = "Recurring service schedules"),
        (name = "Imports", description = "Staged CSV lead import"),
        (name = "Audit", description = "Change history"),
        (name = "I18n", description = "UI string catalogs"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        profiles::get_me,
        profiles::create_profile,
        profiles::list_profiles,
        profiles::get_profile,
        profiles::update_profile,

        leads::create_lead,
        leads::list_leads,
        leads::get_lead,
        leads::update_lead,
        leads::delete_lead,
        leads::convert_lead,

        accounts::create_account,
        accounts::list_accounts,
        accounts::get_account,
        accounts::update_account,
        accounts::delete_account,

        contacts::create_contact,
        contacts::list_contacts,
        contacts::get_contact,
        contacts::update_contact,
        contacts::delete_contact,

        opportunities::create_opportunity,
        opportunities::list_opportunities,
        opportunities::get_opportunity,
        opportunities::update_opportunity,
        opportunities::delete_opportunity,

        activities::create_activity,
        activities::list_activities,
        activities::get_activity,
        activities::update_activity,
        activities::delete_activity,

        notes::create_note,
        notes::list_notes,
        notes::get_note,
        notes::update_note,
        notes::delete_note,

        documents::create_document,
        documents::list_documents,
        documents::get_document,
        documents::list_document_links,
        documents::create_document_link,
        documents::delete_document,

        service_contracts::create_contract,
        service_contracts::list_contracts,
        service_contracts::get_contract,
        service_contracts::update_contract,
        service_contracts::delete_contract,
        service_contracts::complete_service,
        service_contracts::reschedule_service,
        service_contracts::list_service_logs,

        imports::stage_import,
        imports::get_import,
        imports::confirm_import,
        imports::discard_import,

        audit::list_audit,
        i18n::get_catalog,

        health::ping,
        health::liveness,
        health::readiness,
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,

            CreateProfileRequest, UpdateProfileRequest,
            CreateLeadRequest, UpdateLeadRequest, ConvertLeadRequest, ConvertLeadResponse,
            CreateAccountRequest, UpdateAccountRequest,
            CreateContactRequest, UpdateContactRequest,
            CreateOpportunityRequest, UpdateOpportunityRequest,
            CreateActivityRequest, UpdateActivityRequest,
            CreateNoteRequest, UpdateNoteRequest,
            CreateDocumentRequest, CreateDocumentLinkRequest, DocumentResponse,
            CreateServiceContractRequest, UpdateServiceContractRequest,
            CompleteServiceRequest, RescheduleServiceRequest, ServiceContractUpdateResponse,
            ImportPreviewResponse, ConfirmImportRequest, ImportReport, ImportFailure,

            Profile, Lead, Account, Contact, Opportunity, Activity, Note,
            Document, DocumentLink, AuditLog, ServiceContract, ServiceLog,
            ImportBatch, StagedLead, LeadRecord, EntityRef,

            EntityType, Role, Locale, LeadStatus, OpportunityStage, ActivityType,
            AuditAction, ContractStatus, ServiceLogKind, ServiceFrequency,
            ImportStatus, StagedRowStatus
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "CRM API");

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("api_key"));
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ServiceContract"));
        Ok(())
    }

    #[test]
    fn test_openapi_lists_workflow_paths() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| format!("Generated JSON invalid: {}", e))?;

        let paths = value["paths"]
            .as_object()
            .ok_or_else(|| "paths missing".to_string())?;
        for path in [
            "/api/v1/imports/leads",
            "/api/v1/imports/{id}/confirm",
            "/api/v1/service-contracts/{id}/complete",
            "/api/v1/service-contracts/{id}/reschedule",
            "/api/v1/leads/{id}/convert",
        ] {
            assert!(paths.contains_key(path), "missing path {}", path);
        }
        Ok(())
    }

    #[test]
    fn test_id_and_time_fields_are_typed_strings() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| format!("Generated JSON invalid: {}", e))?;

        let contract = &value["components"]["schemas"]["ServiceContract"]["properties"];
        assert_eq!(contract["contract_id"]["type"], "string");
        assert_eq!(contract["contract_id"]["format"], "uuid");
        assert_eq!(contract["created_at"]["format"], "date-time");
        assert_eq!(contract["start_date"]["format"], "date");
        Ok(())
    }
}
