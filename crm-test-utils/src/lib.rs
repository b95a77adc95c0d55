//! CRM Test Utilities
//!
//! Shared test infrastructure for the CRM workspace:
//! - Proptest generators for entity types and CSV input
//! - Fixtures for common scenarios
//! - Assertions over `CrmResult` errors

pub use crm_storage::{CrmStore, MemoryStore};

pub use crm_core::{
    new_entity_id, Account, Activity, ActivityType, Contact, ContractStatus, CrmError, CrmResult,
    Date, EntityId, EntityRef, EntityType, ImportError, Lead, LeadRecord, LeadStatus, Locale,
    Note, Opportunity, OpportunityStage, Profile, Role, ScheduleError, ServiceContract,
    ServiceFrequency, ServiceLog, ServiceLogKind, StorageError, TenantId, Timestamp,
    ValidationError,
};

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for CRM entity types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_uuid() -> impl Strategy<Value = EntityId> {
        any::<[u8; 16]>().prop_map(uuid::Uuid::from_bytes)
    }

    /// Dates between 2000-01-01 and roughly 2060.
    pub fn arb_date() -> impl Strategy<Value = Date> {
        (0u64..22_000).prop_map(|days| {
            let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
            base.checked_add_days(chrono::Days::new(days)).unwrap_or(base)
        })
    }

    pub fn arb_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    pub fn arb_linkable_entity_type() -> impl Strategy<Value = EntityType> {
        prop_oneof![
            Just(EntityType::Lead),
            Just(EntityType::Account),
            Just(EntityType::Contact),
            Just(EntityType::Opportunity),
            Just(EntityType::ServiceContract),
        ]
    }

    pub fn arb_entity_ref() -> impl Strategy<Value = EntityRef> {
        (arb_linkable_entity_type(), arb_uuid()).prop_map(|(t, id)| EntityRef::new(t, id))
    }

    pub fn arb_frequency() -> impl Strategy<Value = ServiceFrequency> {
        prop_oneof![
            Just(ServiceFrequency::Weekly),
            Just(ServiceFrequency::Monthly),
            Just(ServiceFrequency::Quarterly),
            Just(ServiceFrequency::SemiAnnual),
            Just(ServiceFrequency::Annual),
            (1u32..400).prop_map(ServiceFrequency::EveryDays),
        ]
    }

    /// Well-formed addresses with random case and surrounding blanks.
    pub fn arb_email() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9.]{0,10}", "[a-z]{2,10}", "(com|org|io|de)", any::<bool>(), " {0,2}")
            .prop_map(|(local, domain, tld, upper, pad)| {
                let email = format!("{}@{}.{}", local, domain, tld);
                let email = if upper { email.to_uppercase() } else { email };
                format!("{pad}{email}{pad}")
            })
    }

    /// A record that passes row validation.
    pub fn arb_valid_lead_record() -> impl Strategy<Value = LeadRecord> {
        (
            prop::option::of("[A-Z][a-z]{1,12}"),
            "[A-Z][a-z]{1,15}",
            arb_email(),
            prop::option::of("\\+?[0-9]{6,12}"),
            prop::option::of("[A-Z][a-z]{2,12}( Inc| GmbH)?"),
        )
            .prop_map(|(first_name, last_name, email, phone, company)| LeadRecord {
                first_name,
                last_name: Some(last_name),
                email: Some(email.trim().to_string()),
                phone,
                company,
                title: None,
                source: Some("csv".to_string()),
            })
    }

    /// CSV text with a header line and `rows` valid lead rows.
    pub fn arb_lead_csv(rows: std::ops::Range<usize>) -> impl Strategy<Value = String> {
        prop::collection::vec(arb_valid_lead_record(), rows).prop_map(|records| {
            let mut out = String::from("First Name,Last Name,Email,Phone,Company\n");
            for r in records {
                out.push_str(&format!(
                    "{},{},{},{},{}\n",
                    r.first_name.unwrap_or_default(),
                    r.last_name.unwrap_or_default(),
                    r.email.unwrap_or_default(),
                    r.phone.unwrap_or_default(),
                    r.company.unwrap_or_default(),
                ));
            }
            out
        })
    }

    /// An active contract with no end date, due on its start date.
    pub fn arb_service_contract() -> impl Strategy<Value = ServiceContract> {
        (arb_date(), arb_frequency(), 0i32..20).prop_map(|(start, frequency, retention)| {
            let mut contract = fixtures::service_contract(new_entity_id(), new_entity_id());
            contract.start_date = start;
            contract.end_date = None;
            contract.next_due_date = Some(start);
            contract.frequency = frequency;
            contract.log_retention = retention;
            contract
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records for common testing scenarios.

    use super::*;

    pub const SAMPLE_CSV: &str = "\
First Name,Last Name,Email,Company,Favourite Colour
Ada,Lovelace,ada@example.com,Analytical Engines,green
Grace,Hopper,GRACE@example.com ,Navy,blue
,,missing@example.com,Nobody,red
Alan,Turing,not-an-email,Bletchley,grey
Ada,Byron,ada@example.com,Duplicate Co,white
";

    pub fn tenant() -> TenantId {
        new_entity_id()
    }

    pub fn date(y: i32, m: u32, d: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
    }

    pub fn memory_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new())
    }

    pub fn profile(tenant_id: TenantId, role: Role) -> Profile {
        let now = Utc::now();
        let profile_id = new_entity_id();
        Profile {
            profile_id,
            tenant_id,
            email: format!("{}@example.com", profile_id.simple()),
            full_name: Some("Test User".to_string()),
            role,
            locale: Locale::En,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn lead(tenant_id: TenantId, owner_id: Option<EntityId>) -> Lead {
        let now = Utc::now();
        Lead {
            lead_id: new_entity_id(),
            tenant_id,
            owner_id,
            first_name: Some("Ada".to_string()),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
            company: Some("Analytical Engines".to_string()),
            title: None,
            source: Some("web".to_string()),
            status: LeadStatus::New,
            import_batch_id: None,
            converted_account_id: None,
            converted_contact_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn account(tenant_id: TenantId, name: &str) -> Account {
        let now = Utc::now();
        Account {
            account_id: new_entity_id(),
            tenant_id,
            owner_id: None,
            name: name.to_string(),
            industry: None,
            website: None,
            phone: None,
            email: None,
            billing_address: None,
            annual_revenue: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contact(tenant_id: TenantId, account_id: Option<EntityId>) -> Contact {
        let now = Utc::now();
        Contact {
            contact_id: new_entity_id(),
            tenant_id,
            owner_id: None,
            account_id,
            first_name: Some("Grace".to_string()),
            last_name: "Hopper".to_string(),
            email: Some("grace@example.com".to_string()),
            phone: None,
            title: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn opportunity(tenant_id: TenantId, account_id: Option<EntityId>) -> Opportunity {
        let now = Utc::now();
        Opportunity {
            opportunity_id: new_entity_id(),
            tenant_id,
            owner_id: None,
            account_id,
            contact_id: None,
            name: "Annual renewal".to_string(),
            stage: OpportunityStage::Prospecting,
            amount: Some(5000.0),
            probability: OpportunityStage::Prospecting.default_probability(),
            expected_close_date: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn note(tenant_id: TenantId, target: EntityRef) -> Note {
        let now = Utc::now();
        Note {
            note_id: new_entity_id(),
            tenant_id,
            author_id: None,
            entity_type: target.entity_type,
            entity_id: target.entity_id,
            body: "Called, left a message".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Monthly contract starting 2026-01-31 with a one-year term.
    pub fn service_contract(tenant_id: TenantId, account_id: EntityId) -> ServiceContract {
        let now = Utc::now();
        ServiceContract {
            contract_id: new_entity_id(),
            tenant_id,
            owner_id: None,
            account_id,
            name: "HVAC maintenance".to_string(),
            description: None,
            frequency: ServiceFrequency::Monthly,
            start_date: date(2026, 1, 31),
            end_date: Some(date(2026, 12, 31)),
            next_due_date: Some(date(2026, 1, 31)),
            last_completed_on: None,
            status: ContractStatus::Active,
            calendar_event_id: None,
            log_retention: 5,
            created_at: now,
            updated_at: now,
        }
    }

    /// A completion log created `age_secs` seconds ago.
    pub fn service_log(
        contract: &ServiceContract,
        performed_on: Date,
        age_secs: i64,
    ) -> ServiceLog {
        ServiceLog {
            log_id: new_entity_id(),
            tenant_id: contract.tenant_id,
            contract_id: contract.contract_id,
            kind: ServiceLogKind::Completed,
            performed_on,
            previous_due_date: None,
            next_due_date: None,
            notes: None,
            performed_by: None,
            created_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over CRM-specific error shapes.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &CrmResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &CrmResult<T>, entity_type: EntityType) {
        match result {
            Err(CrmError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &CrmResult<T>) {
        match result {
            Err(CrmError::Storage(StorageError::Conflict { .. })) => {}
            other => panic!("Expected Conflict error, got: {:?}", other),
        }
    }

    /// The contract's schedule fields are internally consistent.
    #[track_caller]
    pub fn assert_schedule_consistent(contract: &ServiceContract) {
        match contract.status {
            ContractStatus::Expired => assert!(
                contract.next_due_date.is_none(),
                "Expired contract still has a due date: {:?}",
                contract.next_due_date
            ),
            ContractStatus::Active => {
                if let Some(due) = contract.next_due_date {
                    assert!(due >= contract.start_date, "Due date before start");
                    if let Some(end) = contract.end_date {
                        assert!(due <= end, "Due date {} after end {}", due, end);
                    }
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_service_contract_fixture_is_consistent() {
        let contract = fixtures::service_contract(fixtures::tenant(), new_entity_id());
        assertions::assert_schedule_consistent(&contract);
        assert_eq!(contract.next_due_date, Some(contract.start_date));
    }

    #[test]
    fn test_assertion_not_found() {
        let result: CrmResult<()> = Err(CrmError::Storage(StorageError::NotFound {
            entity_type: EntityType::Lead,
            id: new_entity_id(),
        }));
        assertions::assert_not_found(&result, EntityType::Lead);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_emails_are_valid(email in generators::arb_email()) {
            prop_assert!(crm_core::import::is_valid_email(email.trim()));
        }

        #[test]
        fn prop_generated_records_pass_validation(record in generators::arb_valid_lead_record()) {
            prop_assert!(crm_core::import::validate_record(&record).is_empty());
        }
    }
}
