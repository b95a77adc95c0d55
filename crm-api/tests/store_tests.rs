//! Store contract tests over `MemoryStore`: conflicts, missing rows and
//! tenant isolation as seen through the `CrmStore` trait.

use crm_core::{EntityRef, EntityType, Role};
use crm_test_utils::{
    assertions::{assert_conflict, assert_not_found, assert_ok},
    fixtures, generators, CrmStore,
};
use proptest::prelude::*;
use tokio::runtime::Runtime;

#[tokio::test]
async fn test_duplicate_insert_is_a_conflict() {
    let store = fixtures::memory_store();
    let tenant_id = fixtures::tenant();
    let profile = fixtures::profile(tenant_id, Role::SalesRep);

    assert_ok(&store.profile_insert(&profile).await);
    assert_conflict(&store.profile_insert(&profile).await);
}

#[tokio::test]
async fn test_updates_to_missing_rows_are_not_found() {
    let store = fixtures::memory_store();
    let tenant_id = fixtures::tenant();

    let contact = fixtures::contact(tenant_id, None);
    assert_not_found(&store.contact_update(&contact).await, EntityType::Contact);

    let opportunity = fixtures::opportunity(tenant_id, None);
    assert_not_found(
        &store.opportunity_update(&opportunity).await,
        EntityType::Opportunity,
    );
}

#[tokio::test]
async fn test_rows_are_invisible_to_other_tenants() {
    let store = fixtures::memory_store();
    let tenant_id = fixtures::tenant();
    let contact = fixtures::contact(tenant_id, None);
    assert_ok(&store.contact_insert(&contact).await);

    let target = EntityRef::new(EntityType::Contact, contact.contact_id);
    let note = fixtures::note(tenant_id, target);
    assert_ok(&store.note_insert(&note).await);

    let other = fixtures::tenant();
    assert_eq!(store.entity_exists(target, tenant_id).await.ok(), Some(true));
    assert_eq!(store.entity_exists(target, other).await.ok(), Some(false));
    assert_eq!(store.note_get(note.note_id, other).await.ok(), Some(None));

    let mut foreign = note.clone();
    foreign.tenant_id = other;
    assert_not_found(&store.note_update(&foreign).await, EntityType::Note);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_unknown_targets_never_exist(
        target in generators::arb_entity_ref(),
        role in generators::arb_role(),
    ) {
        let rt = Runtime::new()
            .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))?;
        rt.block_on(async {
            let store = fixtures::memory_store();
            let tenant_id = fixtures::tenant();
            let profile = fixtures::profile(tenant_id, role);
            prop_assert!(store.profile_insert(&profile).await.is_ok());

            let exists = store
                .entity_exists(target, tenant_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(!exists);
            Ok(())
        })?;
    }
}
