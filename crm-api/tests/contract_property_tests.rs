//! Property-Based Tests for Service-Contract Scheduling
//!
//! For any frequency, start date and retention, completing each visit on its
//! due date keeps the schedule consistent and the log within retention. An
//! expired contract accepts no further completions.

use axum::http::{Method, StatusCode};
use chrono::Days;
use crm_core::{ContractStatus, ServiceContract};
use crm_test_utils::{assertions::assert_schedule_consistent, generators::arb_service_contract};
use proptest::prelude::*;
use serde_json::{json, Value};
use tokio::runtime::Runtime;

#[path = "support/app.rs"]
mod app;
use app::{id, test_app};

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn contract_from(value: &Value) -> Result<ServiceContract, TestCaseError> {
    serde_json::from_value(value.clone())
        .map_err(|e| TestCaseError::fail(format!("Invalid contract {}: {}", value, e)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_completions_keep_schedule_consistent(template in arb_service_contract()) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let app = test_app();
            let (status, account) = app
                .call(Method::POST, "/api/v1/accounts", Some(json!({ "name": "Acme" })))
                .await;
            prop_assert_eq!(status, StatusCode::CREATED, "{}", account);

            let retention = template.log_retention.clamp(1, 10);
            let end_date = template
                .start_date
                .checked_add_days(Days::new(400))
                .unwrap_or(template.start_date);
            let (status, created) = app
                .call(
                    Method::POST,
                    "/api/v1/service-contracts",
                    Some(json!({
                        "account_id": account["account_id"],
                        "name": "Generated contract",
                        "frequency": template.frequency,
                        "start_date": template.start_date,
                        "end_date": end_date,
                        "log_retention": retention
                    })),
                )
                .await;
            prop_assert_eq!(status, StatusCode::CREATED, "{}", created);
            let mut contract = contract_from(&created["contract"])?;
            assert_schedule_consistent(&contract);
            let contract_id = id(&created["contract"], "contract_id");

            for _ in 0..8 {
                let Some(due) = contract.next_due_date else { break };
                let (status, updated) = app
                    .call(
                        Method::POST,
                        &format!("/api/v1/service-contracts/{}/complete", contract_id),
                        Some(json!({ "completed_on": due })),
                    )
                    .await;
                prop_assert_eq!(status, StatusCode::OK, "{}", updated);
                let next = contract_from(&updated["contract"])?;
                assert_schedule_consistent(&next);
                prop_assert_eq!(next.last_completed_on, Some(due));
                if let Some(next_due) = next.next_due_date {
                    prop_assert!(next_due > due);
                }
                contract = next;
            }

            let (status, logs) = app
                .call(
                    Method::GET,
                    &format!("/api/v1/service-contracts/{}/logs", contract_id),
                    None,
                )
                .await;
            prop_assert_eq!(status, StatusCode::OK);
            let kept = logs.as_array().map(Vec::len).unwrap_or_default();
            prop_assert!(kept <= retention as usize);

            if contract.status == ContractStatus::Expired {
                let (status, _) = app
                    .call(
                        Method::POST,
                        &format!("/api/v1/service-contracts/{}/complete", contract_id),
                        Some(json!({ "completed_on": end_date })),
                    )
                    .await;
                prop_assert_eq!(status, StatusCode::CONFLICT);
            }
            Ok(())
        })?;
    }
}
