//! Property-Based Tests for CSV Lead Import
//!
//! For any CSV of well-formed lead rows:
//! - staging classifies every row exactly once
//! - confirming creates one lead per valid row and no two leads share an email
//! - uploading the same file again stages nothing new

use std::collections::HashSet;

use axum::http::{Method, StatusCode};
use crm_core::import::normalize_email;
use crm_test_utils::generators::arb_lead_csv;
use proptest::prelude::*;
use serde_json::{json, Value};
use tokio::runtime::Runtime;

#[path = "support/app.rs"]
mod app;
use app::{id, test_app};

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn count(value: &Value, field: &str) -> u64 {
    value[field].as_u64().unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_confirm_never_duplicates_emails(csv in arb_lead_csv(1..12)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let app = test_app();

            let (status, preview) = app.upload_csv(&csv).await;
            prop_assert_eq!(status, StatusCode::CREATED, "{}", preview);
            let batch = &preview["batch"];
            let total = count(batch, "total_rows");
            prop_assert_eq!(total, (csv.lines().count() - 1) as u64);
            let classified = count(batch, "valid_rows")
                + count(batch, "invalid_rows")
                + count(batch, "duplicate_rows");
            prop_assert_eq!(classified, total);

            let distinct: HashSet<String> = csv
                .lines()
                .skip(1)
                .filter_map(|line| line.split(',').nth(2))
                .map(normalize_email)
                .collect();
            let valid = count(batch, "valid_rows");
            prop_assert!(valid <= distinct.len() as u64);

            let batch_id = id(batch, "batch_id");
            let (status, report) = app
                .call(
                    Method::POST,
                    &format!("/api/v1/imports/{}/confirm", batch_id),
                    Some(json!({})),
                )
                .await;
            prop_assert_eq!(status, StatusCode::OK, "{}", report);
            prop_assert_eq!(count(&report, "leads_created"), valid);

            let (_, leads) = app.call(Method::GET, "/api/v1/leads?limit=100", None).await;
            let items = leads["items"].as_array().cloned().unwrap_or_default();
            prop_assert_eq!(items.len() as u64, valid);
            let emails: HashSet<String> = items
                .iter()
                .filter_map(|lead| lead["email"].as_str())
                .map(normalize_email)
                .collect();
            prop_assert_eq!(emails.len(), items.len());
            prop_assert!(emails.is_subset(&distinct));

            let (status, again) = app.upload_csv(&csv).await;
            prop_assert_eq!(status, StatusCode::CREATED, "{}", again);
            prop_assert_eq!(count(&again["batch"], "valid_rows"), 0);
            Ok(())
        })?;
    }
}
