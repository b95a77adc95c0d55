//! Service-contract workflow over HTTP: complete, reschedule, retention,
//! expiry and the audit trail they leave.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

#[path = "support/app.rs"]
mod app;
use app::{id, test_app, TestApp};

async fn create_account(app: &TestApp) -> Value {
    let (status, account) = app
        .call(Method::POST, "/api/v1/accounts", Some(json!({ "name": "Acme Facilities" })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", account);
    account
}

async fn create_contract(app: &TestApp, body: Value) -> Value {
    let (status, created) = app
        .call(Method::POST, "/api/v1/service-contracts", Some(body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    created["contract"].clone()
}

async fn complete(app: &TestApp, contract_id: uuid::Uuid, on: &str) -> (StatusCode, Value) {
    app.call(
        Method::POST,
        &format!("/api/v1/service-contracts/{}/complete", contract_id),
        Some(json!({ "completed_on": on })),
    )
    .await
}

#[tokio::test]
async fn test_completion_advances_prunes_and_expires() {
    let app = test_app();
    let account = create_account(&app).await;
    let contract = create_contract(
        &app,
        json!({
            "account_id": account["account_id"],
            "name": "HVAC maintenance",
            "frequency": "Monthly",
            "start_date": "2026-01-31",
            "end_date": "2026-04-30",
            "log_retention": 2
        }),
    )
    .await;
    assert_eq!(contract["next_due_date"], "2026-01-31");
    let contract_id = id(&contract, "contract_id");

    // Month-end clamps into February
    let (status, first) = complete(&app, contract_id, "2026-01-31").await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["contract"]["next_due_date"], "2026-02-28");
    assert_eq!(first["contract"]["last_completed_on"], "2026-01-31");
    assert_eq!(first["log"]["kind"], "Completed");
    assert_eq!(first["log"]["previous_due_date"], "2026-01-31");
    assert_eq!(first["pruned_logs"], 0);
    assert_eq!(first["calendar_synced"], false);

    let (_, second) = complete(&app, contract_id, "2026-02-28").await;
    assert_eq!(second["contract"]["next_due_date"], "2026-03-28");

    let (_, third) = complete(&app, contract_id, "2026-03-28").await;
    assert_eq!(third["pruned_logs"], 1);

    let (status, logs) = app
        .call(
            Method::GET,
            &format!("/api/v1/service-contracts/{}/logs", contract_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().cloned().unwrap_or_default();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["performed_on"], "2026-03-28");

    // Next visit would land past the end date
    let (_, last) = complete(&app, contract_id, "2026-04-28").await;
    assert_eq!(last["contract"]["status"], "Expired");
    assert_eq!(last["contract"]["next_due_date"], Value::Null);

    let (status, err) = complete(&app, contract_id, "2026-04-29").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "STATE_CONFLICT");
}

#[tokio::test]
async fn test_reschedule_stays_inside_the_term() {
    let app = test_app();
    let account = create_account(&app).await;
    let contract = create_contract(
        &app,
        json!({
            "account_id": account["account_id"],
            "name": "Elevator inspection",
            "frequency": { "EveryDays": 14 },
            "start_date": "2026-03-01",
            "end_date": "2026-12-31"
        }),
    )
    .await;
    let contract_id = id(&contract, "contract_id");
    let uri = format!("/api/v1/service-contracts/{}/reschedule", contract_id);

    let (status, moved) = app
        .call(
            Method::POST,
            &uri,
            Some(json!({ "new_due_date": "2026-03-10", "reason": "Tenant away" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", moved);
    assert_eq!(moved["contract"]["next_due_date"], "2026-03-10");
    assert_eq!(moved["log"]["kind"], "Rescheduled");
    assert_eq!(moved["log"]["notes"], "Tenant away");

    let (status, err) = app
        .call(Method::POST, &uri, Some(json!({ "new_due_date": "2027-01-05" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["code"], "INVALID_RANGE");

    let (status, _) = app
        .call(Method::POST, &uri, Some(json!({ "new_due_date": "2026-02-01" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_schedule_changes_are_audited() {
    let app = test_app();
    let account = create_account(&app).await;
    let contract = create_contract(
        &app,
        json!({
            "account_id": account["account_id"],
            "name": "Boiler service",
            "frequency": "Annual",
            "start_date": "2026-01-01"
        }),
    )
    .await;
    let contract_id = id(&contract, "contract_id");
    complete(&app, contract_id, "2026-01-15").await;

    let (status, audit) = app
        .call(
            Method::GET,
            &format!(
                "/api/v1/audit?entity_type=ServiceContract&entity_id={}",
                contract_id
            ),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", audit);
    let actions: Vec<&str> = audit["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|e| e["action"].as_str()).collect())
        .unwrap_or_default();
    assert!(actions.contains(&"Create"), "{:?}", actions);
    assert!(actions.contains(&"Complete"), "{:?}", actions);
}

#[tokio::test]
async fn test_contract_requires_existing_account() {
    let app = test_app();
    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/service-contracts",
            Some(json!({
                "account_id": uuid::Uuid::now_v7(),
                "name": "Orphan",
                "frequency": "Weekly",
                "start_date": "2026-01-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_terms_are_rejected() {
    let app = test_app();
    let account = create_account(&app).await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/service-contracts",
            Some(json!({
                "account_id": account["account_id"],
                "name": "Backwards",
                "frequency": "Weekly",
                "start_date": "2026-06-01",
                "end_date": "2026-01-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/service-contracts",
            Some(json!({
                "account_id": account["account_id"],
                "name": "Never",
                "frequency": { "EveryDays": 0 },
                "start_date": "2026-06-01"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_removes_contract_and_logs() {
    let app = test_app();
    let account = create_account(&app).await;
    let contract = create_contract(
        &app,
        json!({
            "account_id": account["account_id"],
            "name": "Roof check",
            "frequency": "Quarterly",
            "start_date": "2026-01-01"
        }),
    )
    .await;
    let contract_id = id(&contract, "contract_id");
    complete(&app, contract_id, "2026-01-02").await;

    let uri = format!("/api/v1/service-contracts/{}", contract_id);
    let (status, _) = app.call(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
