//! CSV lead import over HTTP: stage, inspect, confirm, discard.

use axum::http::{Method, StatusCode};
use crm_test_utils::fixtures::SAMPLE_CSV;
use serde_json::json;

#[path = "support/app.rs"]
mod app;
use app::{id, test_app};

#[tokio::test]
async fn test_stage_reports_counts_without_creating_leads() {
    let app = test_app();

    let (status, preview) = app.upload_csv(SAMPLE_CSV).await;
    assert_eq!(status, StatusCode::CREATED, "{}", preview);

    let batch = &preview["batch"];
    assert_eq!(batch["status"], "Staged");
    assert_eq!(batch["file_name"], "leads.csv");
    assert_eq!(batch["total_rows"], 5);
    assert_eq!(batch["valid_rows"], 2);
    assert_eq!(batch["invalid_rows"], 2);
    assert_eq!(batch["duplicate_rows"], 1);
    assert_eq!(batch["unmapped_columns"], json!(["Favourite Colour"]));
    assert_eq!(preview["rows"].as_array().map(Vec::len), Some(5));

    let (status, leads) = app.call(Method::GET, "/api/v1/leads", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(leads["total"], 0);
}

#[tokio::test]
async fn test_confirm_fans_out_into_leads_accounts_and_contacts() {
    let app = test_app();
    let (_, preview) = app.upload_csv(SAMPLE_CSV).await;
    let batch_id = id(&preview["batch"], "batch_id");

    let (status, report) = app
        .call(
            Method::POST,
            &format!("/api/v1/imports/{}/confirm", batch_id),
            Some(json!({ "create_accounts": true, "create_contacts": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["leads_created"], 2);
    assert_eq!(report["accounts_created"], 2);
    assert_eq!(report["contacts_created"], 2);
    assert_eq!(report["skipped_rows"], 3);
    assert_eq!(report["failures"], json!([]));

    let (_, leads) = app.call(Method::GET, "/api/v1/leads", None).await;
    assert_eq!(leads["total"], 2);
    let (_, accounts) = app.call(Method::GET, "/api/v1/accounts", None).await;
    assert_eq!(accounts["total"], 2);

    let (_, batch) = app
        .call(Method::GET, &format!("/api/v1/imports/{}", batch_id), None)
        .await;
    assert_eq!(batch["batch"]["status"], "Confirmed");

    // Applying twice must not duplicate leads
    let (status, err) = app
        .call(
            Method::POST,
            &format!("/api/v1/imports/{}/confirm", batch_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "STATE_CONFLICT");
}

#[tokio::test]
async fn test_reupload_marks_existing_emails_as_duplicates() {
    let app = test_app();
    let (_, preview) = app.upload_csv(SAMPLE_CSV).await;
    let batch_id = id(&preview["batch"], "batch_id");
    app.call(
        Method::POST,
        &format!("/api/v1/imports/{}/confirm", batch_id),
        Some(json!({})),
    )
    .await;

    let (status, second) = app.upload_csv(SAMPLE_CSV).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["batch"]["valid_rows"], 0);
    assert_eq!(second["batch"]["duplicate_rows"], 3);
}

#[tokio::test]
async fn test_discard_closes_the_batch() {
    let app = test_app();
    let (_, preview) = app.upload_csv(SAMPLE_CSV).await;
    let batch_id = id(&preview["batch"], "batch_id");

    let (status, _) = app
        .call(Method::DELETE, &format!("/api/v1/imports/{}", batch_id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, batch) = app
        .call(Method::GET, &format!("/api/v1/imports/{}", batch_id), None)
        .await;
    assert_eq!(batch["batch"]["status"], "Discarded");
    assert_eq!(batch["rows"], json!([]));

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/imports/{}/confirm", batch_id),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rejected_files() {
    let app = test_app();

    let (status, err) = app.upload_csv("").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", err);
    assert_eq!(err["code"], "IMPORT_REJECTED");

    let (status, err) = app.upload_csv("colour,size\nred,large\n").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", err);
    assert_eq!(err["details"]["headers"], json!(["colour", "size"]));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let mut config = crm_api::ApiConfig {
        rate_limit_enabled: false,
        ..crm_api::ApiConfig::default()
    };
    config.import_limits.max_bytes = 64;
    let app = app::test_app_with(config);

    let (status, err) = app.upload_csv(SAMPLE_CSV).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "{}", err);
}

#[tokio::test]
async fn test_batches_are_tenant_scoped() {
    let app = test_app();
    let (_, preview) = app.upload_csv(SAMPLE_CSV).await;
    let batch_id = id(&preview["batch"], "batch_id");

    let other = app::TestApp {
        router: app.router.clone(),
        auth: app.auth.clone(),
        store: app.store.clone(),
        tenant_id: uuid::Uuid::now_v7(),
    };
    let (status, _) = other
        .call(Method::GET, &format!("/api/v1/imports/{}", batch_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
