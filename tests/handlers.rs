//! HTTP surface tests: admin auth, ingest, list, reconcile, patch

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;

fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", key));
    }
    builder.body(Body::empty()).expect("failed to build request")
}

// ============ Admin Authentication ============

#[tokio::test]
async fn admin_endpoint_without_token_is_401() {
    let (app, _) = test_app();
    let response = send(&app, get_request("/billing/entries", None)).await;
    assert_status(&response, StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(false));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn admin_endpoint_with_wrong_token_is_403() {
    let (app, _) = test_app();
    let response = send(&app, get_request("/billing/entries", Some("wrong-key"))).await;
    assert_status(&response, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_endpoint_with_valid_token_is_200() {
    let (app, _) = test_app();
    let response = send(&app, get_request("/billing/entries", Some(TEST_ADMIN_KEY))).await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert!(body["entries"].is_array());
}

#[tokio::test]
async fn admin_endpoints_are_open_when_no_key_configured() {
    let (app, _) = unconfigured_app();
    let response = send(&app, get_request("/billing/entries", None)).await;
    assert_status(&response, StatusCode::OK);
}

// ============ Ingest ============

#[tokio::test]
async fn ingest_creates_pending_entry() {
    let (app, state) = test_app();
    let response = send(
        &app,
        json_request(
            "POST",
            "/billing/ingest",
            json!({
                "provider": "Paddle",
                "provider_tx_id": "order-1",
                "amount": 29.99,
                "currency": "USD"
            }),
        ),
    )
    .await;
    assert_status(&response, StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["entry"]["provider"], json!("paddle"));
    assert_eq!(body["entry"]["status"], json!("pending"));
    assert_eq!(body["entry"]["type"], json!("charge"));

    let entries = state.ledger.list_entries(10).expect("ledger read failed");
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn ingest_without_provider_is_400() {
    let (app, _) = test_app();
    let response = send(
        &app,
        json_request("POST", "/billing/ingest", json!({"provider": "  ", "amount": 1.0})),
    )
    .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ingest_with_negative_amount_is_400() {
    let (app, _) = test_app();
    let response = send(
        &app,
        json_request(
            "POST",
            "/billing/ingest",
            json!({"provider": "stripe", "amount": -5.0}),
        ),
    )
    .await;
    assert_status(&response, StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(false));
}

// ============ List ============

#[tokio::test]
async fn list_respects_limit_and_clamps() {
    let (app, state) = test_app();
    for i in 0..5 {
        seed_pending(state.ledger.as_ref(), "stripe", &format!("tx-{}", i), 1.0);
    }

    let response = send(
        &app,
        get_request("/billing/entries?limit=2", Some(TEST_ADMIN_KEY)),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);

    // limit=0 clamps to 1 rather than erroring.
    let response = send(
        &app,
        get_request("/billing/entries?limit=0", Some(TEST_ADMIN_KEY)),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
}

// ============ Manual Reconcile ============

#[tokio::test]
async fn reconcile_single_tx_id() {
    let (app, state) = test_app();
    seed_pending(state.ledger.as_ref(), "jazzcash", "T1", 10.0);

    let response = send(
        &app,
        authed_json_request(
            "POST",
            "/billing/reconcile",
            json!({"provider": "JazzCash", "provider_tx_id": "T1"}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["updated"].as_array().unwrap().len(), 1);
    assert_eq!(body["updated"][0]["status"], json!("reconciled"));
}

#[tokio::test]
async fn reconcile_batch_skips_unmatched_ids() {
    let (app, state) = test_app();
    seed_pending(state.ledger.as_ref(), "paddle", "a1", 1.0);
    seed_pending(state.ledger.as_ref(), "paddle", "b2", 2.0);

    let response = send(
        &app,
        authed_json_request(
            "POST",
            "/billing/reconcile",
            json!({"provider": "paddle", "provider_tx_ids": ["a1", "nope", "b2"]}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["updated"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn reconcile_zero_matches_is_success() {
    let (app, _) = test_app();
    let response = send(
        &app,
        authed_json_request(
            "POST",
            "/billing/reconcile",
            json!({"provider": "stripe", "provider_tx_id": "never-seen"}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["updated"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn reconcile_without_provider_is_400() {
    let (app, _) = test_app();
    let response = send(
        &app,
        authed_json_request(
            "POST",
            "/billing/reconcile",
            json!({"provider_tx_id": "T1"}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reconcile_without_any_tx_id_is_400() {
    let (app, _) = test_app();
    let response = send(
        &app,
        authed_json_request(
            "POST",
            "/billing/reconcile",
            json!({"provider": "stripe", "provider_tx_ids": []}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reconcile_requires_admin() {
    let (app, _) = test_app();
    let response = send(
        &app,
        json_request(
            "POST",
            "/billing/reconcile",
            json!({"provider": "stripe", "provider_tx_id": "T1"}),
        ),
    )
    .await;
    assert_status(&response, StatusCode::UNAUTHORIZED);
}

// ============ Patch ============

#[tokio::test]
async fn patch_updates_entry() {
    let (app, state) = test_app();
    let entry = seed_pending(state.ledger.as_ref(), "stripe", "tx-1", 100.0);

    let response = send(
        &app,
        authed_json_request(
            "PATCH",
            &format!("/billing/entry/{}", entry.id),
            json!({"allocated_to": "user-7", "status": "reconciled"}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["updated"]["allocated_to"], json!("user-7"));
    assert_eq!(body["updated"]["status"], json!("reconciled"));
}

#[tokio::test]
async fn patch_unknown_id_is_404() {
    let (app, _) = test_app();
    let response = send(
        &app,
        authed_json_request(
            "PATCH",
            "/billing/entry/ty_ent_00000000000000000000000000000000",
            json!({"amount": 1.0}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_malformed_id_is_404_without_touching_store() {
    let (app, _) = test_app();
    let response = send(
        &app,
        authed_json_request(
            "PATCH",
            "/billing/entry/not-an-id",
            json!({"amount": 1.0}),
            TEST_ADMIN_KEY,
        ),
    )
    .await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

// ============ Health ============

#[tokio::test]
async fn health_is_open_and_ok() {
    let (app, _) = test_app();
    let response = send(&app, get_request("/health", None)).await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], json!("ok"));
}
