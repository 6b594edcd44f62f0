//! Test utilities and fixtures for Tally integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub use tally::config::{
    Config, EasyPaisaCredentials, JazzCashCredentials, PaddleCredentials, StripeCredentials,
};
pub use tally::db::AppState;
pub use tally::idempotency::IdempotencyGuard;
pub use tally::ledger::{LedgerStore, MemoryLedger};
pub use tally::models::*;
pub use tally::payments::Providers;

/// Shared-secret salt used by the HMAC test vectors.
pub const TEST_SALT: &str = "by8u28y09v";
pub const TEST_STRIPE_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// Config with every provider's verification material set, pointing at
/// nothing: outbound calls are never made from tests.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: None,
        admin_api_key: Some(TEST_ADMIN_KEY.to_string()),
        http_timeout_secs: 5,
        checkout_rate_limit_rpm: 1000,
        dev_mode: true,
        jazzcash: JazzCashCredentials {
            merchant_id: Some("MC10000".to_string()),
            password: Some("password".to_string()),
            integrity_salt: Some(TEST_SALT.to_string()),
            endpoint: None,
        },
        easypaisa: EasyPaisaCredentials {
            store_id: Some("store-1".to_string()),
            hash_key: Some(TEST_SALT.to_string()),
            endpoint: None,
        },
        paddle: PaddleCredentials::default(),
        stripe: StripeCredentials {
            secret_key: None,
            webhook_secret: Some(TEST_STRIPE_WEBHOOK_SECRET.to_string()),
        },
    }
}

/// Config with no credentials at all: exercises sandbox checkouts and
/// unverified webhook pass-through.
pub fn unconfigured_config() -> Config {
    Config {
        admin_api_key: None,
        jazzcash: JazzCashCredentials::default(),
        easypaisa: EasyPaisaCredentials::default(),
        paddle: PaddleCredentials::default(),
        stripe: StripeCredentials::default(),
        ..test_config()
    }
}

pub fn test_state(config: &Config) -> AppState {
    AppState {
        ledger: Arc::new(MemoryLedger::new()),
        providers: Arc::new(Providers::from_config(config).expect("Failed to build providers")),
        guard: Arc::new(IdempotencyGuard::new()),
        admin_api_key: config.admin_api_key.clone(),
    }
}

/// Full application with the in-memory ledger and test credentials.
pub fn test_app() -> (Router, AppState) {
    let config = test_config();
    let state = test_state(&config);
    (
        tally::build_router(state.clone(), config.checkout_rate_limit_rpm),
        state,
    )
}

/// Application with nothing configured (open admin, sandbox providers).
pub fn unconfigured_app() -> (Router, AppState) {
    let config = unconfigured_config();
    let state = test_state(&config);
    (
        tally::build_router(state.clone(), config.checkout_rate_limit_rpm),
        state,
    )
}

/// Send one request through the router. A peer address is attached so
/// IP-keyed rate limiting resolves in tests the way it does behind
/// `into_make_service_with_connect_info`.
pub async fn send(app: &Router, mut request: Request<Body>) -> Response<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    app.clone().oneshot(request).await.expect("request failed")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub fn authed_json_request(
    method: &str,
    uri: &str,
    body: serde_json::Value,
    bearer: &str,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", bearer))
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is not valid JSON")
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

/// Ingest a pending entry straight into the ledger, bypassing HTTP.
pub fn seed_pending(
    ledger: &dyn LedgerStore,
    provider: &str,
    tx_id: &str,
    amount: f64,
) -> BillingEntry {
    ledger
        .create_entry(CreateBillingEntry {
            provider: provider.to_string(),
            provider_tx_id: Some(tx_id.to_string()),
            entry_type: Some(EntryType::Charge),
            amount: Some(amount),
            currency: Some("USD".to_string()),
            status: Some(EntryStatus::Pending),
            ..Default::default()
        })
        .expect("Failed to seed entry")
}
