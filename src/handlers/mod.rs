pub mod billing;
pub mod pay;
pub mod webhooks;

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
