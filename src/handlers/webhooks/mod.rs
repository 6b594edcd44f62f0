//! Inbound webhook endpoints, one route per provider.
//!
//! Every handler follows the same shape: read the raw body, verify the
//! provider signature, suppress replays where the provider carries a stable
//! event id, then reconcile or ingest ledger entries. Handlers always
//! respond with the `WebhookResponse` envelope; a rejected signature is the
//! only 401 path.

mod common;
mod easypaisa;
mod jazzcash;
mod paddle;
mod stripe;

use axum::routing::post;
use axum::Router;

use crate::db::AppState;

pub use common::WebhookResponse;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/paddle", post(paddle::handle))
        .route("/webhook/jazzcash", post(jazzcash::handle))
        .route("/webhook/easypaisa", post(easypaisa::handle))
        .route("/webhook/stripe", post(stripe::handle))
        .with_state(state)
}
