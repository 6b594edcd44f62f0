//! Tally: payment webhook verification and billing reconciliation service.
//!
//! Accepts signed webhooks from Paddle, JazzCash, EasyPaisa and Stripe,
//! verifies each provider's signature scheme, and keeps an append-only
//! billing ledger where entries move from `pending` to `reconciled` when
//! the provider's settlement notice arrives. A bearer-authenticated admin
//! surface exposes the ledger for inspection and manual reconciliation.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod idempotency;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod util;

use axum::Router;

use crate::db::AppState;

/// Assemble the full application router. Shared by `main` and the
/// integration tests so the two always exercise the same surface.
pub fn build_router(state: AppState, checkout_rate_limit_rpm: u32) -> Router {
    Router::new()
        .merge(handlers::health_router())
        .merge(handlers::billing::router(state.clone()))
        .merge(handlers::pay::router(checkout_rate_limit_rpm))
        .with_state(state.clone())
        .merge(handlers::webhooks::router(state))
}
