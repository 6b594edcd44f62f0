use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::post, Router};
use serde::{Deserialize, Serialize};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::payments::{CheckoutRequest, CheckoutResult, PaymentProvider};

/// Rate-limited: checkout creation calls out to provider APIs.
pub fn router(requests_per_minute: u32) -> Router<AppState> {
    let period_secs = (60 / requests_per_minute.max(1) as u64).max(1);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs))
        .burst_size(requests_per_minute)
        .finish()
        .expect("Failed to build rate limiter config");

    Router::new()
        .route("/pay/checkout", post(create_checkout))
        .layer(GovernorLayer::new(Arc::new(config)))
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutBody {
    provider: String,
    #[serde(flatten)]
    request: CheckoutRequest,
}

#[derive(Serialize)]
struct CheckoutResponse {
    ok: bool,
    checkout: CheckoutResult,
}

/// POST /pay/checkout
///
/// Builds a hosted-checkout redirect or a signed form-post descriptor for
/// the requested provider. With no credentials configured the adapters
/// return a deterministic sandbox result (except Stripe, which has no
/// sandbox path).
async fn create_checkout(
    State(state): State<AppState>,
    Json(body): Json<CreateCheckoutBody>,
) -> Result<Json<CheckoutResponse>> {
    let provider = PaymentProvider::from_str(&body.provider)
        .ok_or_else(|| AppError::BadRequest(msg::UNKNOWN_PROVIDER.into()))?;

    if body.request.return_url.trim().is_empty() {
        return Err(AppError::BadRequest("Field 'return_url' is required".into()));
    }

    let checkout = state.providers.create_payment(provider, &body.request).await?;
    tracing::info!(
        provider = provider.as_str(),
        tx_id = checkout.tx_id(),
        "checkout created"
    );

    Ok(Json(CheckoutResponse { ok: true, checkout }))
}
