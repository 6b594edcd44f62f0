use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::config::StripeCredentials;
use crate::error::{AppError, Result};
use crate::util::constant_time_eq;

use super::{
    CheckoutRequest, CheckoutResult, PaymentProvider, RejectReason, VerifyOutcome, WebhookVerifier,
};

type HmacSha256 = Hmac<Sha256>;

const CHECKOUT_SESSIONS_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Header carrying the Stripe webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

/// Stripe adapter. Hosted checkout sessions outbound; `t=...,v1=...`
/// HMAC-SHA256 signature headers inbound, with a timestamp tolerance to
/// reject replays.
///
/// Checkout creation has no sandbox path: without a secret key it is a
/// configuration error rather than a synthetic redirect.
#[derive(Debug, Clone)]
pub struct StripeClient {
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    client: Client,
}

impl StripeClient {
    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn new(credentials: &StripeCredentials, client: Client) -> Self {
        Self {
            secret_key: credentials.secret_key.clone(),
            webhook_secret: credentials.webhook_secret.clone(),
            client,
        }
    }

    pub async fn create_payment(&self, request: &CheckoutRequest) -> Result<CheckoutResult> {
        let Some(secret_key) = &self.secret_key else {
            return Err(AppError::ConfigurationMissing(
                "STRIPE_SECRET_KEY is required to create Stripe checkouts".into(),
            ));
        };

        // Stripe takes minor units.
        let amount_minor = request.amount.round() as i64;
        let description = request
            .description
            .clone()
            .unwrap_or_else(|| "Payment".into());

        let response = self
            .client
            .post(CHECKOUT_SESSIONS_URL)
            .basic_auth(secret_key, None::<&str>)
            .form(&[
                ("mode", "payment"),
                ("success_url", request.return_url.as_str()),
                ("cancel_url", request.return_url.as_str()),
                ("customer_email", request.payer.as_str()),
                ("line_items[0][price_data][currency]", "usd"),
                (
                    "line_items[0][price_data][unit_amount]",
                    &amount_minor.to_string(),
                ),
                (
                    "line_items[0][price_data][product_data][name]",
                    description.as_str(),
                ),
                ("line_items[0][quantity]", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("Stripe API error: {}", error_text)));
        }

        let session: CreateCheckoutSessionResponse = response.json().await?;

        Ok(CheckoutResult::Redirect {
            checkout_url: session.url,
            tx_id: session.id,
        })
    }

    fn verify_signature_header(&self, secret: &str, payload: &[u8], signature: &str) -> VerifyOutcome {
        // Stripe signature format: t=timestamp,v1=signature
        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in signature.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let (Some(timestamp_str), Some(sig_v1)) = (timestamp, sig_v1) else {
            // Header present but not in Stripe's format: effectively no
            // usable signature.
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMissing,
            };
        };

        // Parse and validate timestamp to prevent replay attacks.
        let Ok(timestamp) = timestamp_str.parse::<i64>() else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMissing,
            };
        };

        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMismatch,
            };
        }

        // Also reject timestamps from the future (clock skew tolerance: 60 seconds)
        if age < -60 {
            tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMismatch,
            };
        }

        // Construct the signed payload and compute the expected signature.
        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        if constant_time_eq(&expected, sig_v1) {
            VerifyOutcome::Verified {
                field: SIGNATURE_HEADER.to_string(),
            }
        } else {
            VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMismatch,
            }
        }
    }
}

impl WebhookVerifier for StripeClient {
    fn provider_name(&self) -> &'static str {
        "stripe"
    }

    fn signature_aliases(&self) -> &'static [&'static str] {
        // Stripe signs a header, not a body field.
        &[]
    }

    fn verify_webhook(
        &self,
        _parsed: &Map<String, Value>,
        raw: &[u8],
        headers: &HeaderMap,
    ) -> VerifyOutcome {
        let Some(secret) = self.webhook_secret.as_deref() else {
            return VerifyOutcome::unverified(PaymentProvider::Stripe);
        };

        let Some(signature) = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMissing,
            };
        };

        self.verify_signature_header(secret, raw, signature)
    }
}
