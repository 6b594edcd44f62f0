use axum::http::HeaderMap;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::PaddleCredentials;
use crate::error::{AppError, Result};

use super::canonical::{concat_canonical, verify_rsa_sha1};
use super::{
    find_signature_field, sandbox_checkout, CheckoutRequest, CheckoutResult, PaymentProvider,
    RejectReason, VerifyOutcome, WebhookVerifier,
};

const DEFAULT_ENDPOINT: &str = "https://vendors.paddle.com/api/2.0/product/generate_pay_link";

const SIGNATURE_ALIASES: &[&str] = &["p_signature", "signature"];

#[derive(Debug, Deserialize)]
struct GeneratePayLinkResponse {
    success: bool,
    #[serde(default)]
    response: Option<PayLinkData>,
    #[serde(default)]
    error: Option<PaddleApiError>,
}

#[derive(Debug, Deserialize)]
struct PayLinkData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct PaddleApiError {
    message: String,
}

/// Paddle (classic) adapter.
///
/// Outbound checkouts call the vendor API to generate a hosted pay link;
/// a passthrough reference threads our transaction id through to the
/// webhook. Inbound alerts carry a base64 RSA-SHA1 `p_signature` over the
/// concat-canonicalized remaining fields.
#[derive(Debug, Clone)]
pub struct PaddleClient {
    vendor_id: Option<String>,
    vendor_auth_code: Option<String>,
    public_key_pem: Option<String>,
    endpoint: String,
    client: Client,
}

impl PaddleClient {
    pub fn new(credentials: &PaddleCredentials, client: Client) -> Self {
        Self {
            vendor_id: credentials.vendor_id.clone(),
            vendor_auth_code: credentials.vendor_auth_code.clone(),
            public_key_pem: credentials.public_key_pem.clone(),
            endpoint: credentials
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client,
        }
    }

    pub async fn create_payment(&self, request: &CheckoutRequest) -> Result<CheckoutResult> {
        let (Some(vendor_id), Some(auth_code)) = (&self.vendor_id, &self.vendor_auth_code) else {
            return Ok(sandbox_checkout(PaymentProvider::Paddle, &request.return_url));
        };

        let passthrough = format!("P{}", Utc::now().timestamp_millis());
        let title = request
            .description
            .clone()
            .unwrap_or_else(|| "Payment".into());
        let price = format!("USD:{:.2}", request.amount);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("vendor_id", vendor_id.as_str()),
                ("vendor_auth_code", auth_code.as_str()),
                ("title", title.as_str()),
                ("prices[0]", price.as_str()),
                ("customer_email", request.payer.as_str()),
                ("passthrough", passthrough.as_str()),
                ("return_url", request.return_url.as_str()),
            ])
            .send()
            .await?;

        let body: GeneratePayLinkResponse = response.json().await?;
        if !body.success {
            let detail = body
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown error".into());
            return Err(AppError::Upstream(format!("Paddle API error: {}", detail)));
        }
        let url = body
            .response
            .map(|r| r.url)
            .ok_or_else(|| AppError::Upstream("Paddle API returned no pay link".into()))?;

        Ok(CheckoutResult::Redirect {
            checkout_url: url,
            tx_id: passthrough,
        })
    }
}

impl WebhookVerifier for PaddleClient {
    fn provider_name(&self) -> &'static str {
        "paddle"
    }

    fn signature_aliases(&self) -> &'static [&'static str] {
        SIGNATURE_ALIASES
    }

    fn verify_webhook(
        &self,
        parsed: &Map<String, Value>,
        _raw: &[u8],
        _headers: &HeaderMap,
    ) -> VerifyOutcome {
        let Some(public_key_pem) = self.public_key_pem.as_deref() else {
            return VerifyOutcome::unverified(PaymentProvider::Paddle);
        };

        let Some(signature) = find_signature_field(parsed, SIGNATURE_ALIASES) else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMissing,
            };
        };

        let message = concat_canonical(parsed, &[&signature.field]);
        match verify_rsa_sha1(public_key_pem, message.as_bytes(), &signature.value) {
            Ok(true) => VerifyOutcome::Verified {
                field: signature.field,
            },
            Ok(false) => VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMismatch,
            },
            Err(e) => {
                tracing::error!("Paddle public key rejected: {}", e);
                VerifyOutcome::Rejected {
                    reason: RejectReason::SecretMissing,
                }
            }
        }
    }
}
