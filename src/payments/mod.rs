pub mod canonical;

mod easypaisa;
mod jazzcash;
mod paddle;
mod stripe;

pub use easypaisa::EasyPaisaClient;
pub use jazzcash::JazzCashClient;
pub use paddle::PaddleClient;
pub use stripe::StripeClient;

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{msg, AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentProvider {
    Paddle,
    JazzCash,
    EasyPaisa,
    Stripe,
}

impl PaymentProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "paddle" => Some(PaymentProvider::Paddle),
            "jazzcash" => Some(PaymentProvider::JazzCash),
            "easypaisa" => Some(PaymentProvider::EasyPaisa),
            "stripe" => Some(PaymentProvider::Stripe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Paddle => "paddle",
            PaymentProvider::JazzCash => "jazzcash",
            PaymentProvider::EasyPaisa => "easypaisa",
            PaymentProvider::Stripe => "stripe",
        }
    }
}

/// Outbound checkout request, provider-agnostic.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Amount in the unit the provider expects (consistent per provider).
    pub amount: f64,
    /// Payer identifier: email for Paddle/Stripe, MSISDN for the wallets.
    pub payer: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Where the provider sends the customer after payment.
    pub return_url: String,
}

/// What the client must do to complete the checkout: follow a redirect to
/// a hosted page, or submit a signed form post to the provider gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutResult {
    Redirect {
        checkout_url: String,
        tx_id: String,
    },
    FormPost {
        url: String,
        method: &'static str,
        params: BTreeMap<String, String>,
        tx_id: String,
    },
}

impl CheckoutResult {
    pub fn tx_id(&self) -> &str {
        match self {
            CheckoutResult::Redirect { tx_id, .. } => tx_id,
            CheckoutResult::FormPost { tx_id, .. } => tx_id,
        }
    }
}

/// Deterministic sandbox checkout used when a provider has no credentials
/// configured, so local/dev/test flows run end-to-end.
pub(crate) fn sandbox_checkout(provider: PaymentProvider, return_url: &str) -> CheckoutResult {
    let tx_id = format!("sandbox-{}", chrono::Utc::now().timestamp_millis());
    let checkout_url = format!("{}?provider={}&tx={}", return_url, provider.as_str(), tx_id);
    CheckoutResult::Redirect { checkout_url, tx_id }
}

/// Why a webhook was rejected. Each sub-kind is inspectable by callers and
/// carried in the rejection response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// No known signature field/header present in the request.
    SignatureMissing,
    /// A signature was presented but the server lacks the key material to
    /// check it.
    SecretMissing,
    /// The computed value differs from the received one.
    SignatureMismatch,
}

/// Result of inbound webhook verification. Never an `Err` across the
/// webhook boundary - malformed input becomes a `Rejected` outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// The signature was cryptographically checked and matched.
    /// `field` records which signature alias (or header) matched.
    Verified { field: String },
    /// No signature mechanism is configured for this provider; the webhook
    /// is accepted with an explanatory note so callers can tell this apart
    /// from a genuine cryptographic pass.
    Unverified { note: String },
    Rejected { reason: RejectReason },
}

impl VerifyOutcome {
    pub fn ok(&self) -> bool {
        !matches!(self, VerifyOutcome::Rejected { .. })
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            VerifyOutcome::Unverified { note } => Some(note),
            _ => None,
        }
    }

    pub(crate) fn unverified(provider: PaymentProvider) -> Self {
        VerifyOutcome::Unverified {
            note: format!(
                "{} credentials not configured; signature not checked",
                provider.as_str()
            ),
        }
    }
}

/// A located signature field: which alias matched and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureField {
    pub field: String,
    pub value: String,
}

/// Look up the provider's signature among its known field aliases, in
/// priority order. Returning which alias matched keeps the aliasing
/// behavior observable instead of an ad hoc existence check.
pub fn find_signature_field(
    fields: &Map<String, Value>,
    aliases: &[&str],
) -> Option<SignatureField> {
    for alias in aliases {
        if let Some(value) = fields.get(*alias) {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !value.is_empty() {
                return Some(SignatureField {
                    field: (*alias).to_string(),
                    value,
                });
            }
        }
    }
    None
}

/// Inbound webhook verification seam, one implementation per provider.
pub trait WebhookVerifier: Send + Sync {
    /// Provider name for logging and ledger storage.
    fn provider_name(&self) -> &'static str;

    /// Signature field aliases checked in priority order (empty for
    /// providers that sign headers instead of body fields).
    fn signature_aliases(&self) -> &'static [&'static str];

    /// Verify a webhook. Must not panic on malformed input; every path
    /// returns a structured outcome.
    fn verify_webhook(
        &self,
        parsed: &Map<String, Value>,
        raw: &[u8],
        headers: &HeaderMap,
    ) -> VerifyOutcome;
}

/// All provider adapters, built once at startup from configuration.
pub struct Providers {
    pub paddle: PaddleClient,
    pub jazzcash: JazzCashClient,
    pub easypaisa: EasyPaisaClient,
    pub stripe: StripeClient,
}

impl Providers {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            paddle: PaddleClient::new(&config.paddle, http.clone()),
            jazzcash: JazzCashClient::new(&config.jazzcash),
            easypaisa: EasyPaisaClient::new(&config.easypaisa),
            stripe: StripeClient::new(&config.stripe, http),
        })
    }

    pub fn verifier(&self, provider: PaymentProvider) -> &dyn WebhookVerifier {
        match provider {
            PaymentProvider::Paddle => &self.paddle,
            PaymentProvider::JazzCash => &self.jazzcash,
            PaymentProvider::EasyPaisa => &self.easypaisa,
            PaymentProvider::Stripe => &self.stripe,
        }
    }

    pub async fn create_payment(
        &self,
        provider: PaymentProvider,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResult> {
        if request.amount < 0.0 {
            return Err(AppError::BadRequest(msg::NEGATIVE_AMOUNT.into()));
        }
        match provider {
            PaymentProvider::Paddle => self.paddle.create_payment(request).await,
            PaymentProvider::JazzCash => self.jazzcash.create_payment(request),
            PaymentProvider::EasyPaisa => self.easypaisa.create_payment(request),
            PaymentProvider::Stripe => self.stripe.create_payment(request).await,
        }
    }
}
