use std::collections::BTreeMap;

use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::JazzCashCredentials;
use crate::util::constant_time_eq;

use super::canonical::secure_hash;
use super::{
    find_signature_field, sandbox_checkout, CheckoutRequest, CheckoutResult, PaymentProvider,
    RejectReason, VerifyOutcome, WebhookVerifier,
};

const DEFAULT_ENDPOINT: &str =
    "https://sandbox.jazzcash.com.pk/CustomerPortal/transactionmanagement/merchantform";

/// Signature field aliases observed across JazzCash integration variants,
/// checked in priority order.
const SIGNATURE_ALIASES: &[&str] = &["pp_SecureHash", "secure_hash", "signature", "hash"];

/// JazzCash mobile-wallet adapter.
///
/// Outbound checkouts are a signed form post to the merchant gateway (the
/// customer's browser submits the form); inbound IPN callbacks carry a
/// salted HMAC-SHA256 over the pipe-canonicalized `pp_*` fields.
#[derive(Debug, Clone)]
pub struct JazzCashClient {
    merchant_id: Option<String>,
    password: Option<String>,
    integrity_salt: Option<String>,
    endpoint: String,
}

impl JazzCashClient {
    pub fn new(credentials: &JazzCashCredentials) -> Self {
        Self {
            merchant_id: credentials.merchant_id.clone(),
            password: credentials.password.clone(),
            integrity_salt: credentials.integrity_salt.clone(),
            endpoint: credentials
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        }
    }

    fn is_configured(&self) -> bool {
        self.merchant_id.is_some() && self.password.is_some()
    }

    pub fn create_payment(&self, request: &CheckoutRequest) -> crate::error::Result<CheckoutResult> {
        let (Some(merchant_id), Some(password)) = (&self.merchant_id, &self.password) else {
            return Ok(sandbox_checkout(PaymentProvider::JazzCash, &request.return_url));
        };

        let now = Utc::now();
        let tx_ref = format!("T{}", now.timestamp_millis());
        // JazzCash amounts are in paisa (minor unit).
        let amount_paisa = (request.amount * 100.0).round() as i64;

        let mut fields = Map::new();
        fields.insert("pp_Version".into(), Value::String("1.1".into()));
        fields.insert("pp_TxnType".into(), Value::String("MWALLET".into()));
        fields.insert("pp_Language".into(), Value::String("EN".into()));
        fields.insert("pp_MerchantID".into(), Value::String(merchant_id.clone()));
        fields.insert("pp_Password".into(), Value::String(password.clone()));
        fields.insert("pp_TxnRefNo".into(), Value::String(tx_ref.clone()));
        fields.insert("pp_Amount".into(), Value::String(amount_paisa.to_string()));
        fields.insert("pp_TxnCurrency".into(), Value::String("PKR".into()));
        fields.insert(
            "pp_TxnDateTime".into(),
            Value::String(now.format("%Y%m%d%H%M%S").to_string()),
        );
        fields.insert("pp_BillReference".into(), Value::String(tx_ref.clone()));
        fields.insert(
            "pp_Description".into(),
            Value::String(request.description.clone().unwrap_or_else(|| "Payment".into())),
        );
        fields.insert("pp_MobileNumber".into(), Value::String(request.payer.clone()));
        fields.insert("pp_ReturnURL".into(), Value::String(request.return_url.clone()));

        let hash = secure_hash(&fields, &[], self.integrity_salt.as_deref());

        let mut params: BTreeMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
        params.insert("pp_SecureHash".into(), hash);

        Ok(CheckoutResult::FormPost {
            url: self.endpoint.clone(),
            method: "POST",
            params,
            tx_id: tx_ref,
        })
    }
}

impl WebhookVerifier for JazzCashClient {
    fn provider_name(&self) -> &'static str {
        "jazzcash"
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
        if !self.is_configured() && self.integrity_salt.is_none() {
            return VerifyOutcome::unverified(PaymentProvider::JazzCash);
        }

        let Some(signature) = find_signature_field(parsed, SIGNATURE_ALIASES) else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMissing,
            };
        };

        // A merchant is configured but its salt is not: the signature
        // cannot be checked, which is not the same as sandbox pass-through.
        let Some(salt) = self.integrity_salt.as_deref() else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SecretMissing,
            };
        };

        let expected = secure_hash(parsed, &[&signature.field], Some(salt));
        if constant_time_eq(&expected, &signature.value.to_lowercase()) {
            VerifyOutcome::Verified {
                field: signature.field,
            }
        } else {
            VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMismatch,
            }
        }
    }
}
