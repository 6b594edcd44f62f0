use std::collections::BTreeMap;

use axum::http::HeaderMap;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::EasyPaisaCredentials;
use crate::util::constant_time_eq;

use super::canonical::secure_hash;
use super::{
    find_signature_field, sandbox_checkout, CheckoutRequest, CheckoutResult, PaymentProvider,
    RejectReason, VerifyOutcome, WebhookVerifier,
};

const DEFAULT_ENDPOINT: &str = "https://easypay.easypaisa.com.pk/easypay/Index.jsf";

const SIGNATURE_ALIASES: &[&str] = &["merchantHashedReq", "secure_hash", "signature", "hash"];

/// EasyPaisa wallet adapter. Same salted HMAC-SHA256 scheme as JazzCash
/// (pipe-canonicalized fields), different field names and gateway.
#[derive(Debug, Clone)]
pub struct EasyPaisaClient {
    store_id: Option<String>,
    hash_key: Option<String>,
    endpoint: String,
}

impl EasyPaisaClient {
    pub fn new(credentials: &EasyPaisaCredentials) -> Self {
        Self {
            store_id: credentials.store_id.clone(),
            hash_key: credentials.hash_key.clone(),
            endpoint: credentials
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        }
    }

    pub fn create_payment(&self, request: &CheckoutRequest) -> crate::error::Result<CheckoutResult> {
        let Some(store_id) = &self.store_id else {
            return Ok(sandbox_checkout(PaymentProvider::EasyPaisa, &request.return_url));
        };

        let order_ref = format!("E{}", Utc::now().timestamp_millis());

        let mut fields = Map::new();
        fields.insert("storeId".into(), Value::String(store_id.clone()));
        fields.insert("orderRefNum".into(), Value::String(order_ref.clone()));
        fields.insert(
            "amount".into(),
            Value::String(format!("{:.2}", request.amount)),
        );
        fields.insert("mobileNum".into(), Value::String(request.payer.clone()));
        fields.insert(
            "emailAddr".into(),
            Value::String(request.description.clone().unwrap_or_default()),
        );
        fields.insert("postBackURL".into(), Value::String(request.return_url.clone()));

        let hash = secure_hash(&fields, &[], self.hash_key.as_deref());

        let mut params: BTreeMap<String, String> = fields
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
        params.insert("merchantHashedReq".into(), hash);

        Ok(CheckoutResult::FormPost {
            url: self.endpoint.clone(),
            method: "POST",
            params,
            tx_id: order_ref,
        })
    }
}

impl WebhookVerifier for EasyPaisaClient {
    fn provider_name(&self) -> &'static str {
        "easypaisa"
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
        if self.store_id.is_none() && self.hash_key.is_none() {
            return VerifyOutcome::unverified(PaymentProvider::EasyPaisa);
        }

        let Some(signature) = find_signature_field(parsed, SIGNATURE_ALIASES) else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SignatureMissing,
            };
        };

        let Some(hash_key) = self.hash_key.as_deref() else {
            return VerifyOutcome::Rejected {
                reason: RejectReason::SecretMissing,
            };
        };

        let expected = secure_hash(parsed, &[&signature.field], Some(hash_key));
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
