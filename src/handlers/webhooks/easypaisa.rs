//! EasyPaisa IPN webhook.
//!
//! Same shape as JazzCash: an HMAC over the pipe-canonical body (field
//! `merchantHashedReq`), success signalled by `responseCode == "0000"`, no
//! stable event id, so duplicates resolve through the idempotent reconcile.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::db::AppState;
use crate::models::{CreateBillingEntry, EntryType};
use crate::payments::PaymentProvider;

use super::common::{
    check_signature, field_f64, field_str, ignored, parse_body_fields, settle_or_ingest,
    tx_id_candidates, WebhookReply,
};

const PROVIDER: PaymentProvider = PaymentProvider::EasyPaisa;

const TX_KEYS: &[&str] = &["orderRefNum", "orderId", "transactionId", "tx"];

pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    raw: Bytes,
) -> WebhookReply {
    let fields = parse_body_fields(&raw);

    let note = match check_signature(&state, PROVIDER, &fields, &raw, &headers) {
        Ok(note) => note,
        Err(rejection) => return rejection,
    };

    let response_code = field_str(&fields, "responseCode")
        .or_else(|| field_str(&fields, "response_code"))
        .unwrap_or("");
    if response_code != "0000" {
        tracing::info!(
            response_code,
            order = field_str(&fields, "orderRefNum").unwrap_or("-"),
            "easypaisa transaction not successful"
        );
        return ignored("Transaction not successful");
    }

    let tx_ids = tx_id_candidates(&fields, TX_KEYS);
    let input = CreateBillingEntry {
        provider: PROVIDER.as_str().to_string(),
        provider_tx_id: tx_ids.first().cloned(),
        entry_type: Some(EntryType::Charge),
        amount: field_f64(&fields, "transactionAmount")
            .or_else(|| field_f64(&fields, "amount")),
        currency: field_str(&fields, "currency")
            .map(str::to_uppercase)
            .or_else(|| Some("PKR".to_string())),
        metadata: Some(fields.clone()),
        ..Default::default()
    };
    settle_or_ingest(&state, PROVIDER, &tx_ids, input, note)
}
