//! JazzCash IPN webhook.
//!
//! The gateway posts the transaction result with a `pp_SecureHash` over the
//! pipe-canonical form of the other fields. `pp_ResponseCode == "000"` is
//! the only success code; anything else is acknowledged but not recorded.
//! JazzCash carries no stable event id, so duplicate deliveries are handled
//! by the idempotent reconcile write instead of the replay guard.

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

const PROVIDER: PaymentProvider = PaymentProvider::JazzCash;

const TX_KEYS: &[&str] = &["pp_TxnRefNo", "pp_BillReference", "order_id", "tx"];

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

    let response_code = field_str(&fields, "pp_ResponseCode").unwrap_or("");
    if response_code != "000" {
        tracing::info!(
            response_code,
            tx = field_str(&fields, "pp_TxnRefNo").unwrap_or("-"),
            "jazzcash transaction not successful"
        );
        return ignored("Transaction not successful");
    }

    let tx_ids = tx_id_candidates(&fields, TX_KEYS);
    let input = CreateBillingEntry {
        provider: PROVIDER.as_str().to_string(),
        provider_tx_id: tx_ids.first().cloned(),
        entry_type: Some(EntryType::Charge),
        // pp_Amount is in paisa; kept as reported, consistent per provider.
        amount: field_f64(&fields, "pp_Amount"),
        currency: field_str(&fields, "pp_TxnCurrency").map(str::to_uppercase),
        metadata: Some(fields.clone()),
        ..Default::default()
    };
    settle_or_ingest(&state, PROVIDER, &tx_ids, input, note)
}
