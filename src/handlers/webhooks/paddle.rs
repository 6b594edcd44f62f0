//! Paddle (classic) alert webhook.
//!
//! Alerts arrive form-encoded with an RSA `p_signature` over the remaining
//! fields. `alert_id` is stable across redeliveries and keys the replay
//! guard; `passthrough` carries the tx reference we minted at checkout, with
//! `order_id`/`checkout_id` as fallback join keys.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::db::AppState;
use crate::idempotency::DEFAULT_EVENT_TTL;
use crate::models::{CreateBillingEntry, EntryType};
use crate::payments::PaymentProvider;

use super::common::{
    check_signature, field_f64, field_str, ignored, ingest_entry, parse_body_fields, reply,
    settle_or_ingest, tx_id_candidates, WebhookReply, WebhookResponse,
};

const PROVIDER: PaymentProvider = PaymentProvider::Paddle;

const TX_KEYS: &[&str] = &["passthrough", "order_id", "checkout_id"];

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

    if let Some(alert_id) = field_str(&fields, "alert_id") {
        if !state.guard.try_set_once(alert_id, DEFAULT_EVENT_TTL) {
            tracing::debug!(alert_id, "duplicate paddle alert suppressed");
            return reply(
                axum::http::StatusCode::OK,
                WebhookResponse {
                    ok: true,
                    status: Some("duplicate"),
                    reconciled: None,
                    entry_id: None,
                    reason: None,
                    note: None,
                },
            );
        }
    }

    match field_str(&fields, "alert_name").unwrap_or("") {
        "payment_succeeded" => {
            let tx_ids = tx_id_candidates(&fields, TX_KEYS);
            let input = CreateBillingEntry {
                provider: PROVIDER.as_str().to_string(),
                provider_tx_id: tx_ids.first().cloned(),
                entry_type: Some(EntryType::Charge),
                amount: field_f64(&fields, "sale_gross"),
                currency: field_str(&fields, "currency").map(str::to_uppercase),
                allocated_to: field_str(&fields, "email").map(str::to_string),
                metadata: Some(fields.clone()),
                ..Default::default()
            };
            settle_or_ingest(&state, PROVIDER, &tx_ids, input, note)
        }
        "payment_refunded" => {
            let input = CreateBillingEntry {
                provider: PROVIDER.as_str().to_string(),
                provider_tx_id: tx_id_candidates(&fields, TX_KEYS).into_iter().next(),
                entry_type: Some(EntryType::Refund),
                amount: field_f64(&fields, "gross_refund"),
                currency: field_str(&fields, "currency").map(str::to_uppercase),
                metadata: Some(fields.clone()),
                ..Default::default()
            };
            ingest_entry(&state, PROVIDER, input, note)
        }
        other => {
            tracing::debug!(alert_name = other, "unhandled paddle alert");
            ignored("Alert not handled")
        }
    }
}
