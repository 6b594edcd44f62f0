//! Stripe event webhook.
//!
//! Stripe signs the raw body through the `stripe-signature` header and
//! retries delivery until it sees a 2xx, so every event is guarded by its
//! `evt_...` id before any ledger write.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Map, Value};

use crate::db::AppState;
use crate::idempotency::DEFAULT_EVENT_TTL;
use crate::models::{CreateBillingEntry, EntryType};
use crate::payments::PaymentProvider;

use super::common::{
    check_signature, field_str, ignored, ingest_entry, parse_body_fields, reply, settle_or_ingest,
    WebhookReply, WebhookResponse,
};

const PROVIDER: PaymentProvider = PaymentProvider::Stripe;

/// `data.object` of the event envelope.
fn event_object(fields: &Map<String, Value>) -> Option<&Map<String, Value>> {
    fields
        .get("data")?
        .as_object()?
        .get("object")?
        .as_object()
}

fn object_amount(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(Value::as_f64)
}

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

    // Replay suppression keyed on the event id. Stripe redelivers events
    // with the same id, so the second delivery is acknowledged untouched.
    if let Some(event_id) = field_str(&fields, "id") {
        if !state.guard.try_set_once(event_id, DEFAULT_EVENT_TTL) {
            tracing::debug!(event_id, "duplicate stripe event suppressed");
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

    let event_type = field_str(&fields, "type").unwrap_or("");
    let Some(object) = event_object(&fields) else {
        return ignored("Event has no data.object");
    };

    match event_type {
        "checkout.session.completed" => {
            let tx_ids: Vec<String> = object
                .get("id")
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default();
            let input = CreateBillingEntry {
                provider: PROVIDER.as_str().to_string(),
                provider_tx_id: tx_ids.first().cloned(),
                entry_type: Some(EntryType::Charge),
                amount: object_amount(object, "amount_total"),
                currency: field_str(object, "currency").map(str::to_uppercase),
                allocated_to: field_str(object, "client_reference_id").map(str::to_string),
                metadata: Some(object.clone()),
                ..Default::default()
            };
            settle_or_ingest(&state, PROVIDER, &tx_ids, input, note)
        }
        "charge.refunded" => {
            let input = CreateBillingEntry {
                provider: PROVIDER.as_str().to_string(),
                provider_tx_id: field_str(object, "id").map(str::to_string),
                entry_type: Some(EntryType::Refund),
                amount: object_amount(object, "amount_refunded"),
                currency: field_str(object, "currency").map(str::to_uppercase),
                metadata: Some(object.clone()),
                ..Default::default()
            };
            ingest_entry(&state, PROVIDER, input, note)
        }
        other => {
            tracing::debug!(event_type = other, "unhandled stripe event type");
            ignored("Event type not handled")
        }
    }
}
