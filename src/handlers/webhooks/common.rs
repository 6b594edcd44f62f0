//! Common webhook ingest infrastructure.
//!
//! Per inbound request the flow is:
//! `received -> signature-checked -> accepted (reconciled) |
//! accepted (ingested, pending) | rejected`.
//!
//! Provider handlers parse their event's semantic type from the payload and
//! either reconcile previously-ingested entries or ingest a new one; this
//! module holds the pieces they share.

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};

use crate::db::AppState;
use crate::ledger::reconcile_many;
use crate::models::{CreateBillingEntry, EntryType};
use crate::payments::{PaymentProvider, RejectReason, VerifyOutcome};
use crate::util::extract_request_info;

/// Response envelope for webhook endpoints.
#[derive(Debug, serde::Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciled: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub type WebhookReply = (StatusCode, axum::Json<WebhookResponse>);

pub fn reply(status: StatusCode, response: WebhookResponse) -> WebhookReply {
    (status, axum::Json(response))
}

pub fn ignored(note: &'static str) -> WebhookReply {
    reply(
        StatusCode::OK,
        WebhookResponse {
            ok: true,
            status: Some("ignored"),
            reconciled: None,
            entry_id: None,
            reason: None,
            note: Some(note.to_string()),
        },
    )
}

pub fn server_error(note: &'static str) -> WebhookReply {
    reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        WebhookResponse {
            ok: false,
            status: None,
            reconciled: None,
            entry_id: None,
            reason: None,
            note: Some(note.to_string()),
        },
    )
}

/// Parse a webhook body into a field map. Providers deliver either JSON
/// objects (Stripe) or form-encoded bodies (Paddle alerts, wallet IPNs);
/// anything else is treated as an empty map so verification can reject it
/// without panicking.
pub fn parse_body_fields(raw: &Bytes) -> Map<String, Value> {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(raw) {
        return map;
    }

    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(raw) {
        Ok(pairs) => pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
        Err(_) => Map::new(),
    }
}

pub fn field_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub fn field_f64(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Collect transaction-id candidates from the payload in priority order
/// (deduplicated). Which fields count as candidates is provider-specific.
pub fn tx_id_candidates(fields: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for key in keys {
        if let Some(value) = field_str(fields, key) {
            if !out.iter().any(|v| v == value) {
                out.push(value.to_string());
            }
        }
    }
    out
}

/// Run the provider's verifier and map a rejection to an HTTP reply.
/// Returns the verification note (if any) on acceptance.
pub fn check_signature(
    state: &AppState,
    provider: PaymentProvider,
    fields: &Map<String, Value>,
    raw: &[u8],
    headers: &HeaderMap,
) -> Result<Option<String>, WebhookReply> {
    let verifier = state.providers.verifier(provider);
    let outcome = verifier.verify_webhook(fields, raw, headers);
    let (ip, user_agent) = extract_request_info(headers);

    match outcome {
        VerifyOutcome::Verified { field } => {
            tracing::debug!(
                provider = verifier.provider_name(),
                field = %field,
                "webhook signature verified"
            );
            Ok(None)
        }
        VerifyOutcome::Unverified { note } => {
            tracing::warn!(
                provider = verifier.provider_name(),
                note = %note,
                "webhook accepted unverified"
            );
            Ok(Some(note))
        }
        VerifyOutcome::Rejected { reason } => {
            tracing::warn!(
                provider = verifier.provider_name(),
                ?reason,
                ip = ip.as_deref().unwrap_or("-"),
                user_agent = user_agent.as_deref().unwrap_or("-"),
                "webhook rejected"
            );
            Err(reply(
                StatusCode::UNAUTHORIZED,
                WebhookResponse {
                    ok: false,
                    status: Some("rejected"),
                    reconciled: None,
                    entry_id: None,
                    reason: Some(reason),
                    note: None,
                },
            ))
        }
    }
}

/// Settlement notice: reconcile the candidate tx ids; when nothing matches
/// (webhook arrived before ingest) record the event as a new pending entry.
pub fn settle_or_ingest(
    state: &AppState,
    provider: PaymentProvider,
    tx_ids: &[String],
    first_notice: CreateBillingEntry,
    note: Option<String>,
) -> WebhookReply {
    match reconcile_many(state.ledger.as_ref(), provider.as_str(), tx_ids) {
        Ok(updated) if !updated.is_empty() => {
            tracing::info!(
                provider = provider.as_str(),
                reconciled = updated.len(),
                "webhook settled pending entries"
            );
            reply(
                StatusCode::OK,
                WebhookResponse {
                    ok: true,
                    status: Some("reconciled"),
                    reconciled: Some(updated.len()),
                    entry_id: None,
                    reason: None,
                    note,
                },
            )
        }
        Ok(_) => ingest_entry(state, provider, first_notice, note),
        Err(e) => {
            tracing::error!(provider = provider.as_str(), "reconciliation failed: {}", e);
            server_error("Ledger error")
        }
    }
}

/// First notice of a charge/refund: append a new ledger entry.
pub fn ingest_entry(
    state: &AppState,
    provider: PaymentProvider,
    input: CreateBillingEntry,
    note: Option<String>,
) -> WebhookReply {
    let is_refund = input.entry_type == Some(EntryType::Refund);
    match state.ledger.create_entry(input) {
        Ok(entry) => {
            tracing::info!(
                provider = provider.as_str(),
                id = %entry.id,
                refund = is_refund,
                "webhook ingested new entry"
            );
            reply(
                StatusCode::OK,
                WebhookResponse {
                    ok: true,
                    status: Some("ingested"),
                    reconciled: None,
                    entry_id: Some(entry.id),
                    reason: None,
                    note,
                },
            )
        }
        Err(e) => {
            tracing::error!(provider = provider.as_str(), "ledger insert failed: {}", e);
            server_error("Ledger error")
        }
    }
}
