use axum::{
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Router,
};
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::{msg, AppError, Result};
use crate::extractors::{Json, Path, Query};
use crate::id::is_valid_prefixed_id;
use crate::ledger::reconcile_many;
use crate::middleware::admin_auth;
use crate::models::{BillingEntry, CreateBillingEntry, UpdateBillingEntry};

pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/billing/entries", get(list_entries))
        .route("/billing/reconcile", post(reconcile))
        .route("/billing/entry/{id}", patch(patch_entry))
        .layer(middleware::from_fn_with_state(state, admin_auth));

    Router::new()
        .route("/billing/ingest", post(ingest))
        .merge(admin)
}

#[derive(Serialize)]
struct EntryResponse {
    ok: bool,
    entry: BillingEntry,
}

/// POST /billing/ingest
///
/// Manual ingest of a billing event (one entry per event/charge notice).
async fn ingest(
    State(state): State<AppState>,
    Json(input): Json<CreateBillingEntry>,
) -> Result<(StatusCode, Json<EntryResponse>)> {
    if input.provider.trim().is_empty() {
        return Err(AppError::BadRequest(msg::PROVIDER_REQUIRED.into()));
    }
    if input.amount.is_some_and(|a| a < 0.0) {
        return Err(AppError::BadRequest(msg::NEGATIVE_AMOUNT.into()));
    }

    let entry = state.ledger.create_entry(input)?;
    tracing::info!(id = %entry.id, provider = %entry.provider, "billing entry ingested");

    Ok((StatusCode::CREATED, Json(EntryResponse { ok: true, entry })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Max results to return (default 50, max 100)
    limit: Option<i64>,
}

#[derive(Serialize)]
struct EntriesResponse {
    ok: bool,
    entries: Vec<BillingEntry>,
}

/// GET /billing/entries?limit=N - newest first.
async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EntriesResponse>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let entries = state.ledger.list_entries(limit)?;
    Ok(Json(EntriesResponse { ok: true, entries }))
}

#[derive(Debug, Deserialize)]
struct ReconcileRequest {
    provider: Option<String>,
    #[serde(default)]
    provider_tx_id: Option<String>,
    #[serde(default)]
    provider_tx_ids: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ReconcileResponse {
    ok: bool,
    updated: Vec<BillingEntry>,
}

/// POST /billing/reconcile
///
/// Accepts a single tx id or a batch for one provider. Zero matches is a
/// successful call with zero updates, not an error.
async fn reconcile(
    State(state): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>> {
    let provider = request
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest(msg::PROVIDER_REQUIRED.into()))?
        .to_lowercase();

    let tx_ids: Vec<String> = match (&request.provider_tx_id, &request.provider_tx_ids) {
        (Some(single), _) => vec![single.clone()],
        (None, Some(many)) if !many.is_empty() => many.clone(),
        _ => return Err(AppError::BadRequest(msg::TX_ID_REQUIRED.into())),
    };

    let updated = reconcile_many(state.ledger.as_ref(), &provider, &tx_ids)?;
    tracing::info!(
        provider = %provider,
        requested = tx_ids.len(),
        updated = updated.len(),
        "manual reconciliation"
    );

    Ok(Json(ReconcileResponse { ok: true, updated }))
}

#[derive(Serialize)]
struct UpdatedResponse {
    ok: bool,
    updated: BillingEntry,
}

/// PATCH /billing/entry/{id}
async fn patch_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<UpdateBillingEntry>,
) -> Result<Json<UpdatedResponse>> {
    // Cheap format check before touching the store.
    if !is_valid_prefixed_id(&id) {
        return Err(AppError::NotFound(msg::ENTRY_NOT_FOUND.into()));
    }

    let updated = state.ledger.update_entry(&id, &patch)?;
    Ok(Json(UpdatedResponse { ok: true, updated }))
}
