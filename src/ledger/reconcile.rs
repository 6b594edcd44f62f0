//! Multi-transaction reconciliation.

use crate::error::Result;
use crate::models::BillingEntry;

use super::LedgerStore;

/// Reconcile a batch of provider transaction ids against the ledger.
///
/// Runs `reconcile_by_provider_tx` per id and aggregates every matched
/// entry, in the order of the input id list. An id with no match
/// contributes nothing - no placeholder, no error. An empty aggregate is a
/// successful zero-update result; the caller decides whether that is
/// meaningful for its request.
pub fn reconcile_many(
    store: &dyn LedgerStore,
    provider: &str,
    provider_tx_ids: &[String],
) -> Result<Vec<BillingEntry>> {
    let mut updated = Vec::new();
    for tx_id in provider_tx_ids {
        let mut matches = store.reconcile_by_provider_tx(provider, tx_id)?;
        if matches.is_empty() {
            tracing::debug!(provider, tx_id, "no ledger entries matched for reconciliation");
        }
        updated.append(&mut matches);
    }
    Ok(updated)
}
