//! Append-only billing ledger.
//!
//! The store is a single interface with two interchangeable backends chosen
//! at startup: SQLite (when `DATABASE_PATH` is configured) or an in-memory
//! store for local/dev/test runs. Business logic never branches on the
//! backend.

mod memory;
mod reconcile;
mod sqlite;

pub use memory::MemoryLedger;
pub use reconcile::reconcile_many;
pub use sqlite::{init_db, SqliteLedger};

use crate::error::Result;
use crate::id::EntityType;
use crate::models::{BillingEntry, CreateBillingEntry, EntryStatus, EntryType, UpdateBillingEntry};

/// Apply creation defaults and assign a fresh id. Shared by both backends
/// so normalization cannot drift between them.
pub(crate) fn normalize_new_entry(input: CreateBillingEntry) -> BillingEntry {
    BillingEntry {
        id: EntityType::BillingEntry.gen_id(),
        provider: input.provider.trim().to_lowercase(),
        provider_tx_id: input.provider_tx_id,
        entry_type: input.entry_type.unwrap_or(EntryType::Charge),
        amount: input.amount.unwrap_or(0.0),
        currency: input.currency.unwrap_or_else(|| "USD".to_string()),
        status: input.status.unwrap_or(EntryStatus::Pending),
        timestamp: chrono::Utc::now(),
        allocated_to: input.allocated_to,
        metadata: input.metadata.unwrap_or_default(),
    }
}

pub trait LedgerStore: Send + Sync {
    /// Normalize input (defaults: `type=charge`, `currency=USD`,
    /// `status=pending`, `timestamp=now`), assign a fresh id, persist, and
    /// return the stored record.
    fn create_entry(&self, input: CreateBillingEntry) -> Result<BillingEntry>;

    fn get_entry(&self, id: &str) -> Result<Option<BillingEntry>>;

    /// Most-recent-first, bounded by `limit`.
    fn list_entries(&self, limit: i64) -> Result<Vec<BillingEntry>>;

    /// Merge patch fields into the stored entry. `NotFound` if the id does
    /// not exist.
    fn update_entry(&self, id: &str, patch: &UpdateBillingEntry) -> Result<BillingEntry>;

    /// Flip every entry matching both `provider` and `provider_tx_id` to
    /// `reconciled` and return the updated matches. Zero matches is a
    /// normal outcome (empty vec, not an error): the webhook may have
    /// arrived before ingest, or a duplicate webhook after the first call
    /// already flipped the status. Repeating the call re-applies the same
    /// idempotent status write and returns the same result set.
    fn reconcile_by_provider_tx(
        &self,
        provider: &str,
        provider_tx_id: &str,
    ) -> Result<Vec<BillingEntry>>;
}
