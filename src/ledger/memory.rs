use std::sync::Mutex;

use crate::error::{msg, AppError, Result};
use crate::models::{BillingEntry, CreateBillingEntry, EntryStatus, UpdateBillingEntry};

use super::{normalize_new_entry, LedgerStore};

/// In-memory ledger backend, selected when no `DATABASE_PATH` is
/// configured. Non-durable: entries do not survive a process restart and
/// are not shared across instances. Intended for local/dev/test runs only.
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<BillingEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn create_entry(&self, input: CreateBillingEntry) -> Result<BillingEntry> {
        let entry = normalize_new_entry(input);
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        entries.push(entry.clone());
        Ok(entry)
    }

    fn get_entry(&self, id: &str) -> Result<Option<BillingEntry>> {
        let entries = self.entries.lock().expect("ledger lock poisoned");
        Ok(entries.iter().find(|e| e.id == id).cloned())
    }

    fn list_entries(&self, limit: i64) -> Result<Vec<BillingEntry>> {
        let entries = self.entries.lock().expect("ledger lock poisoned");
        // Insertion order is creation order; newest first.
        Ok(entries
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn update_entry(&self, id: &str, patch: &UpdateBillingEntry) -> Result<BillingEntry> {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(msg::ENTRY_NOT_FOUND.to_string()))?;
        patch.apply(entry);
        Ok(entry.clone())
    }

    fn reconcile_by_provider_tx(
        &self,
        provider: &str,
        provider_tx_id: &str,
    ) -> Result<Vec<BillingEntry>> {
        let mut entries = self.entries.lock().expect("ledger lock poisoned");
        let mut updated = Vec::new();
        for entry in entries.iter_mut() {
            if entry.provider == provider
                && entry.provider_tx_id.as_deref() == Some(provider_tx_id)
            {
                entry.status = EntryStatus::Reconciled;
                updated.push(entry.clone());
            }
        }
        Ok(updated)
    }
}
