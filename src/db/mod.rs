use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::idempotency::IdempotencyGuard;
use crate::ledger::LedgerStore;
use crate::payments::Providers;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Billing ledger store (SQLite-backed or in-memory per configuration)
    pub ledger: Arc<dyn LedgerStore>,
    /// Configured provider adapters
    pub providers: Arc<Providers>,
    /// Replay suppression for providers with stable event ids
    pub guard: Arc<IdempotencyGuard>,
    /// Shared-secret admin key; None = admin endpoints open (dev mode)
    pub admin_api_key: Option<String>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
