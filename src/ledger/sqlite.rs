use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use serde_json::Map;

use crate::db::DbPool;
use crate::error::{msg, AppError, Result};
use crate::models::{BillingEntry, CreateBillingEntry, EntryStatus, EntryType, UpdateBillingEntry};

use super::{normalize_new_entry, LedgerStore};

const ENTRY_COLS: &str = "id, provider, provider_tx_id, entry_type, amount, currency, \
                          status, timestamp, allocated_to, metadata";

/// Initialize the billing ledger schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Billing ledger (append-only; status is the only routinely
        -- mutated column)
        CREATE TABLE IF NOT EXISTS billing_entries (
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            provider_tx_id TEXT,
            entry_type TEXT NOT NULL CHECK (entry_type IN ('charge', 'refund', 'credit')),
            amount REAL NOT NULL CHECK (amount >= 0),
            currency TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('pending', 'reconciled')),
            timestamp TEXT NOT NULL,
            allocated_to TEXT,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_billing_provider_tx
            ON billing_entries(provider, provider_tx_id);
        CREATE INDEX IF NOT EXISTS idx_billing_timestamp
            ON billing_entries(timestamp);
        "#,
    )
}

fn entry_from_row(row: &Row) -> rusqlite::Result<BillingEntry> {
    let entry_type: String = row.get(3)?;
    let status: String = row.get(6)?;
    let timestamp: String = row.get(7)?;
    let metadata: String = row.get(9)?;

    Ok(BillingEntry {
        id: row.get(0)?,
        provider: row.get(1)?,
        provider_tx_id: row.get(2)?,
        entry_type: EntryType::from_str(&entry_type).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(3, "entry_type".into(), Type::Text)
        })?,
        amount: row.get(4)?,
        currency: row.get(5)?,
        status: EntryStatus::from_str(&status).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(6, "status".into(), Type::Text)
        })?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e))
            })?,
        allocated_to: row.get(8)?,
        metadata: serde_json::from_str::<Map<_, _>>(&metadata).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
        })?,
    })
}

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query so a patch is one
/// atomic write instead of a read-modify-write cycle.
struct UpdateBuilder {
    id: String,
    fields: Vec<(&'static str, rusqlite::types::Value)>,
}

impl UpdateBuilder {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fields: Vec::new(),
        }
    }

    fn set(mut self, column: &'static str, value: impl Into<rusqlite::types::Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<rusqlite::types::Value>>(
        self,
        column: &'static str,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Execute the update and return the updated entry via RETURNING.
    /// Returns None if no row matched or there was nothing to set.
    fn execute_returning(self, conn: &Connection) -> Result<Option<BillingEntry>> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<rusqlite::types::Value> =
            self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!(
            "UPDATE billing_entries SET {} WHERE id = ? RETURNING {}",
            sets.join(", "),
            ENTRY_COLS
        );
        conn.query_row(&sql, rusqlite::params_from_iter(values), entry_from_row)
            .optional()
            .map_err(Into::into)
    }
}

#[derive(Clone)]
pub struct SqliteLedger {
    pool: DbPool,
}

impl SqliteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl LedgerStore for SqliteLedger {
    fn create_entry(&self, input: CreateBillingEntry) -> Result<BillingEntry> {
        let entry = normalize_new_entry(input);
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO billing_entries (id, provider, provider_tx_id, entry_type, amount, \
             currency, status, timestamp, allocated_to, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.provider,
                entry.provider_tx_id,
                entry.entry_type.as_str(),
                entry.amount,
                entry.currency,
                entry.status.as_str(),
                entry.timestamp.to_rfc3339(),
                entry.allocated_to,
                serde_json::Value::Object(entry.metadata.clone()).to_string(),
            ],
        )?;
        Ok(entry)
    }

    fn get_entry(&self, id: &str) -> Result<Option<BillingEntry>> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM billing_entries WHERE id = ?1", ENTRY_COLS),
            params![id],
            entry_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn list_entries(&self, limit: i64) -> Result<Vec<BillingEntry>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM billing_entries ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
            ENTRY_COLS
        ))?;
        let entries = stmt
            .query_map(params![limit], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn update_entry(&self, id: &str, patch: &UpdateBillingEntry) -> Result<BillingEntry> {
        let conn = self.pool.get()?;

        if patch.is_empty() {
            // Nothing to change; still report NotFound for unknown ids.
            return self
                .get_entry(id)?
                .ok_or_else(|| AppError::NotFound(msg::ENTRY_NOT_FOUND.to_string()));
        }

        let metadata_json = patch
            .metadata
            .as_ref()
            .map(|m| serde_json::Value::Object(m.clone()).to_string());

        UpdateBuilder::new(id)
            .set_opt("provider_tx_id", patch.provider_tx_id.clone())
            .set_opt("entry_type", patch.entry_type.map(|t| t.as_str().to_string()))
            .set_opt("amount", patch.amount)
            .set_opt("currency", patch.currency.clone())
            .set_opt("status", patch.status.map(|s| s.as_str().to_string()))
            .set_opt("allocated_to", patch.allocated_to.clone())
            .set_opt("metadata", metadata_json)
            .execute_returning(&conn)?
            .ok_or_else(|| AppError::NotFound(msg::ENTRY_NOT_FOUND.to_string()))
    }

    fn reconcile_by_provider_tx(
        &self,
        provider: &str,
        provider_tx_id: &str,
    ) -> Result<Vec<BillingEntry>> {
        let conn = self.pool.get()?;
        // Single atomic status write; re-running it re-applies the same
        // value and returns the same rows.
        let mut stmt = conn.prepare(&format!(
            "UPDATE billing_entries SET status = 'reconciled' \
             WHERE provider = ?1 AND provider_tx_id = ?2 RETURNING {}",
            ENTRY_COLS
        ))?;
        let entries = stmt
            .query_map(params![provider, provider_tx_id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
