use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Charge,
    Refund,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "charge",
            Self::Refund => "refund",
            Self::Credit => "credit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "charge" => Some(Self::Charge),
            "refund" => Some(Self::Refund),
            "credit" => Some(Self::Credit),
            _ => None,
        }
    }
}

/// Reconciliation state. `Reconciled` is terminal: once set, no operation
/// in this service transitions it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Reconciled,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reconciled => "reconciled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "reconciled" => Some(Self::Reconciled),
            _ => None,
        }
    }
}

/// A single append-only ledger record for one provider event or charge.
///
/// Immutable except for `status` (flipped by reconciliation) and fields
/// explicitly patched through the admin PATCH endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEntry {
    pub id: String,
    /// Payment provider name ("paddle", "jazzcash", "easypaisa", "stripe", ...)
    pub provider: String,
    /// The provider's own transaction/order identifier; the join key for
    /// reconciliation.
    pub provider_tx_id: Option<String>,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Non-negative amount, in the unit the provider reports (minor for
    /// Stripe/JazzCash, major for Paddle) - consistent per provider.
    pub amount: f64,
    pub currency: String,
    pub status: EntryStatus,
    /// Creation time, RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Ownership link to a subscription/user record. Not enforced here.
    pub allocated_to: Option<String>,
    /// Raw provider payload fields (`order_id`, `tx`, `transaction_id`,
    /// `alert_id`, ...) kept as fallback join keys.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Input for creating a ledger entry. Every field except `provider` is
/// optional; `LedgerStore::create_entry` applies the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBillingEntry {
    pub provider: String,
    #[serde(default)]
    pub provider_tx_id: Option<String>,
    #[serde(default, rename = "type")]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub allocated_to: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Partial update applied by the admin PATCH endpoint. Absent fields are
/// left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBillingEntry {
    #[serde(default)]
    pub provider_tx_id: Option<String>,
    #[serde(default, rename = "type")]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
    #[serde(default)]
    pub allocated_to: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl UpdateBillingEntry {
    pub fn is_empty(&self) -> bool {
        self.provider_tx_id.is_none()
            && self.entry_type.is_none()
            && self.amount.is_none()
            && self.currency.is_none()
            && self.status.is_none()
            && self.allocated_to.is_none()
            && self.metadata.is_none()
    }

    /// Merge this patch into an entry in place.
    pub fn apply(&self, entry: &mut BillingEntry) {
        if let Some(ref tx) = self.provider_tx_id {
            entry.provider_tx_id = Some(tx.clone());
        }
        if let Some(t) = self.entry_type {
            entry.entry_type = t;
        }
        if let Some(a) = self.amount {
            entry.amount = a;
        }
        if let Some(ref c) = self.currency {
            entry.currency = c.clone();
        }
        if let Some(s) = self.status {
            entry.status = s;
        }
        if let Some(ref a) = self.allocated_to {
            entry.allocated_to = Some(a.clone());
        }
        if let Some(ref m) = self.metadata {
            entry.metadata = m.clone();
        }
    }
}
