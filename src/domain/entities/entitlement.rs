use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

/// Billing period family of a product. Always derived from the product ID,
/// never taken from user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Monthly,
    Yearly,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntitlementStatus {
    Active,
    Expired,
    Cancelled,
    Trial,
    /// Reported when the user has no active record. Never persisted.
    None,
}

/// Stored entitlement row, unique per (user_id, product_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub id: u64,
    pub user_id: String,
    pub product_id: String,
    pub transaction_id: Option<String>,
    pub platform: Platform,
    pub subscription_type: SubscriptionType,
    pub status: EntitlementStatus,
    pub purchase_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    /// Stable across renewals of the same subscription lineage.
    pub original_transaction_id: Option<String>,
    /// Platform purchase token or receipt, kept for server-side
    /// re-verification.
    pub receipt_data: Option<String>,
    /// Renewal flag as of the last observed event. May be stale.
    pub auto_renew_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }
}

/// Values written by the reconciler. The store assigns `id` on first insert
/// and overwrites everything else on conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementWrite {
    pub user_id: String,
    pub product_id: String,
    pub transaction_id: Option<String>,
    pub platform: Platform,
    pub subscription_type: SubscriptionType,
    pub status: EntitlementStatus,
    pub purchase_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub original_transaction_id: Option<String>,
    pub receipt_data: Option<String>,
    pub auto_renew_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: EntitlementStatus,
    pub record: Option<EntitlementRecord>,
}

impl StatusReport {
    pub fn none() -> Self {
        Self {
            status: EntitlementStatus::None,
            record: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EntitlementStatus::Active && self.record.is_some()
    }
}
