use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::constants::USER_CANCELLED_ERROR_CODE;

/// A purchase as reported by the billing gateway, either through the
/// purchase-update stream or through `get_available_purchases`.
///
/// Redelivery of the same purchase is expected until it has been finished.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseModel {
    /// Store product ID (SKU) that was purchased.
    pub product_id: String,
    /// Transaction (App Store) or order (Google Play) ID.
    pub transaction_id: Option<String>,
    /// Time of the transaction. Preferred source for the purchase time.
    pub transaction_date: Option<RawTimestamp>,
    /// Secondary source for the purchase time.
    pub purchase_date: Option<RawTimestamp>,
    /// Transaction ID of the first purchase in the subscription lineage (App
    /// Store only).
    #[serde(rename = "originalTransactionIdentifierIOS")]
    pub original_transaction_identifier_ios: Option<String>,
    /// Google Play purchase token. Does not change across renewals.
    pub purchase_token: Option<String>,
    /// App Store receipt.
    pub transaction_receipt: Option<String>,
    /// Absent on platforms that do not report it; treated as renewing.
    pub is_auto_renewing: Option<bool>,
}

impl PurchaseModel {
    pub(crate) fn original_transaction_id(&self) -> Option<String> {
        self.original_transaction_identifier_ios
            .clone()
            .or_else(|| self.transaction_id.clone())
    }

    pub(crate) fn receipt(&self) -> Option<String> {
        self.purchase_token
            .clone()
            .or_else(|| self.transaction_receipt.clone())
    }
}

/// Timestamp as it arrives from the device: epoch milliseconds (number or
/// numeric string) or RFC 3339 text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(f64),
    Text(String),
}

impl RawTimestamp {
    /// Returns `None` for anything that does not denote a valid instant.
    pub(crate) fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            RawTimestamp::Millis(millis) => from_millis(*millis),
            RawTimestamp::Text(text) => {
                let text = text.trim();
                if let Ok(millis) = text.parse::<f64>() {
                    return from_millis(millis);
                }
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|d| d.with_timezone(&Utc))
            }
        }
    }
}

fn from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis <= 0.0 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Error reported by the gateway's purchase-error stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PurchaseErrorModel {
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl PurchaseErrorModel {
    pub fn is_user_cancelled(&self) -> bool {
        self.code.as_deref() == Some(USER_CANCELLED_ERROR_CODE)
    }
}

/// Single stream replacing the separate purchase-update and purchase-error
/// listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseEvent {
    Updated(PurchaseModel),
    Failed(PurchaseErrorModel),
}
