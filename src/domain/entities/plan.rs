use serde::Serialize;

use super::entitlement::SubscriptionType;

/// Normalized view of a purchasable subscription offer. Rebuilt every time
/// the catalog loads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub tier: SubscriptionType,
    /// Recurring price in currency units.
    pub price: f64,
    pub currency: String,
    pub formatted_price: String,
    pub price_per_month: f64,
    pub billing_period: Option<String>,
    pub trial: Option<TrialInfo>,
    /// e.g. "Save 42%", only set on yearly plans when a monthly plan exists to
    /// compare against.
    pub savings: Option<String>,
    /// Token of the offer the plan was built from, if the platform uses them.
    pub offer_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialInfo {
    pub offer_id: Option<String>,
    /// ISO 8601 period, e.g. "P3D".
    pub period: Option<String>,
    pub formatted_price: Option<String>,
    pub price: f64,
}
