use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Subscription purchase as returned by `purchases.subscriptionsv2.get`.
///
/// https://developers.google.com/android-publisher/api-ref/rest/v3/purchases.subscriptionsv2#SubscriptionPurchaseV2
///
/// Only the fields needed to decide whether a purchase token is genuine and
/// currently entitling are modelled.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscriptionPurchaseV2Model {
    /// One entry per subscribed item. All entries share the plan type.
    #[serde(default)]
    pub(crate) line_items: Vec<SubscriptionPurchaseLineItem>,
    pub(crate) subscription_state: SubscriptionState,
    pub(crate) latest_order_id: Option<String>,
    /// Only present for license-tester purchases.
    pub(crate) test_purchase: Option<TestPurchase>,
}

impl SubscriptionPurchaseV2Model {
    pub(crate) fn is_entitling(&self) -> bool {
        matches!(
            self.subscription_state,
            SubscriptionState::SubscriptionStateActive
                | SubscriptionState::SubscriptionStateInGracePeriod
                | SubscriptionState::SubscriptionStateCanceled
        )
    }

    pub(crate) fn covers_product(&self, product_id: &str) -> bool {
        self.line_items.iter().any(|li| li.product_id == product_id)
    }

    pub(crate) fn latest_expiry(&self) -> Option<DateTime<Utc>> {
        self.line_items.iter().map(|li| li.expiry_time).max()
    }
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum SubscriptionState {
    SubscriptionStateUnspecified,
    /// Created, awaiting payment.
    SubscriptionStatePending,
    SubscriptionStateActive,
    SubscriptionStatePaused,
    SubscriptionStateInGracePeriod,
    /// Suspended after failed renewal payments.
    SubscriptionStateOnHold,
    /// Auto-renew turned off, but not yet expired.
    SubscriptionStateCanceled,
    SubscriptionStateExpired,
    SubscriptionStatePendingPurchaseCanceled,
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
pub(crate) struct TestPurchase {}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubscriptionPurchaseLineItem {
    pub(crate) product_id: String,
    pub(crate) expiry_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_active_subscription() {
        let m: SubscriptionPurchaseV2Model = serde_json::from_str(
            r#"{
                "kind": "androidpublisher#subscriptionPurchaseV2",
                "regionCode": "IN",
                "startTime": "2024-01-15T00:00:00.123Z",
                "subscriptionState": "SUBSCRIPTION_STATE_ACTIVE",
                "latestOrderId": "GPA.1234-5678",
                "acknowledgementState": "ACKNOWLEDGEMENT_STATE_PENDING",
                "lineItems": [{
                    "productId": "monthly_subscription_android",
                    "expiryTime": "2024-02-15T00:00:00Z",
                    "autoRenewingPlan": {"autoRenewEnabled": true}
                }]
            }"#,
        )
        .unwrap();
        assert!(m.is_entitling());
        assert!(m.covers_product("monthly_subscription_android"));
        assert!(!m.covers_product("yearly_subscription_android"));
        assert_eq!(m.latest_order_id.as_deref(), Some("GPA.1234-5678"));
        assert!(m.test_purchase.is_none());
        assert_eq!(
            m.latest_expiry(),
            DateTime::parse_from_rfc3339("2024-02-15T00:00:00Z")
                .ok()
                .map(|d| d.with_timezone(&Utc))
        );
    }

    #[test]
    fn test_unknown_state_is_not_entitling() {
        let m: SubscriptionPurchaseV2Model = serde_json::from_str(
            r#"{
                "subscriptionState": "SUBSCRIPTION_STATE_SOMETHING_NEW",
                "acknowledgementState": "ACKNOWLEDGEMENT_STATE_ACKNOWLEDGED"
            }"#,
        )
        .unwrap();
        assert!(!m.is_entitling());
    }
}
