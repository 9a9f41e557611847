use serde::{Deserialize, Serialize};
use serde_repr::Deserialize_repr;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

/// Subscription product as returned by the billing gateway's product fetch.
///
/// The shape follows the device billing library: offers are embedded per
/// product, each with a nested list of pricing phases. Platforms without
/// offers (App Store) only populate the product-level price fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionProductModel {
    /// Store product ID (SKU).
    pub id: String,
    /// Localized product title.
    pub display_name: Option<String>,
    /// Localized product-level price, e.g. "₹199.00".
    pub display_price: Option<String>,
    /// Product-level price in currency units.
    pub price: Option<f64>,
    /// ISO 4217 currency code of the product-level price.
    pub currency: Option<String>,
    /// Google Play subscription offers. Every base plan appears as one offer
    /// without an offer ID, and every promotional offer on top of it as an
    /// additional entry.
    #[serde(default)]
    pub subscription_offer_details: Vec<SubscriptionOfferModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOfferModel {
    pub base_plan_id: Option<String>,
    /// Not set for the plain base-plan offer.
    pub offer_id: Option<String>,
    /// Required by the gateway to purchase this specific offer.
    pub offer_token: Option<String>,
    #[serde(default)]
    pub pricing_phases: PricingPhasesModel,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhasesModel {
    /// Phases in the order they are billed. A free trial, if any, comes
    /// first.
    #[serde(default)]
    pub pricing_phase_list: Vec<PricingPhaseModel>,
}

#[serde_as]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPhaseModel {
    /// Price in 1/million of the currency unit. Delivered either as a number
    /// or as a decimal string depending on the bridge.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub price_amount_micros: i64,
    pub formatted_price: Option<String>,
    pub price_currency_code: Option<String>,
    /// ISO 8601 period, e.g. "P1M".
    pub billing_period: Option<String>,
    pub billing_cycle_count: Option<i32>,
    pub recurrence_mode: Option<RecurrenceMode>,
}

impl PricingPhaseModel {
    pub(crate) fn is_free(&self) -> bool {
        self.price_amount_micros == 0
    }

    pub(crate) fn price(&self) -> f64 {
        self.price_amount_micros as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize_repr)]
#[repr(u8)]
pub enum RecurrenceMode {
    /// Billed until cancelled. This is the subscription's regular phase.
    InfiniteRecurring = 1,
    /// Billed for `billing_cycle_count` periods, e.g. an intro price.
    FiniteRecurring = 2,
    NonRecurring = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProductType {
    #[serde(rename = "subs")]
    Subscription,
    #[serde(rename = "inapp")]
    InApp,
}

/// Canonical purchase request handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub sku: String,
    /// Offer to purchase. Without it the gateway buys the default base plan.
    pub offer_token: Option<String>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
}
