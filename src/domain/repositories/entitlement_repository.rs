use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    data::models::billing_gateway::purchase_model::{PurchaseEvent, PurchaseModel},
    domain::entities::{
        entitlement::{EntitlementRecord, StatusReport},
        plan::Plan,
        purchase_outcome::{PurchaseSource, RestoreResult},
    },
    errors::EntitlementError,
};

#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    /// Connect to the gateway, load the catalog and route purchase events
    /// into `events`. Calling it again once initialized is a no-op.
    async fn init(&self, events: UnboundedSender<PurchaseEvent>) -> Result<(), EntitlementError>;

    async fn teardown(&self) -> Result<(), EntitlementError>;

    /// Fetch and normalize the catalog. `PlansUnavailable` if nothing could
    /// be loaded.
    async fn load_plans(&self) -> Result<Vec<Plan>, EntitlementError>;

    /// Plans from the last successful load.
    fn cached_plans(&self) -> Vec<Plan>;

    /// Start the purchase flow for `product_id`. The result of the purchase
    /// arrives asynchronously as a purchase event.
    async fn request_purchase(&self, product_id: &str) -> Result<(), EntitlementError>;

    /// Derive the entitlement for one purchase, store it and acknowledge the
    /// purchase to the gateway. Idempotent per (user, product).
    async fn reconcile(
        &self,
        purchase: &PurchaseModel,
        source: PurchaseSource,
        now: DateTime<Utc>,
    ) -> Result<EntitlementRecord, EntitlementError>;

    async fn restore_purchases(&self, now: DateTime<Utc>)
        -> Result<RestoreResult, EntitlementError>;

    /// Current entitlement of the signed-in user, expiring stale records on
    /// the way.
    async fn get_status(&self, now: DateTime<Utc>) -> Result<StatusReport, EntitlementError>;

    /// Mark every active record whose expiry has passed as expired. Returns
    /// the number of records updated.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, EntitlementError>;
}
