use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    data::models::billing_gateway::{
        purchase_model::{PurchaseEvent, PurchaseModel},
        subscription_product_model::{ProductType, PurchaseRequest, SubscriptionProductModel},
    },
    errors::EntitlementError,
};

/// Adapter over the platform billing library. One implementation per
/// platform, selected when the host app is built.
#[async_trait]
pub trait BillingGatewayDatasource: Send + Sync {
    /// Open the connection to the store.
    async fn init_connection(&self) -> Result<(), EntitlementError>;

    async fn end_connection(&self) -> Result<(), EntitlementError>;

    /// skus:
    ///   Store product IDs to look up. Unknown IDs are omitted from the
    ///   result rather than reported as errors.
    async fn fetch_products(
        &self,
        skus: &[String],
        product_type: ProductType,
    ) -> Result<Vec<SubscriptionProductModel>, EntitlementError>;

    /// Start the platform purchase flow. Success only means the flow was
    /// started; the purchase itself arrives later as a `PurchaseEvent`.
    async fn request_purchase(&self, request: PurchaseRequest) -> Result<(), EntitlementError>;

    /// Route purchase updates and purchase errors into `events` until the
    /// connection ends.
    fn subscribe(&self, events: UnboundedSender<PurchaseEvent>);

    /// Acknowledge / finish the transaction so the store stops redelivering
    /// it.
    async fn finish_transaction(&self, purchase: &PurchaseModel) -> Result<(), EntitlementError>;

    /// Every purchase the store still considers granted to the signed-in
    /// store account.
    async fn get_available_purchases(&self) -> Result<Vec<PurchaseModel>, EntitlementError>;
}
