use async_trait::async_trait;

use crate::{
    data::models::billing_gateway::purchase_model::PurchaseModel, errors::EntitlementError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptVerdict {
    Valid,
    Invalid { reason: String },
}

/// Server-side check of a purchase receipt / token before it is trusted.
///
/// An `Err` means verification could not be performed (connectivity) and
/// the purchase should be retried later; `Ok(Invalid)` means the store
/// positively rejected it.
#[async_trait]
pub trait ReceiptVerifierDatasource: Send + Sync {
    async fn verify(&self, purchase: &PurchaseModel) -> Result<ReceiptVerdict, EntitlementError>;
}

/// Trusts every purchase. Use only where no verification backend exists.
#[derive(Debug, Default)]
pub struct NoopReceiptVerifier;

#[async_trait]
impl ReceiptVerifierDatasource for NoopReceiptVerifier {
    async fn verify(&self, purchase: &PurchaseModel) -> Result<ReceiptVerdict, EntitlementError> {
        log::debug!(
            "Receipt verification disabled, trusting purchase of {}",
            purchase.product_id
        );
        Ok(ReceiptVerdict::Valid)
    }
}
