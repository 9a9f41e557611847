use serde::Serialize;

/// Where a purchase handed to the reconciler came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseSource {
    /// Delivered by the gateway's purchase-update stream, typically right after
    /// the user bought something.
    Live,
    /// Enumerated by a restore.
    Restore,
}

impl PurchaseSource {
    /// Authentication failures are only surfaced to the user for live
    /// purchases.
    pub fn is_interactive(&self) -> bool {
        matches!(self, PurchaseSource::Live)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreResult {
    pub restored: bool,
    pub restored_count: usize,
    pub message: String,
}

/// Messages the host app should show as a result of background purchase
/// processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseNotice {
    /// A live purchase was recorded.
    SubscriptionActivated { product_id: String },
    /// A live purchase could not be attributed because nobody is signed in.
    SignInRequired { product_id: String },
    /// The gateway reported a purchase error. Retryable by the user.
    PurchaseFailed { code: Option<String>, message: String },
}
