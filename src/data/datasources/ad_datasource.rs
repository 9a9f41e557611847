use async_trait::async_trait;

use crate::{domain::entities::gate::AdShowResult, errors::EntitlementError};

/// Opaque ad capability (rewarded or interstitial).
#[async_trait]
pub trait AdDatasource: Send + Sync {
    /// Load an ad so that `show` does not wait on the network.
    async fn preload(&self) -> Result<(), EntitlementError>;

    /// Show the preloaded ad and resolve once it has been closed. An ad
    /// closed before the reward was earned is an error.
    async fn show(&self) -> Result<AdShowResult, EntitlementError>;
}
