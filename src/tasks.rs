//! Background jobs of the entitlement service.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::domain::repositories::entitlement_repository::EntitlementRepository;

/// Periodically mark stale `active` entitlements as expired, so that rows
/// of users who never open the app do not stay active.
///
/// The first sweep runs immediately. Abort the returned handle to stop it.
pub fn spawn_expiry_sweep<R>(repository: Arc<R>, interval: Duration) -> JoinHandle<()>
where
    R: EntitlementRepository + 'static,
{
    tokio::spawn(async move {
        loop {
            match repository.sweep_expired(Utc::now()).await {
                Ok(n) if n > 0 => log::info!("Expired entitlements processed: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to expire entitlements: {e:?}"),
            }
            tokio::time::sleep(interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        domain::entities::{entitlement::EntitlementStatus, purchase_outcome::PurchaseSource},
        test_support::{purchase_at, test_repository, FakeAuth},
    };

    #[tokio::test(start_paused = true)]
    async fn test_sweep_expires_stale_rows_in_background() {
        let (repo, store, _gateway) = test_repository(FakeAuth::signed_in("u1"));
        let stale = purchase_at(
            "monthly_subscription_android",
            Utc::now() - ChronoDuration::days(45),
        );
        repo.reconcile(&stale, PurchaseSource::Restore, Utc::now())
            .await
            .unwrap();
        assert_eq!(store.records()[0].status, EntitlementStatus::Active);

        let handle = spawn_expiry_sweep(Arc::new(repo), Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.records()[0].status, EntitlementStatus::Expired);
        handle.abort();
    }
}
