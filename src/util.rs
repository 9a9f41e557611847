use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    ad_gate::AdGateCoordinator,
    config::EntitlementConfig,
    data::{
        datasources::{
            ad_datasource::AdDatasource, auth_datasource::AuthDatasource,
            billing_gateway_datasource::BillingGatewayDatasource,
            entitlement_store_datasource::EntitlementStoreDatasource,
            receipt_verifier_datasource::ReceiptVerifierDatasource,
        },
        models::billing_gateway::purchase_model::PurchaseEvent,
        repositories::entitlement_repository_impl::EntitlementRepositoryImpl,
    },
    domain::{
        entities::{
            entitlement::StatusReport,
            plan::Plan,
            purchase_outcome::{PurchaseNotice, PurchaseSource, RestoreResult},
        },
        repositories::entitlement_repository::EntitlementRepository,
    },
    errors::EntitlementError,
    tasks::spawn_expiry_sweep,
};

/// Application-facing entry point. Owns the entitlement context for the
/// lifetime of the app session; create one per session instead of sharing
/// global state.
pub struct EntitlementUtil<R: EntitlementRepository> {
    entitlement_repository: Arc<R>,
    poll_interval: Duration,
    poll_attempts: u32,
    sweep_interval: Duration,
}

impl<R: EntitlementRepository + 'static> EntitlementUtil<R> {
    /// Connect to the billing gateway and load the catalog. Returns the
    /// purchase event stream, to be drained with `process_purchase_events`.
    pub async fn init(&self) -> Result<UnboundedReceiver<PurchaseEvent>, EntitlementError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.entitlement_repository.init(tx).await?;
        Ok(rx)
    }

    pub async fn teardown(&self) -> Result<(), EntitlementError> {
        self.entitlement_repository.teardown().await
    }

    pub async fn load_plans(&self) -> Result<Vec<Plan>, EntitlementError> {
        self.entitlement_repository.load_plans().await
    }

    pub fn cached_plans(&self) -> Vec<Plan> {
        self.entitlement_repository.cached_plans()
    }

    pub async fn request_purchase(&self, product_id: &str) -> Result<(), EntitlementError> {
        self.entitlement_repository.request_purchase(product_id).await
    }

    /// Reconcile one event from the purchase stream. Returns what, if
    /// anything, the user should be told.
    pub async fn handle_purchase_event(&self, event: PurchaseEvent) -> Option<PurchaseNotice> {
        match event {
            PurchaseEvent::Updated(purchase) => {
                match self
                    .entitlement_repository
                    .reconcile(&purchase, PurchaseSource::Live, Utc::now())
                    .await
                {
                    Ok(_) => Some(PurchaseNotice::SubscriptionActivated {
                        product_id: purchase.product_id,
                    }),
                    Err(EntitlementError::NotAuthenticated) => {
                        Some(PurchaseNotice::SignInRequired {
                            product_id: purchase.product_id,
                        })
                    }
                    Err(EntitlementError::ReceiptRejected(reason)) => {
                        Some(PurchaseNotice::PurchaseFailed {
                            code: None,
                            message: reason,
                        })
                    }
                    Err(e) => {
                        // Not acknowledged; the gateway redelivers it.
                        log::error!(
                            "Error processing purchase of {}: {e}",
                            purchase.product_id
                        );
                        None
                    }
                }
            }
            PurchaseEvent::Failed(error) if error.is_user_cancelled() => {
                log::info!("Purchase cancelled by user");
                None
            }
            PurchaseEvent::Failed(error) => {
                log::warn!("Purchase error {:?}: {}", error.code, error.message);
                Some(PurchaseNotice::PurchaseFailed {
                    code: error.code,
                    message: error.message,
                })
            }
        }
    }

    /// Drain `events` until the gateway side of the channel closes.
    /// Notices are forwarded to `notices` when given.
    pub async fn process_purchase_events(
        &self,
        mut events: UnboundedReceiver<PurchaseEvent>,
        notices: Option<UnboundedSender<PurchaseNotice>>,
    ) {
        while let Some(event) = events.recv().await {
            let Some(notice) = self.handle_purchase_event(event).await else {
                continue;
            };
            if let Some(notices) = &notices {
                if notices.send(notice).is_err() {
                    log::debug!("Purchase notice receiver dropped");
                }
            }
        }
        log::debug!("Purchase event stream closed");
    }

    pub async fn restore_purchases(&self) -> Result<RestoreResult, EntitlementError> {
        self.entitlement_repository
            .restore_purchases(Utc::now())
            .await
    }

    pub async fn get_status(&self) -> Result<StatusReport, EntitlementError> {
        self.get_status_at(Utc::now()).await
    }

    pub async fn get_status_at(&self, now: DateTime<Utc>) -> Result<StatusReport, EntitlementError> {
        self.entitlement_repository.get_status(now).await
    }

    /// `false` on any error.
    pub async fn has_active_entitlement(&self) -> bool {
        self.has_active_entitlement_at(Utc::now()).await
    }

    pub async fn has_active_entitlement_at(&self, now: DateTime<Utc>) -> bool {
        match self.entitlement_repository.get_status(now).await {
            Ok(report) => report.is_active(),
            Err(e) => {
                log::warn!("Entitlement check failed: {e}");
                false
            }
        }
    }

    pub async fn sweep_expired(&self) -> Result<usize, EntitlementError> {
        self.entitlement_repository
            .sweep_expired(Utc::now())
            .await
    }

    pub fn spawn_expiry_sweep(&self) -> JoinHandle<()> {
        spawn_expiry_sweep(self.entitlement_repository.clone(), self.sweep_interval)
    }

    /// A fresh gate for one screen, sharing this session's entitlement
    /// context.
    pub fn ad_gate<A: AdDatasource>(&self, ad_datasource: A) -> AdGateCoordinator<R, A> {
        AdGateCoordinator::new(
            self.entitlement_repository.clone(),
            ad_datasource,
            self.poll_interval,
            self.poll_attempts,
        )
    }
}

impl<G, S, A, V> EntitlementUtil<EntitlementRepositoryImpl<G, S, A, V>>
where
    G: BillingGatewayDatasource + 'static,
    S: EntitlementStoreDatasource + 'static,
    A: AuthDatasource + 'static,
    V: ReceiptVerifierDatasource + 'static,
{
    pub fn new(
        config: EntitlementConfig,
        billing_gateway_datasource: G,
        entitlement_store_datasource: S,
        auth_datasource: A,
        receipt_verifier_datasource: V,
    ) -> Self {
        let poll_interval = config.purchase_poll_interval();
        let poll_attempts = config.purchase_poll_attempts;
        let sweep_interval = config.expiry_sweep_interval();
        Self {
            entitlement_repository: Arc::new(EntitlementRepositoryImpl::new(
                config,
                billing_gateway_datasource,
                entitlement_store_datasource,
                auth_datasource,
                receipt_verifier_datasource,
            )),
            poll_interval,
            poll_attempts,
            sweep_interval,
        }
    }
}
