use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    data::datasources::ad_datasource::AdDatasource,
    domain::{
        entities::gate::{
            AdAvailability, AdShowResult, DenyReason, GateDecision, GateOutcome, GateState,
            GatedAction,
        },
        repositories::entitlement_repository::EntitlementRepository,
    },
};

/// Decides, per gated action, whether it may run now, needs an ad, or needs
/// a purchase.
///
/// One coordinator serves one gate UI. Every operation takes `&mut self`, so
/// a second tap cannot start a concurrent check or purchase on the same gate.
pub struct AdGateCoordinator<R: EntitlementRepository, A: AdDatasource> {
    repository: Arc<R>,
    ad_datasource: A,
    poll_interval: Duration,
    poll_attempts: u32,
    state: GateState,
    ad: AdAvailability,
    pending: Option<GatedAction>,
}

impl<R: EntitlementRepository, A: AdDatasource> AdGateCoordinator<R, A> {
    pub(crate) fn new(
        repository: Arc<R>,
        ad_datasource: A,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Self {
        Self {
            repository,
            ad_datasource,
            poll_interval,
            poll_attempts,
            state: GateState::Idle,
            ad: AdAvailability::Disabled,
            pending: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn pending_action(&self) -> Option<GatedAction> {
        self.pending
    }

    /// Check the entitlement for `action`. Anything short of a verified
    /// active entitlement shows the gate.
    pub async fn attempt_gated_action(&mut self, action: GatedAction) -> GateDecision {
        let gate_already_shown = matches!(self.state, GateState::NeedsGate { .. });
        self.state = GateState::Checking;
        if self.is_entitled().await {
            log::debug!("{action:?} allowed by active entitlement");
            self.state = GateState::Allowed;
            self.reset();
            return GateDecision::ProceedImmediately;
        }

        self.pending = Some(action);
        if !gate_already_shown || self.ad == AdAvailability::Disabled {
            self.ad = self.preload_ad().await;
        }
        self.state = GateState::NeedsGate { ad: self.ad };
        log::debug!("{action:?} gated, ad {:?}", self.ad);
        GateDecision::ShowGate {
            ad_ready: self.ad == AdAvailability::Ready,
        }
    }

    /// Try to load an ad again after a failed preload.
    pub async fn retry_ad_preload(&mut self) -> AdAvailability {
        if self.pending.is_none() {
            return AdAvailability::Disabled;
        }
        self.ad = self.preload_ad().await;
        self.state = GateState::NeedsGate { ad: self.ad };
        self.ad
    }

    /// Show the ad. A watched ad releases exactly the one pending action.
    pub async fn watch_ad(&mut self) -> GateOutcome {
        if self.pending.is_none() {
            return GateOutcome::Denied(DenyReason::NoPendingAction);
        }
        if self.ad == AdAvailability::Disabled {
            return GateOutcome::Denied(DenyReason::AdUnavailable);
        }

        self.state = GateState::AdPending;
        let result = self.ad_datasource.show().await;
        // A shown ad is used up either way.
        self.ad = AdAvailability::Disabled;
        match result {
            Ok(AdShowResult::Watched) | Ok(AdShowResult::SkippedDueToEntitlement) => {
                self.state = GateState::AdShown;
                self.release()
            }
            Err(e) => {
                log::warn!("Ad failed to show: {e}");
                self.state = GateState::NeedsGate { ad: self.ad };
                GateOutcome::Failed(e)
            }
        }
    }

    /// Start the purchase of `product_id` and wait, within the poll budget,
    /// for the resulting entitlement. Dropping the returned future stops the
    /// polling but not the purchase.
    pub async fn choose_purchase(&mut self, product_id: &str) -> GateOutcome {
        if self.pending.is_none() {
            return GateOutcome::Denied(DenyReason::NoPendingAction);
        }

        self.state = GateState::PurchaseChosen;
        if let Err(e) = self.repository.request_purchase(product_id).await {
            log::warn!("Purchase of {product_id} could not be started: {e}");
            self.state = GateState::NeedsGate { ad: self.ad };
            return GateOutcome::Failed(e);
        }

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval).await;
            if self.is_entitled().await {
                log::info!("Entitlement for {product_id} active after {attempt} polls");
                self.state = GateState::Allowed;
                return self.release();
            }
        }
        log::info!("Purchase of {product_id} still processing after {} polls", self.poll_attempts);
        self.state = GateState::NeedsGate { ad: self.ad };
        GateOutcome::Denied(DenyReason::StillProcessing)
    }

    /// Dismiss the gate. Any purchase already started continues in the
    /// background.
    pub fn close(&mut self) {
        self.reset();
    }

    async fn is_entitled(&self) -> bool {
        match self.repository.get_status(Utc::now()).await {
            Ok(report) => report.is_active(),
            Err(e) => {
                log::warn!("Entitlement check failed, treating as not entitled: {e}");
                false
            }
        }
    }

    async fn preload_ad(&self) -> AdAvailability {
        match self.ad_datasource.preload().await {
            Ok(()) => AdAvailability::Ready,
            Err(e) => {
                log::warn!("Ad preload failed: {e}");
                AdAvailability::Disabled
            }
        }
    }

    fn release(&mut self) -> GateOutcome {
        let outcome = match self.pending.take() {
            Some(action) => GateOutcome::Proceed(action),
            None => GateOutcome::Denied(DenyReason::NoPendingAction),
        };
        self.reset();
        outcome
    }

    fn reset(&mut self) {
        self.pending = None;
        self.state = GateState::Idle;
    }
}
