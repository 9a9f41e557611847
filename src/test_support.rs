//! Fakes shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::EntitlementConfig,
    data::{
        datasources::{
            ad_datasource::AdDatasource, auth_datasource::AuthDatasource,
            billing_gateway_datasource::BillingGatewayDatasource,
            entitlement_store_datasource::{EntitlementStoreDatasource, InMemoryEntitlementStore},
            receipt_verifier_datasource::NoopReceiptVerifier,
        },
        models::billing_gateway::{
            purchase_model::{PurchaseEvent, PurchaseModel, RawTimestamp},
            subscription_product_model::{
                PricingPhaseModel, PricingPhasesModel, ProductType, PurchaseRequest,
                RecurrenceMode, SubscriptionOfferModel, SubscriptionProductModel,
            },
        },
        repositories::entitlement_repository_impl::EntitlementRepositoryImpl,
    },
    domain::entities::{
        entitlement::{EntitlementRecord, EntitlementStatus, EntitlementWrite, Platform},
        gate::AdShowResult,
    },
    errors::EntitlementError,
};

pub(crate) type TestRepository<S = Arc<InMemoryEntitlementStore>> =
    EntitlementRepositoryImpl<FakeGateway, S, FakeAuth, NoopReceiptVerifier>;

pub(crate) fn test_config() -> EntitlementConfig {
    EntitlementConfig {
        connection_backoff_ms: 1,
        catalog_retry_delay_ms: 1,
        ..EntitlementConfig::for_platform(Platform::Android)
    }
}

pub(crate) fn test_repository(
    auth: FakeAuth,
) -> (TestRepository, Arc<InMemoryEntitlementStore>, FakeGateway) {
    let store = Arc::new(InMemoryEntitlementStore::new());
    let gateway = FakeGateway::with_catalog();
    let repo = repository_with_store(store.clone(), auth, gateway.clone());
    (repo, store, gateway)
}

pub(crate) fn repository_with_store<S: EntitlementStoreDatasource>(
    store: S,
    auth: FakeAuth,
    gateway: FakeGateway,
) -> TestRepository<S> {
    EntitlementRepositoryImpl::new(test_config(), gateway, store, auth, NoopReceiptVerifier)
}

pub(crate) fn active_purchase(product_id: &str) -> PurchaseModel {
    purchase_at(product_id, Utc::now())
}

pub(crate) fn purchase_at(product_id: &str, at: DateTime<Utc>) -> PurchaseModel {
    PurchaseModel {
        product_id: product_id.to_string(),
        transaction_id: Some("GPA.3372-0001".into()),
        transaction_date: Some(RawTimestamp::Millis(at.timestamp_millis() as f64)),
        purchase_token: Some(format!("token-{product_id}")),
        is_auto_renewing: Some(true),
        ..Default::default()
    }
}

pub(crate) fn phase(micros: i64, formatted: &str, period: &str, mode: RecurrenceMode) -> PricingPhaseModel {
    PricingPhaseModel {
        price_amount_micros: micros,
        formatted_price: Some(formatted.to_string()),
        price_currency_code: Some("INR".to_string()),
        billing_period: Some(period.to_string()),
        billing_cycle_count: None,
        recurrence_mode: Some(mode),
    }
}

pub(crate) fn offer(base_plan: &str, offer_id: Option<&str>, phases: Vec<PricingPhaseModel>) -> SubscriptionOfferModel {
    SubscriptionOfferModel {
        base_plan_id: Some(base_plan.to_string()),
        offer_id: offer_id.map(str::to_string),
        offer_token: Some(format!("{base_plan}-{}", offer_id.unwrap_or("base"))),
        pricing_phases: PricingPhasesModel {
            pricing_phase_list: phases,
        },
    }
}

pub(crate) fn android_catalog() -> Vec<SubscriptionProductModel> {
    vec![
        SubscriptionProductModel {
            id: "yearly_subscription_android".into(),
            display_name: Some("Yearly Premium".into()),
            subscription_offer_details: vec![
                offer(
                    "yearly",
                    None,
                    vec![phase(1_499_000_000, "₹1,499.00", "P1Y", RecurrenceMode::InfiniteRecurring)],
                ),
                offer(
                    "yearly",
                    Some("7days"),
                    vec![
                        phase(0, "Free", "P7D", RecurrenceMode::FiniteRecurring),
                        phase(1_499_000_000, "₹1,499.00", "P1Y", RecurrenceMode::InfiniteRecurring),
                    ],
                ),
            ],
            ..Default::default()
        },
        SubscriptionProductModel {
            id: "monthly_subscription_android".into(),
            display_name: Some("Monthly Premium".into()),
            subscription_offer_details: vec![
                offer(
                    "monthly",
                    None,
                    vec![phase(199_000_000, "₹199.00", "P1M", RecurrenceMode::InfiniteRecurring)],
                ),
                offer(
                    "monthly",
                    Some("3days"),
                    vec![
                        phase(0, "Free", "P3D", RecurrenceMode::FiniteRecurring),
                        phase(199_000_000, "₹199.00", "P1M", RecurrenceMode::InfiniteRecurring),
                    ],
                ),
            ],
            ..Default::default()
        },
    ]
}

// Gateway.
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GatewayState {
    products: Vec<SubscriptionProductModel>,
    /// Fetches answered with an error before the catalog is returned.
    failing_fetches: u32,
    /// Fetches answered with an empty list before the catalog is returned.
    empty_fetches: u32,
    fetch_calls: u32,
    failing_connects: u32,
    connect_calls: u32,
    connected: bool,
    purchase_ok: bool,
    offer_purchase_ok: bool,
    purchase_requests: Vec<PurchaseRequest>,
    finish_ok: bool,
    finished: Vec<PurchaseModel>,
    available: Vec<PurchaseModel>,
    events: Option<UnboundedSender<PurchaseEvent>>,
}

#[derive(Clone)]
pub(crate) struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub(crate) fn with_products(products: Vec<SubscriptionProductModel>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GatewayState {
                products,
                purchase_ok: true,
                offer_purchase_ok: true,
                finish_ok: true,
                ..Default::default()
            })),
        }
    }

    pub(crate) fn with_catalog() -> Self {
        Self::with_products(android_catalog())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_failing_fetches(&self, n: u32) {
        self.state().failing_fetches = n;
    }

    pub(crate) fn set_empty_fetches(&self, n: u32) {
        self.state().empty_fetches = n;
    }

    pub(crate) fn set_failing_connects(&self, n: u32) {
        self.state().failing_connects = n;
    }

    pub(crate) fn set_purchase_ok(&self, ok: bool) {
        self.state().purchase_ok = ok;
    }

    pub(crate) fn set_offer_purchase_ok(&self, ok: bool) {
        self.state().offer_purchase_ok = ok;
    }

    pub(crate) fn set_finish_ok(&self, ok: bool) {
        self.state().finish_ok = ok;
    }

    pub(crate) fn set_available(&self, purchases: Vec<PurchaseModel>) {
        self.state().available = purchases;
    }

    pub(crate) fn fetch_calls(&self) -> u32 {
        self.state().fetch_calls
    }

    pub(crate) fn connect_calls(&self) -> u32 {
        self.state().connect_calls
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub(crate) fn purchase_requests(&self) -> Vec<PurchaseRequest> {
        self.state().purchase_requests.clone()
    }

    pub(crate) fn finished(&self) -> Vec<PurchaseModel> {
        self.state().finished.clone()
    }

    /// Push an event into the subscribed channel, as the platform would.
    pub(crate) fn emit(&self, event: PurchaseEvent) {
        if let Some(events) = &self.state().events {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl BillingGatewayDatasource for FakeGateway {
    async fn init_connection(&self) -> Result<(), EntitlementError> {
        let mut state = self.state();
        state.connect_calls += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(EntitlementError::GatewayUnavailable("offline".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn end_connection(&self) -> Result<(), EntitlementError> {
        let mut state = self.state();
        state.connected = false;
        state.events = None;
        Ok(())
    }

    async fn fetch_products(
        &self,
        skus: &[String],
        product_type: ProductType,
    ) -> Result<Vec<SubscriptionProductModel>, EntitlementError> {
        assert_eq!(product_type, ProductType::Subscription);
        let mut state = self.state();
        state.fetch_calls += 1;
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(EntitlementError::gateway("fetch_products", "timeout"));
        }
        if state.empty_fetches > 0 {
            state.empty_fetches -= 1;
            return Ok(Vec::new());
        }
        Ok(state
            .products
            .iter()
            .filter(|p| skus.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn request_purchase(&self, request: PurchaseRequest) -> Result<(), EntitlementError> {
        let mut state = self.state();
        let ok = state.purchase_ok && (request.offer_token.is_none() || state.offer_purchase_ok);
        state.purchase_requests.push(request);
        if ok {
            Ok(())
        } else {
            Err(EntitlementError::gateway("request_purchase", "billing unavailable"))
        }
    }

    fn subscribe(&self, events: UnboundedSender<PurchaseEvent>) {
        self.state().events = Some(events);
    }

    async fn finish_transaction(&self, purchase: &PurchaseModel) -> Result<(), EntitlementError> {
        let mut state = self.state();
        if !state.finish_ok {
            return Err(EntitlementError::gateway("finish_transaction", "not connected"));
        }
        state.finished.push(purchase.clone());
        Ok(())
    }

    async fn get_available_purchases(&self) -> Result<Vec<PurchaseModel>, EntitlementError> {
        Ok(self.state().available.clone())
    }
}

// Auth.
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub(crate) struct FakeAuth {
    user_id: Arc<Mutex<Option<String>>>,
}

impl FakeAuth {
    pub(crate) fn signed_in(user_id: &str) -> Self {
        Self {
            user_id: Arc::new(Mutex::new(Some(user_id.to_string()))),
        }
    }

    pub(crate) fn signed_out() -> Self {
        Self {
            user_id: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn sign_in(&self, user_id: &str) {
        *self.user_id.lock().unwrap() = Some(user_id.to_string());
    }
}

#[async_trait]
impl AuthDatasource for FakeAuth {
    async fn current_user_id(&self) -> Result<Option<String>, EntitlementError> {
        Ok(self.user_id.lock().unwrap().clone())
    }
}

// Ads.
// ---------------------------------------------------------------------------

#[derive(Default)]
struct AdState {
    preload_ok: bool,
    show_ok: bool,
    preload_calls: u32,
    show_calls: u32,
}

#[derive(Clone)]
pub(crate) struct FakeAd {
    state: Arc<Mutex<AdState>>,
}

impl FakeAd {
    pub(crate) fn ready() -> Self {
        Self {
            state: Arc::new(Mutex::new(AdState {
                preload_ok: true,
                show_ok: true,
                ..Default::default()
            })),
        }
    }

    pub(crate) fn failing_preload() -> Self {
        let ad = Self::ready();
        ad.set_preload_ok(false);
        ad
    }

    pub(crate) fn set_preload_ok(&self, ok: bool) {
        self.state.lock().unwrap().preload_ok = ok;
    }

    pub(crate) fn set_show_ok(&self, ok: bool) {
        self.state.lock().unwrap().show_ok = ok;
    }

    pub(crate) fn preload_calls(&self) -> u32 {
        self.state.lock().unwrap().preload_calls
    }

    pub(crate) fn show_calls(&self) -> u32 {
        self.state.lock().unwrap().show_calls
    }
}

#[async_trait]
impl AdDatasource for FakeAd {
    async fn preload(&self) -> Result<(), EntitlementError> {
        let mut state = self.state.lock().unwrap();
        state.preload_calls += 1;
        if state.preload_ok {
            Ok(())
        } else {
            Err(EntitlementError::Ad("no fill".into()))
        }
    }

    async fn show(&self) -> Result<AdShowResult, EntitlementError> {
        let mut state = self.state.lock().unwrap();
        state.show_calls += 1;
        if state.show_ok {
            Ok(AdShowResult::Watched)
        } else {
            Err(EntitlementError::Ad("closed before reward".into()))
        }
    }
}

// Store.
// ---------------------------------------------------------------------------

/// Store whose every call fails.
pub(crate) struct FailingStore;

#[async_trait]
impl EntitlementStoreDatasource for FailingStore {
    async fn upsert(&self, _: EntitlementWrite) -> Result<EntitlementRecord, EntitlementError> {
        Err(EntitlementError::Store("connection refused".into()))
    }

    async fn select_active(&self, _: &str) -> Result<Option<EntitlementRecord>, EntitlementError> {
        Err(EntitlementError::Store("connection refused".into()))
    }

    async fn update_status(&self, _: u64, _: EntitlementStatus) -> Result<(), EntitlementError> {
        Err(EntitlementError::Store("connection refused".into()))
    }

    async fn select_expired_active(
        &self,
        _: DateTime<Utc>,
    ) -> Result<Vec<EntitlementRecord>, EntitlementError> {
        Err(EntitlementError::Store("connection refused".into()))
    }
}
