use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Months, TimeDelta, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    config::EntitlementConfig,
    constants::{NO_PURCHASES_RESTORED_MESSAGE, NO_PURCHASES_TO_RESTORE_MESSAGE},
    data::{
        datasources::{
            auth_datasource::AuthDatasource,
            billing_gateway_datasource::BillingGatewayDatasource,
            entitlement_store_datasource::EntitlementStoreDatasource,
            receipt_verifier_datasource::{ReceiptVerdict, ReceiptVerifierDatasource},
        },
        models::billing_gateway::{
            purchase_model::{PurchaseEvent, PurchaseModel},
            subscription_product_model::{ProductType, PurchaseRequest, SubscriptionProductModel},
        },
    },
    domain::{
        entities::{
            entitlement::{
                EntitlementRecord, EntitlementStatus, EntitlementWrite, StatusReport,
                SubscriptionType,
            },
            plan::Plan,
            purchase_outcome::{PurchaseSource, RestoreResult},
        },
        repositories::entitlement_repository::EntitlementRepository,
    },
    errors::EntitlementError,
};

use super::catalog_normalization::{normalize_catalog, select_purchase_offer};

#[derive(Default)]
struct CatalogCache {
    products: Vec<SubscriptionProductModel>,
    plans: Vec<Plan>,
}

pub struct EntitlementRepositoryImpl<
    G: BillingGatewayDatasource,
    S: EntitlementStoreDatasource,
    A: AuthDatasource,
    V: ReceiptVerifierDatasource,
> {
    billing_gateway_datasource: G,
    entitlement_store_datasource: S,
    auth_datasource: A,
    receipt_verifier_datasource: V,
    config: EntitlementConfig,
    catalog: Mutex<CatalogCache>,
    initialized: AtomicBool,
}

impl<G, S, A, V> EntitlementRepositoryImpl<G, S, A, V>
where
    G: BillingGatewayDatasource,
    S: EntitlementStoreDatasource,
    A: AuthDatasource,
    V: ReceiptVerifierDatasource,
{
    pub fn new(
        config: EntitlementConfig,
        billing_gateway_datasource: G,
        entitlement_store_datasource: S,
        auth_datasource: A,
        receipt_verifier_datasource: V,
    ) -> Self {
        Self {
            billing_gateway_datasource,
            entitlement_store_datasource,
            auth_datasource,
            receipt_verifier_datasource,
            config,
            catalog: Mutex::new(CatalogCache::default()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EntitlementConfig {
        &self.config
    }

    async fn connect_with_retry(&self) -> bool {
        let attempts = self.config.connection_attempts.max(1);
        for attempt in 1..=attempts {
            match self.billing_gateway_datasource.init_connection().await {
                Ok(()) => {
                    log::info!("Billing gateway connected (attempt {attempt})");
                    return true;
                }
                Err(e) => {
                    log::error!("Error connecting to billing gateway (attempt {attempt}): {e}");
                    if attempt < attempts {
                        let backoff = self.config.connection_backoff_ms * u64::from(attempt);
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
            }
        }
        false
    }

    async fn fetch_catalog_once(&self) -> Result<Vec<SubscriptionProductModel>, EntitlementError> {
        let products = self
            .billing_gateway_datasource
            .fetch_products(&self.config.catalog_product_ids, ProductType::Subscription)
            .await?;
        log::debug!(
            "Fetched {} of {} catalog products",
            products.len(),
            self.config.catalog_product_ids.len()
        );
        Ok(products)
    }

    async fn cached_product(
        &self,
        product_id: &str,
    ) -> Result<SubscriptionProductModel, EntitlementError> {
        if let Some(product) = self.find_cached_product(product_id)? {
            return Ok(product);
        }
        log::debug!("Product {product_id} not cached, reloading catalog");
        self.load_plans().await?;
        self.find_cached_product(product_id)?
            .ok_or_else(|| EntitlementError::ProductNotFound(product_id.to_string()))
    }

    fn find_cached_product(
        &self,
        product_id: &str,
    ) -> Result<Option<SubscriptionProductModel>, EntitlementError> {
        Ok(self
            .lock_catalog()?
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned())
    }

    fn lock_catalog(&self) -> Result<std::sync::MutexGuard<'_, CatalogCache>, EntitlementError> {
        self.catalog
            .lock()
            .map_err(|_| EntitlementError::Store("catalog cache lock poisoned".into()))
    }

    /// Purchase time and expiry for a purchase of `tier`, falling back to
    /// `now` when the reported time is missing or unusable.
    fn derive_dates(
        &self,
        purchase: &PurchaseModel,
        tier: SubscriptionType,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let reported = purchase
            .transaction_date
            .as_ref()
            .and_then(|t| t.parse())
            .or_else(|| purchase.purchase_date.as_ref().and_then(|t| t.parse()));
        if let Some(purchase_date) = reported {
            if let Some(expiry_date) = self.expiry_for(tier, purchase_date) {
                return (purchase_date, expiry_date);
            }
        }
        if purchase.transaction_date.is_some() || purchase.purchase_date.is_some() {
            log::warn!(
                "Invalid purchase date on {}, using current time",
                purchase.product_id
            );
        }
        let expiry_date = self.expiry_for(tier, now).unwrap_or_else(|| {
            log::warn!(
                "Expiry of {} out of range, granting one day",
                purchase.product_id
            );
            now.checked_add_signed(TimeDelta::days(1)).unwrap_or(now)
        });
        (now, expiry_date)
    }

    fn expiry_for(&self, tier: SubscriptionType, purchase_date: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match tier {
            SubscriptionType::Monthly => purchase_date.checked_add_months(Months::new(1)),
            SubscriptionType::Yearly => purchase_date.checked_add_months(Months::new(12)),
            SubscriptionType::Unknown => TimeDelta::try_hours(
                self.config.unknown_product_grace_hours,
            )
            .and_then(|grace| purchase_date.checked_add_signed(grace)),
        }
    }
}

#[async_trait]
impl<G, S, A, V> EntitlementRepository for EntitlementRepositoryImpl<G, S, A, V>
where
    G: BillingGatewayDatasource,
    S: EntitlementStoreDatasource,
    A: AuthDatasource,
    V: ReceiptVerifierDatasource,
{
    async fn init(&self, events: UnboundedSender<PurchaseEvent>) -> Result<(), EntitlementError> {
        if self.initialized.load(Ordering::SeqCst) {
            log::debug!("Entitlement service already initialized");
            return Ok(());
        }
        if !self.connect_with_retry().await {
            log::warn!("Billing gateway not connected, continuing to load products");
        }
        if let Err(e) = self.load_plans().await {
            log::warn!("Subscription plans unavailable after init: {e}");
        }
        self.billing_gateway_datasource.subscribe(events);
        self.initialized.store(true, Ordering::SeqCst);
        log::info!("Entitlement service initialized");
        Ok(())
    }

    async fn teardown(&self) -> Result<(), EntitlementError> {
        self.initialized.store(false, Ordering::SeqCst);
        self.billing_gateway_datasource.end_connection().await?;
        log::info!("Entitlement service torn down");
        Ok(())
    }

    async fn load_plans(&self) -> Result<Vec<Plan>, EntitlementError> {
        let products = match self.fetch_catalog_once().await {
            Ok(products) if !products.is_empty() => products,
            first => {
                match first {
                    Ok(_) => log::warn!("No products returned by billing gateway, retrying"),
                    Err(e) => log::warn!("Error loading products, retrying: {e}"),
                }
                tokio::time::sleep(self.config.catalog_retry_delay()).await;
                match self.fetch_catalog_once().await {
                    Ok(products) if !products.is_empty() => products,
                    Ok(_) => {
                        log::error!("No products found, check store product configuration");
                        return Err(EntitlementError::PlansUnavailable);
                    }
                    Err(e) => {
                        log::error!("Error loading products: {e}");
                        return Err(EntitlementError::PlansUnavailable);
                    }
                }
            }
        };
        let plans = normalize_catalog(&products, &self.config);
        let mut cache = self.lock_catalog()?;
        cache.products = products;
        cache.plans = plans.clone();
        log::info!("Loaded {} subscription plans", plans.len());
        Ok(plans)
    }

    fn cached_plans(&self) -> Vec<Plan> {
        self.catalog
            .lock()
            .map(|c| c.plans.clone())
            .unwrap_or_default()
    }

    async fn request_purchase(&self, product_id: &str) -> Result<(), EntitlementError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(EntitlementError::GatewayUnavailable(
                "entitlement service not initialized".into(),
            ));
        }
        let product = self.cached_product(product_id).await?;
        let offer = select_purchase_offer(&product, &self.config);
        let request = PurchaseRequest {
            sku: product.id.clone(),
            offer_token: offer.and_then(|o| o.offer_token.clone()),
            product_type: ProductType::Subscription,
        };
        log::info!(
            "Requesting purchase of {} (base plan {:?}, offer {:?})",
            request.sku,
            offer.and_then(|o| o.base_plan_id.as_deref()),
            offer.and_then(|o| o.offer_id.as_deref()),
        );
        match self
            .billing_gateway_datasource
            .request_purchase(request.clone())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if request.offer_token.is_some() => {
                log::warn!("Purchase with offer failed, retrying without offer: {e}");
                self.billing_gateway_datasource
                    .request_purchase(PurchaseRequest {
                        offer_token: None,
                        ..request
                    })
                    .await
                    .map_err(|fallback| {
                        log::error!("Purchase without offer also failed: {fallback}");
                        e
                    })
            }
            Err(e) => Err(e),
        }
    }

    async fn reconcile(
        &self,
        purchase: &PurchaseModel,
        source: PurchaseSource,
        now: DateTime<Utc>,
    ) -> Result<EntitlementRecord, EntitlementError> {
        let Some(user_id) = self.auth_datasource.current_user_id().await? else {
            if source.is_interactive() {
                log::warn!(
                    "Dropping purchase of {}: user not authenticated",
                    purchase.product_id
                );
            } else {
                log::debug!(
                    "Skipping restored purchase of {}: user not authenticated",
                    purchase.product_id
                );
            }
            return Err(EntitlementError::NotAuthenticated);
        };

        let subscription_type = self.config.classify(&purchase.product_id);
        if subscription_type == SubscriptionType::Unknown {
            log::warn!(
                "Unrecognized product {}, recording with {}h validity",
                purchase.product_id,
                self.config.unknown_product_grace_hours
            );
        }
        let (purchase_date, expiry_date) = self.derive_dates(purchase, subscription_type, now);

        match self.receipt_verifier_datasource.verify(purchase).await? {
            ReceiptVerdict::Valid => {}
            ReceiptVerdict::Invalid { reason } => {
                log::error!(
                    "Receipt for {} rejected, not recording: {reason}",
                    purchase.product_id
                );
                return Err(EntitlementError::ReceiptRejected(reason));
            }
        }

        let record = self
            .entitlement_store_datasource
            .upsert(EntitlementWrite {
                user_id,
                product_id: purchase.product_id.clone(),
                transaction_id: purchase.transaction_id.clone(),
                platform: self.config.platform,
                subscription_type,
                status: EntitlementStatus::Active,
                purchase_date,
                expiry_date,
                original_transaction_id: purchase.original_transaction_id(),
                receipt_data: purchase.receipt(),
                auto_renew_enabled: purchase.is_auto_renewing != Some(false),
                updated_at: now,
            })
            .await?;
        log::info!(
            "Recorded {:?} entitlement {} for {} until {}",
            record.subscription_type,
            record.id,
            record.product_id,
            record.expiry_date
        );

        // The store row is already correct; a redelivery re-derives the same
        // values.
        if let Err(e) = self
            .billing_gateway_datasource
            .finish_transaction(purchase)
            .await
        {
            log::warn!(
                "Error finishing transaction for {}: {e}",
                purchase.product_id
            );
        }
        Ok(record)
    }

    async fn restore_purchases(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RestoreResult, EntitlementError> {
        let purchases = self
            .billing_gateway_datasource
            .get_available_purchases()
            .await?;
        log::info!("Restoring {} available purchases", purchases.len());
        if purchases.is_empty() {
            return Ok(RestoreResult {
                restored: false,
                restored_count: 0,
                message: NO_PURCHASES_TO_RESTORE_MESSAGE.to_string(),
            });
        }

        let mut restored_count = 0;
        for purchase in &purchases {
            match self.reconcile(purchase, PurchaseSource::Restore, now).await {
                Ok(_) => restored_count += 1,
                Err(e) => log::warn!("Error restoring {}: {e}", purchase.product_id),
            }
        }
        Ok(RestoreResult {
            restored: restored_count > 0,
            restored_count,
            message: if restored_count > 0 {
                format!("Restored {restored_count} purchase(s)")
            } else {
                NO_PURCHASES_RESTORED_MESSAGE.to_string()
            },
        })
    }

    async fn get_status(&self, now: DateTime<Utc>) -> Result<StatusReport, EntitlementError> {
        let user_id = self
            .auth_datasource
            .current_user_id()
            .await?
            .ok_or(EntitlementError::NotAuthenticated)?;
        let Some(mut record) = self
            .entitlement_store_datasource
            .select_active(&user_id)
            .await?
        else {
            return Ok(StatusReport::none());
        };

        if record.is_expired_at(now) {
            log::info!(
                "Entitlement {} for {} expired at {}",
                record.id,
                record.product_id,
                record.expiry_date
            );
            if let Err(e) = self
                .entitlement_store_datasource
                .update_status(record.id, EntitlementStatus::Expired)
                .await
            {
                log::warn!("Error writing back expiry of {}: {e}", record.id);
            }
            record.status = EntitlementStatus::Expired;
            return Ok(StatusReport {
                status: EntitlementStatus::Expired,
                record: Some(record),
            });
        }

        Ok(StatusReport {
            status: EntitlementStatus::Active,
            record: Some(record),
        })
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, EntitlementError> {
        let stale = self
            .entitlement_store_datasource
            .select_expired_active(now)
            .await?;
        if stale.is_empty() {
            return Ok(0);
        }
        let mut expired = 0;
        for record in &stale {
            match self
                .entitlement_store_datasource
                .update_status(record.id, EntitlementStatus::Expired)
                .await
            {
                Ok(()) => expired += 1,
                Err(e) => log::error!("Error expiring entitlement {}: {e}", record.id),
            }
        }
        log::info!("Updated {expired} expired entitlements");
        Ok(expired)
    }
}
