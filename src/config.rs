use std::{env, io::ErrorKind, time::Duration};

use serde::Deserialize;

use crate::{
    constants::*,
    domain::entities::entitlement::{Platform, SubscriptionType},
    errors::EntitlementError,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntitlementConfig {
    pub platform: Platform,
    /// Products fetched for the catalog, one per tier.
    pub catalog_product_ids: Vec<String>,
    /// Known product ID families, used to classify purchases. Lists the IDs
    /// of every platform so that purchases restored across platforms still
    /// classify.
    pub families: Vec<ProductFamilyConfig>,
    #[serde(default = "default_catalog_retry_delay_ms")]
    pub catalog_retry_delay_ms: u64,
    #[serde(default = "default_connection_attempts")]
    pub connection_attempts: u32,
    #[serde(default = "default_connection_backoff_ms")]
    pub connection_backoff_ms: u64,
    #[serde(default = "default_purchase_poll_interval_ms")]
    pub purchase_poll_interval_ms: u64,
    #[serde(default = "default_purchase_poll_attempts")]
    pub purchase_poll_attempts: u32,
    /// Validity window granted to purchases of unrecognized products.
    #[serde(default = "default_unknown_product_grace_hours")]
    pub unknown_product_grace_hours: i64,
    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductFamilyConfig {
    pub tier: SubscriptionType,
    pub product_ids: Vec<String>,
    /// Google Play base plan of this tier.
    #[serde(default)]
    pub base_plan_id: Option<String>,
    /// Google Play offer to prefer when purchasing, typically the free trial.
    #[serde(default)]
    pub trial_offer_id: Option<String>,
}

fn default_catalog_retry_delay_ms() -> u64 {
    DEFAULT_CATALOG_RETRY_DELAY_MS
}
fn default_connection_attempts() -> u32 {
    DEFAULT_CONNECTION_ATTEMPTS
}
fn default_connection_backoff_ms() -> u64 {
    DEFAULT_CONNECTION_BACKOFF_MS
}
fn default_purchase_poll_interval_ms() -> u64 {
    DEFAULT_PURCHASE_POLL_INTERVAL_MS
}
fn default_purchase_poll_attempts() -> u32 {
    DEFAULT_PURCHASE_POLL_ATTEMPTS
}
fn default_unknown_product_grace_hours() -> i64 {
    DEFAULT_UNKNOWN_PRODUCT_GRACE_HOURS
}
fn default_expiry_sweep_interval_secs() -> u64 {
    DEFAULT_EXPIRY_SWEEP_INTERVAL_SECS
}

impl EntitlementConfig {
    /// Built-in product IDs of the app.
    pub fn for_platform(platform: Platform) -> Self {
        let (monthly, yearly) = match platform {
            Platform::Ios => (MONTHLY_PRODUCT_ID_IOS, YEARLY_PRODUCT_ID_IOS),
            Platform::Android => (MONTHLY_PRODUCT_ID_ANDROID, YEARLY_PRODUCT_ID_ANDROID),
        };
        Self {
            platform,
            catalog_product_ids: vec![monthly.to_string(), yearly.to_string()],
            families: vec![
                ProductFamilyConfig {
                    tier: SubscriptionType::Monthly,
                    product_ids: vec![
                        MONTHLY_PRODUCT_ID_IOS.to_string(),
                        MONTHLY_PRODUCT_ID_ANDROID.to_string(),
                    ],
                    base_plan_id: Some(MONTHLY_BASE_PLAN_ID.to_string()),
                    trial_offer_id: Some(MONTHLY_TRIAL_OFFER_ID.to_string()),
                },
                ProductFamilyConfig {
                    tier: SubscriptionType::Yearly,
                    product_ids: vec![
                        YEARLY_PRODUCT_ID_IOS.to_string(),
                        YEARLY_PRODUCT_ID_ANDROID.to_string(),
                    ],
                    base_plan_id: Some(YEARLY_BASE_PLAN_ID.to_string()),
                    trial_offer_id: Some(YEARLY_TRIAL_OFFER_ID.to_string()),
                },
            ],
            catalog_retry_delay_ms: DEFAULT_CATALOG_RETRY_DELAY_MS,
            connection_attempts: DEFAULT_CONNECTION_ATTEMPTS,
            connection_backoff_ms: DEFAULT_CONNECTION_BACKOFF_MS,
            purchase_poll_interval_ms: DEFAULT_PURCHASE_POLL_INTERVAL_MS,
            purchase_poll_attempts: DEFAULT_PURCHASE_POLL_ATTEMPTS,
            unknown_product_grace_hours: DEFAULT_UNKNOWN_PRODUCT_GRACE_HOURS,
            expiry_sweep_interval_secs: DEFAULT_EXPIRY_SWEEP_INTERVAL_SECS,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, EntitlementError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the TOML file named by `ENTITLEMENT_CONFIG_PATH`. Without the
    /// variable, or if the file does not exist, the built-in configuration
    /// for `platform` is used.
    pub fn from_env(platform: Platform) -> Result<Self, EntitlementError> {
        let Ok(path) = env::var(CONFIG_PATH_ENV) else {
            return Ok(Self::for_platform(platform));
        };
        match std::fs::read_to_string(&path) {
            Ok(s) => Self::from_toml_str(&s),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("Config file {path} not found, using built-in product configuration");
                Ok(Self::for_platform(platform))
            }
            Err(e) => Err(EntitlementError::Config(format!(
                "failed to read {path}: {e}"
            ))),
        }
    }

    fn validate(&self) -> Result<(), EntitlementError> {
        if self.catalog_product_ids.is_empty() {
            return Err(EntitlementError::Config(
                "catalog_product_ids must not be empty".into(),
            ));
        }
        if self.purchase_poll_attempts == 0 {
            return Err(EntitlementError::Config(
                "purchase_poll_attempts must be at least 1".into(),
            ));
        }
        if !(1..=MAX_UNKNOWN_PRODUCT_GRACE_HOURS).contains(&self.unknown_product_grace_hours) {
            return Err(EntitlementError::Config(format!(
                "unknown_product_grace_hours must be between 1 and {MAX_UNKNOWN_PRODUCT_GRACE_HOURS}"
            )));
        }
        if self.expiry_sweep_interval_secs == 0 {
            return Err(EntitlementError::Config(
                "expiry_sweep_interval_secs must be at least 1".into(),
            ));
        }
        if self
            .families
            .iter()
            .any(|f| f.tier == SubscriptionType::Unknown)
        {
            return Err(EntitlementError::Config(
                "product families must be monthly or yearly".into(),
            ));
        }
        Ok(())
    }

    pub fn classify(&self, product_id: &str) -> SubscriptionType {
        self.family_of(product_id)
            .map(|f| f.tier)
            .unwrap_or(SubscriptionType::Unknown)
    }

    pub(crate) fn family_of(&self, product_id: &str) -> Option<&ProductFamilyConfig> {
        self.families
            .iter()
            .find(|f| f.product_ids.iter().any(|id| id == product_id))
    }

    pub(crate) fn catalog_retry_delay(&self) -> Duration {
        Duration::from_millis(self.catalog_retry_delay_ms)
    }

    pub(crate) fn purchase_poll_interval(&self) -> Duration {
        Duration::from_millis(self.purchase_poll_interval_ms)
    }

    pub(crate) fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_sweep_interval_secs)
    }
}
