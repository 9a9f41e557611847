// Store product identifiers.
pub(crate) const MONTHLY_PRODUCT_ID_IOS: &str = "monthly_subscription";
pub(crate) const MONTHLY_PRODUCT_ID_ANDROID: &str = "monthly_subscription_android";
pub(crate) const YEARLY_PRODUCT_ID_IOS: &str = "yearly_subscription";
pub(crate) const YEARLY_PRODUCT_ID_ANDROID: &str = "yearly_subscription_android";

// Google Play base plans and trial offers.
pub(crate) const MONTHLY_BASE_PLAN_ID: &str = "monthly";
pub(crate) const MONTHLY_TRIAL_OFFER_ID: &str = "3days";
pub(crate) const YEARLY_BASE_PLAN_ID: &str = "yearly";
pub(crate) const YEARLY_TRIAL_OFFER_ID: &str = "7days";

pub(crate) const DEFAULT_CURRENCY: &str = "INR";

pub(crate) const DEFAULT_CATALOG_RETRY_DELAY_MS: u64 = 2000;
pub(crate) const DEFAULT_CONNECTION_ATTEMPTS: u32 = 3;
pub(crate) const DEFAULT_CONNECTION_BACKOFF_MS: u64 = 1000;
pub(crate) const DEFAULT_PURCHASE_POLL_INTERVAL_MS: u64 = 1000;
pub(crate) const DEFAULT_PURCHASE_POLL_ATTEMPTS: u32 = 10;
pub(crate) const DEFAULT_UNKNOWN_PRODUCT_GRACE_HOURS: i64 = 72;
/// One year.
pub(crate) const MAX_UNKNOWN_PRODUCT_GRACE_HOURS: i64 = 24 * 365;
pub(crate) const DEFAULT_EXPIRY_SWEEP_INTERVAL_SECS: u64 = 6 * 3600;

pub(crate) const CONFIG_PATH_ENV: &str = "ENTITLEMENT_CONFIG_PATH";

pub(crate) const GOOGLE_PLAY_API_BASE_URL: &str =
    "https://androidpublisher.googleapis.com/androidpublisher/v3";
pub(crate) const GOOGLE_PLAY_API_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

pub(crate) const NO_PURCHASES_TO_RESTORE_MESSAGE: &str = "No purchases found to restore";
pub(crate) const NO_PURCHASES_RESTORED_MESSAGE: &str = "No purchases restored";

/// Purchase error code of a flow the user dismissed.
pub(crate) const USER_CANCELLED_ERROR_CODE: &str = "E_USER_CANCELLED";
