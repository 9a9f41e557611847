use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::de::DeserializeOwned;
use yup_oauth2::{
    authenticator::DefaultAuthenticator, parse_service_account_key, ServiceAccountAuthenticator,
};

use crate::{
    constants::{GOOGLE_PLAY_API_BASE_URL, GOOGLE_PLAY_API_SCOPE},
    data::models::{
        billing_gateway::purchase_model::PurchaseModel,
        google_play_developer_api::subscription_purchase_v2_model::SubscriptionPurchaseV2Model,
    },
    errors::EntitlementError,
};

use super::receipt_verifier_datasource::{ReceiptVerdict, ReceiptVerifierDatasource};

#[async_trait]
pub(crate) trait GooglePlayDeveloperApiDatasource: Send + Sync {
    /// purchases.subscriptionsv2.get:
    /// https://developers.google.com/android-publisher/api-ref/rest/v3/purchases.subscriptionsv2/get
    ///
    /// packageName:
    ///   The package of the application the subscription was purchased in
    ///   (for example, 'com.some.thing').
    /// token:
    ///   The token provided to the user's device when the subscription was
    ///   purchased.
    async fn get_subscription_purchase_v2(
        &self,
        package_name: &str,
        token: &str,
    ) -> Result<SubscriptionPurchaseV2Model, EntitlementError>;
}

/// Source of OAuth access tokens for the Play Developer API. Asked once per
/// callout; implementations cache and refresh as needed.
#[async_trait]
pub(crate) trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, EntitlementError>;
}

#[async_trait]
impl AccessTokenSource for DefaultAuthenticator {
    async fn access_token(&self) -> Result<String, EntitlementError> {
        let scopes = &[GOOGLE_PLAY_API_SCOPE];
        Ok(self
            .token(scopes)
            .await
            .map_err(|e| {
                EntitlementError::ReceiptVerification(format!(
                    "Google Play API service account token could not be built: {e}"
                ))
            })?
            .token()
            .ok_or_else(|| {
                EntitlementError::ReceiptVerification(
                    "Google Play API service account token is empty".into(),
                )
            })?
            .to_string())
    }
}

pub(crate) struct GooglePlayDeveloperApiDatasourceImpl {
    token_source: Box<dyn AccessTokenSource>,
    base_url: String,
    client: reqwest::Client,
}

#[async_trait]
impl GooglePlayDeveloperApiDatasource for GooglePlayDeveloperApiDatasourceImpl {
    async fn get_subscription_purchase_v2(
        &self,
        package_name: &str,
        token: &str,
    ) -> Result<SubscriptionPurchaseV2Model, EntitlementError> {
        let url = format!(
            "{}/applications/{package_name}/purchases/subscriptionsv2/tokens/{token}",
            self.base_url
        );
        self.callout(&url, "purchases.subscriptionsv2.get").await
    }
}

impl GooglePlayDeveloperApiDatasourceImpl {
    pub(crate) async fn new(api_key: &str) -> Result<Self, EntitlementError> {
        Ok(Self::with_token_source(
            Self::build_authenticator(api_key).await?,
            GOOGLE_PLAY_API_BASE_URL,
        ))
    }

    fn with_token_source(
        token_source: impl AccessTokenSource + 'static,
        base_url: &str,
    ) -> Self {
        Self {
            token_source: Box::new(token_source),
            base_url: base_url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn build_authenticator(api_key: &str) -> Result<DefaultAuthenticator, EntitlementError> {
        let key = parse_service_account_key(api_key).map_err(|e| {
            EntitlementError::Config(format!("Google Play API key could not be parsed: {e}"))
        })?;
        ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| {
                EntitlementError::ReceiptVerification(format!(
                    "Google Play API service account authenticator could not be built: {e}"
                ))
            })
    }

    async fn callout<T: DeserializeOwned>(
        &self,
        url: &str,
        function_name: &str,
    ) -> Result<T, EntitlementError> {
        let access_token = self.token_source.access_token().await?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await
            .map_err(|e| {
                EntitlementError::ReceiptVerification(format!(
                    "{function_name} callout failed to send: {e}"
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // These mean the token itself is bad or unknown to Google.
            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::GONE => {
                    EntitlementError::ReceiptRejected(format!(
                        "{function_name} returned {status}: {body}"
                    ))
                }
                _ => EntitlementError::ReceiptVerification(format!(
                    "{function_name} returned {status}: {body}"
                )),
            });
        }

        response.json().await.map_err(|e| {
            EntitlementError::ReceiptVerification(format!(
                "failed to parse {function_name} callout response: {e}"
            ))
        })
    }
}

/// Verifies Google Play subscription purchase tokens against the Google Play
/// Developer API.
pub struct GooglePlayReceiptVerifier {
    api: Box<dyn GooglePlayDeveloperApiDatasource>,
    package_name: String,
}

impl GooglePlayReceiptVerifier {
    /// service_account_key:
    ///   JSON service account key with access to the Play Console.
    pub async fn new(
        service_account_key: &str,
        package_name: &str,
    ) -> Result<Self, EntitlementError> {
        Ok(Self {
            api: Box::new(GooglePlayDeveloperApiDatasourceImpl::new(service_account_key).await?),
            package_name: package_name.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_api(
        api: impl GooglePlayDeveloperApiDatasource + 'static,
        package_name: &str,
    ) -> Self {
        Self {
            api: Box::new(api),
            package_name: package_name.to_string(),
        }
    }
}

#[async_trait]
impl ReceiptVerifierDatasource for GooglePlayReceiptVerifier {
    async fn verify(&self, purchase: &PurchaseModel) -> Result<ReceiptVerdict, EntitlementError> {
        let Some(token) = purchase.purchase_token.as_deref() else {
            return Ok(ReceiptVerdict::Invalid {
                reason: "purchase has no Google Play purchase token".into(),
            });
        };
        let m = match self
            .api
            .get_subscription_purchase_v2(&self.package_name, token)
            .await
        {
            Ok(m) => m,
            Err(EntitlementError::ReceiptRejected(reason)) => {
                return Ok(ReceiptVerdict::Invalid { reason })
            }
            Err(e) => return Err(e),
        };
        if !m.covers_product(&purchase.product_id) {
            return Ok(ReceiptVerdict::Invalid {
                reason: format!("token does not cover product {}", purchase.product_id),
            });
        }
        if !m.is_entitling() {
            return Ok(ReceiptVerdict::Invalid {
                reason: format!("subscription state is {:?}", m.subscription_state),
            });
        }
        log::debug!(
            "Google Play token for {} valid until {:?}",
            purchase.product_id,
            m.latest_expiry()
        );
        if m.test_purchase.is_some() {
            log::info!(
                "Verified license-tester purchase of {} (order {:?})",
                purchase.product_id,
                m.latest_order_id
            );
        }
        Ok(ReceiptVerdict::Valid)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[derive(Clone, Default)]
    struct CountingTokenSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AccessTokenSource for CountingTokenSource {
        async fn access_token(&self) -> Result<String, EntitlementError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("token-{n}"))
        }
    }

    struct FailingTokenSource;

    #[async_trait]
    impl AccessTokenSource for FailingTokenSource {
        async fn access_token(&self) -> Result<String, EntitlementError> {
            Err(EntitlementError::ReceiptVerification("refresh failed".into()))
        }
    }

    #[tokio::test]
    async fn test_access_token_requested_per_callout() {
        let tokens = CountingTokenSource::default();
        // Nothing listens on the discard port, so every send fails fast.
        let api =
            GooglePlayDeveloperApiDatasourceImpl::with_token_source(tokens.clone(), "http://127.0.0.1:9");
        for _ in 0..2 {
            assert!(matches!(
                api.get_subscription_purchase_v2("com.example.posters", "token")
                    .await,
                Err(EntitlementError::ReceiptVerification(_))
            ));
        }
        assert_eq!(tokens.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_refresh_failure_is_retryable() {
        let api =
            GooglePlayDeveloperApiDatasourceImpl::with_token_source(FailingTokenSource, "http://127.0.0.1:9");
        let err = api
            .get_subscription_purchase_v2("com.example.posters", "token")
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    struct FakeApi {
        response: fn() -> Result<SubscriptionPurchaseV2Model, EntitlementError>,
    }

    #[async_trait]
    impl GooglePlayDeveloperApiDatasource for FakeApi {
        async fn get_subscription_purchase_v2(
            &self,
            _package_name: &str,
            _token: &str,
        ) -> Result<SubscriptionPurchaseV2Model, EntitlementError> {
            (self.response)()
        }
    }

    fn model(state: &str) -> SubscriptionPurchaseV2Model {
        serde_json::from_str(&format!(
            r#"{{
                "subscriptionState": "{state}",
                "acknowledgementState": "ACKNOWLEDGEMENT_STATE_PENDING",
                "lineItems": [{{"productId": "monthly_subscription_android", "expiryTime": "2024-02-15T00:00:00Z"}}]
            }}"#
        ))
        .unwrap()
    }

    fn purchase() -> PurchaseModel {
        PurchaseModel {
            product_id: "monthly_subscription_android".into(),
            purchase_token: Some("token".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_active_token_is_valid() {
        let verifier = GooglePlayReceiptVerifier::with_api(
            FakeApi {
                response: || Ok(model("SUBSCRIPTION_STATE_ACTIVE")),
            },
            "com.example.posters",
        );
        assert_eq!(
            verifier.verify(&purchase()).await.unwrap(),
            ReceiptVerdict::Valid
        );
    }

    #[tokio::test]
    async fn test_expired_or_unknown_token_is_invalid() {
        let verifier = GooglePlayReceiptVerifier::with_api(
            FakeApi {
                response: || Ok(model("SUBSCRIPTION_STATE_EXPIRED")),
            },
            "com.example.posters",
        );
        assert!(matches!(
            verifier.verify(&purchase()).await.unwrap(),
            ReceiptVerdict::Invalid { .. }
        ));

        let verifier = GooglePlayReceiptVerifier::with_api(
            FakeApi {
                response: || Err(EntitlementError::ReceiptRejected("410 Gone".into())),
            },
            "com.example.posters",
        );
        assert!(matches!(
            verifier.verify(&purchase()).await.unwrap(),
            ReceiptVerdict::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn test_connectivity_error_propagates() {
        let verifier = GooglePlayReceiptVerifier::with_api(
            FakeApi {
                response: || Err(EntitlementError::ReceiptVerification("timeout".into())),
            },
            "com.example.posters",
        );
        assert!(verifier.verify(&purchase()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_token_is_invalid() {
        let verifier = GooglePlayReceiptVerifier::with_api(
            FakeApi {
                response: || Ok(model("SUBSCRIPTION_STATE_ACTIVE")),
            },
            "com.example.posters",
        );
        let mut p = purchase();
        p.purchase_token = None;
        assert!(matches!(
            verifier.verify(&p).await.unwrap(),
            ReceiptVerdict::Invalid { .. }
        ));
    }
}
