use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntitlementError {
    #[error("Billing gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Error calling out to billing gateway ({function}): {message}")]
    Gateway { function: String, message: String },

    #[error("Entitlement store error: {0}")]
    Store(String),

    #[error("User not authenticated.")]
    NotAuthenticated,

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Subscription plans not available. Please try again later.")]
    PlansUnavailable,

    #[error("Purchase receipt rejected: {0}")]
    ReceiptRejected(String),

    #[error("Error verifying purchase receipt: {0}")]
    ReceiptVerification(String),

    #[error("Ad error: {0}")]
    Ad(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EntitlementError {
    pub(crate) fn gateway(function: &str, message: impl ToString) -> Self {
        Self::Gateway {
            function: function.to_string(),
            message: message.to_string(),
        }
    }

    /// Connectivity-class errors. The operation can be attempted again and
    /// may succeed without any change of input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GatewayUnavailable(_)
                | Self::Gateway { .. }
                | Self::Store(_)
                | Self::PlansUnavailable
                | Self::ReceiptVerification(_)
                | Self::Ad(_)
                | Self::Http(_)
        )
    }

    /// Whether the error should be shown to the user when it results from an
    /// interactive action. Data errors are logged and degraded instead.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Json(_) | Self::Toml(_) | Self::Config(_))
    }
}
