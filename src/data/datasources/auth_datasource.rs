use async_trait::async_trait;

use crate::errors::EntitlementError;

#[async_trait]
pub trait AuthDatasource: Send + Sync {
    /// ID of the signed-in user, or `None` if nobody is signed in.
    async fn current_user_id(&self) -> Result<Option<String>, EntitlementError>;
}
