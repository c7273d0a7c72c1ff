use crate::adapters::token_store::TokenStore;
use crate::error::Result;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PushTokenService {
    store: Arc<dyn TokenStore>,
}

impl PushTokenService {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Registers or replaces the push token of a user's device.
    ///
    /// # Errors
    /// Returns an error if the token store operation fails.
    #[tracing::instrument(skip(self, token))]
    pub async fn register_token(&self, user_id: &str, token: &str) -> Result<()> {
        self.store.upsert(user_id, token).await?;
        tracing::debug!("Push token registered");
        Ok(())
    }

    /// Forgets the push token of a user. Unknown users are ignored.
    ///
    /// # Errors
    /// Returns an error if the token store operation fails.
    #[tracing::instrument(skip(self))]
    pub async fn unregister_token(&self, user_id: &str) -> Result<()> {
        self.store.remove(user_id).await
    }
}
