use crate::domain::push::TokenRecord;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Durable mapping from user to the push token of their current device.
#[async_trait]
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Streams every registered token.
    ///
    /// The stream is lazy and pages through the store on demand; calling this again
    /// starts a fresh listing. Records written concurrently may or may not appear.
    fn list_all(&self) -> BoxStream<'_, Result<TokenRecord>>;

    /// Inserts or overwrites the token of a user.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    async fn upsert(&self, user_id: &str, token: &str) -> Result<()>;

    /// Removes the token of a user. Removing an absent record is not an error.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    async fn remove(&self, user_id: &str) -> Result<()>;

    /// Checks that the store can serve requests.
    ///
    /// # Errors
    /// Returns an error describing why the store is not ready.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
