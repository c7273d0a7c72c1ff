use crate::config::PubSubConfig;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;

pub mod post_stream;

pub use post_stream::PostEventStream;

#[derive(Clone, Debug)]
pub struct RedisClient {
    connection: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Connects to Redis, retrying with exponential backoff while the server is unreachable.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection keeps failing.
    pub async fn new(config: &PubSubConfig) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(config.url.as_str())?;

        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_secs(config.min_backoff_secs))
            .with_max_delay(Duration::from_secs(config.max_backoff_secs))
            .with_max_times(5);

        let connection = (|| async { client.get_connection_manager().await })
            .retry(retry_strategy)
            .notify(|e, duration| {
                tracing::warn!(error = %e, retry_in = ?duration, "Failed to connect to Redis, retrying");
            })
            .await?;

        Ok(Arc::new(Self { connection }))
    }

    /// Returns a handle to the shared multiplexed connection.
    #[must_use]
    pub fn connection(&self) -> redis::aio::ConnectionManager {
        self.connection.clone()
    }

    /// Pings the Redis server to check connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.connection();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
