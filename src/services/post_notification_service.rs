use crate::adapters::token_store::TokenStore;
use crate::domain::post::Post;
use crate::domain::push::{DispatchSummary, TokenRecord};
use crate::error::Result;
use crate::services::dispatcher::Dispatcher;
use crate::services::notification_builder;
use futures::TryStreamExt;
use std::sync::Arc;

/// Turns one post-creation event into a broadcast to every registered device.
#[derive(Clone, Debug)]
pub struct PostNotificationService {
    store: Arc<dyn TokenStore>,
    dispatcher: Dispatcher,
}

impl PostNotificationService {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// Notifies every registered device about `post`.
    ///
    /// The full token list is read before anything is sent, so a store failure
    /// aborts the event without a partial broadcast. Per-token delivery failures
    /// are absorbed and only show up in the returned summary.
    ///
    /// # Errors
    /// Returns an error if the token store cannot be listed.
    #[tracing::instrument(skip(self, post), fields(post_id = %post.id), err)]
    pub async fn handle_post_created(&self, post: &Post) -> Result<DispatchSummary> {
        let payload = notification_builder::build(post);

        let records: Vec<TokenRecord> = self.store.list_all().try_collect().await?;
        if records.is_empty() {
            tracing::info!("No registered devices, nothing to send");
            return Ok(DispatchSummary::default());
        }

        let results = self.dispatcher.dispatch(&payload, &records).await;
        let summary = DispatchSummary::from_results(&results);

        tracing::info!(
            attempted = summary.attempted(),
            delivered = summary.delivered,
            invalid = summary.invalid,
            transient = summary.transient,
            "Post notification dispatched"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryTokenStore;
    use crate::adapters::push::{PushError, PushProvider};
    use crate::config::DispatchConfig;
    use crate::domain::notification::NotificationPayload;
    use crate::domain::push::TokenOutcome;
    use crate::error::AppError;
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingPushProvider {
        sent: Mutex<Vec<(NotificationPayload, Vec<String>)>>,
    }

    #[async_trait]
    impl PushProvider for RecordingPushProvider {
        fn max_batch_size(&self) -> usize {
            1000
        }

        async fn send_batch(
            &self,
            payload: &NotificationPayload,
            tokens: &[String],
        ) -> std::result::Result<Vec<TokenOutcome>, PushError> {
            self.sent.lock().unwrap().push((payload.clone(), tokens.to_vec()));
            Ok(tokens
                .iter()
                .map(|t| if t.starts_with("dead") { TokenOutcome::InvalidToken } else { TokenOutcome::Delivered })
                .collect())
        }
    }

    #[derive(Debug)]
    struct UnreachableTokenStore;

    #[async_trait]
    impl TokenStore for UnreachableTokenStore {
        fn list_all(&self) -> BoxStream<'_, Result<TokenRecord>> {
            stream::iter([Err(AppError::TokenStore("connection refused".into()))]).boxed()
        }

        async fn upsert(&self, _user_id: &str, _token: &str) -> Result<()> {
            Err(AppError::TokenStore("connection refused".into()))
        }

        async fn remove(&self, _user_id: &str) -> Result<()> {
            Err(AppError::TokenStore("connection refused".into()))
        }
    }

    fn service(store: Arc<dyn TokenStore>, provider: Arc<RecordingPushProvider>) -> PostNotificationService {
        let dispatcher = Dispatcher::new(provider, Arc::clone(&store), &DispatchConfig::default());
        PostNotificationService::new(store, dispatcher)
    }

    #[tokio::test]
    async fn test_lost_pet_scenario() {
        crate::telemetry::init_test_telemetry();
        let store = Arc::new(MemoryTokenStore::with_records([
            TokenRecord::new("alice", "t1"),
            TokenRecord::new("bob", "dead-t2"),
        ]));
        let provider = Arc::new(RecordingPushProvider::default());
        let service = service(Arc::clone(&store) as Arc<dyn TokenStore>, Arc::clone(&provider));

        let summary = service.handle_post_created(&Post::new("p-1", "Max")).await.unwrap();

        assert_eq!(summary, DispatchSummary { delivered: 1, invalid: 1, transient: 0 });
        assert!(store.get("bob").is_none());
        assert!(store.get("alice").is_some());

        let sent = provider.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.body, "Max kayboldu. Hemen inceleyin!");
        assert_eq!(sent[0].1, vec!["t1".to_string(), "dead-t2".to_string()]);
    }

    #[tokio::test]
    async fn test_no_devices_sends_nothing() {
        let provider = Arc::new(RecordingPushProvider::default());
        let service = service(Arc::new(MemoryTokenStore::new()), Arc::clone(&provider));

        let summary = service.handle_post_created(&Post::new("p-1", "Max")).await.unwrap();

        assert_eq!(summary, DispatchSummary::default());
        assert!(provider.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_fails_the_event() {
        let provider = Arc::new(RecordingPushProvider::default());
        let service = service(Arc::new(UnreachableTokenStore), Arc::clone(&provider));

        let err = service.handle_post_created(&Post::new("p-1", "Max")).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(provider.sent.lock().unwrap().is_empty());
    }
}
