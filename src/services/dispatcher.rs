use crate::adapters::push::{PushError, PushProvider};
use crate::adapters::token_store::TokenStore;
use crate::config::DispatchConfig;
use crate::domain::notification::NotificationPayload;
use crate::domain::push::{DeliveryErrorKind, DeliveryResult, TokenOutcome, TokenRecord};
use backon::{ExponentialBuilder, Retryable};
use futures::future::BoxFuture;
use futures::stream;
use futures::{FutureExt, StreamExt};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    sent: Counter<u64>,
    errors: Counter<u64>,
    invalidated_tokens: Counter<u64>,
    batch_retries: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("post-notifier");
        Self {
            sent: meter
                .u64_counter("push_sent_total")
                .with_description("Total number of push notifications accepted by the backend")
                .build(),
            errors: meter
                .u64_counter("push_errors_total")
                .with_description("Total number of push notification delivery errors")
                .build(),
            invalidated_tokens: meter
                .u64_counter("push_invalidated_tokens_total")
                .with_description("Total number of push tokens removed due to being invalid")
                .build(),
            batch_retries: meter
                .u64_counter("push_batch_retries_total")
                .with_description("Total number of batch resends after a transport failure")
                .build(),
        }
    }
}

/// Fans one notification out to many device tokens.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    provider: Arc<dyn PushProvider>,
    store: Arc<dyn TokenStore>,
    batch_size: usize,
    concurrency: usize,
    retry_strategy: ExponentialBuilder,
    send_timeout: Duration,
    metrics: Metrics,
}

impl Dispatcher {
    #[must_use]
    pub fn new(provider: Arc<dyn PushProvider>, store: Arc<dyn TokenStore>, config: &DispatchConfig) -> Self {
        let batch_size = usize::from(config.batch_size).min(provider.max_batch_size()).max(1);
        let retry_strategy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.retry_min_backoff_ms))
            .with_max_delay(Duration::from_millis(config.retry_max_backoff_ms))
            .with_max_times(config.max_retries)
            .with_jitter();

        Self {
            provider,
            store,
            batch_size,
            concurrency: config.batch_concurrency.max(1),
            retry_strategy,
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            metrics: Metrics::new(),
        }
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sends `payload` to every record's token and prunes tokens the backend reports as invalid.
    ///
    /// Results are in the same order as `records`. A batch that keeps failing at the
    /// transport level yields transient results for its own tokens only; it never
    /// affects the other batches.
    #[tracing::instrument(level = "debug", skip_all, fields(tokens = records.len()))]
    pub async fn dispatch(&self, payload: &NotificationPayload, records: &[TokenRecord]) -> Vec<DeliveryResult> {
        if records.is_empty() {
            return Vec::new();
        }

        // Boxed up front so the buffered stream does not hold a borrowing closure across awaits.
        let batches: Vec<BoxFuture<'_, Vec<DeliveryResult>>> = records
            .chunks(self.batch_size)
            .enumerate()
            .map(|(index, batch)| {
                let span = tracing::debug_span!("push_batch", index, size = batch.len());
                self.send_batch(payload, batch).instrument(span).boxed()
            })
            .collect();

        let per_batch: Vec<Vec<DeliveryResult>> =
            stream::iter(batches).buffered(self.concurrency).collect().await;

        let results: Vec<DeliveryResult> = per_batch.into_iter().flatten().collect();

        let pruned = self.prune_invalid(records, &results).await;
        if pruned > 0 {
            tracing::info!(count = pruned, "Pruned invalid push tokens");
        }

        results
    }

    async fn send_batch(&self, payload: &NotificationPayload, batch: &[TokenRecord]) -> Vec<DeliveryResult> {
        let tokens: Vec<String> = batch.iter().map(|r| r.token.clone()).collect();

        let outcomes = (|| async {
            let outcomes = tokio::time::timeout(self.send_timeout, self.provider.send_batch(payload, &tokens))
                .await
                .map_err(|_| PushError::Timeout)??;

            if outcomes.len() != tokens.len() {
                return Err(PushError::MalformedResponse(format!(
                    "expected {} per-token results, got {}",
                    tokens.len(),
                    outcomes.len()
                )));
            }
            Ok::<_, PushError>(outcomes)
        })
        .retry(&self.retry_strategy)
        .when(PushError::is_retryable)
        .notify(|e, duration| {
            self.metrics.batch_retries.add(1, &[]);
            tracing::warn!(error = %e, retry_in = ?duration, "Push batch failed, retrying");
        })
        .await;

        match outcomes {
            Ok(outcomes) => {
                let results: Vec<DeliveryResult> =
                    tokens.into_iter().zip(outcomes).map(|(token, outcome)| self.record(token, outcome)).collect();
                tracing::debug!(size = results.len(), "Push batch sent");
                results
            }
            Err(e) => {
                tracing::error!(error = %e, size = tokens.len(), "Push batch failed permanently");
                self.metrics.errors.add(tokens.len() as u64, &[KeyValue::new("reason", "batch_failed")]);
                tokens.into_iter().map(|token| DeliveryResult::failed(token, DeliveryErrorKind::Transient)).collect()
            }
        }
    }

    fn record(&self, token: String, outcome: TokenOutcome) -> DeliveryResult {
        match outcome {
            TokenOutcome::Delivered => self.metrics.sent.add(1, &[]),
            TokenOutcome::InvalidToken => {
                tracing::debug!(token = %token, "Token rejected as invalid");
                self.metrics.errors.add(1, &[KeyValue::new("reason", "invalid_token")]);
            }
            TokenOutcome::TransientError => {
                self.metrics.errors.add(1, &[KeyValue::new("reason", "transient")]);
            }
        }
        DeliveryResult::from_outcome(token, outcome)
    }

    /// Removes the records whose token came back invalid. Returns how many removals succeeded.
    async fn prune_invalid(&self, records: &[TokenRecord], results: &[DeliveryResult]) -> usize {
        let invalid: Vec<&TokenRecord> =
            records.iter().zip(results).filter(|(_, result)| result.is_invalid()).map(|(record, _)| record).collect();

        if invalid.is_empty() {
            return 0;
        }

        let removals = invalid.iter().map(|record| async move {
            match self.store.remove(&record.user_id).await {
                Ok(()) => true,
                Err(e) => {
                    // Left in place; the next dispatch reports it invalid again.
                    tracing::error!(error = %e, user_id = %record.user_id, "Failed to remove invalid push token");
                    false
                }
            }
        });

        let removed = futures::future::join_all(removals).await.into_iter().filter(|ok| *ok).count();
        self.metrics.invalidated_tokens.add(removed as u64, &[]);
        removed
    }
}
