use crate::adapters::events::{EventSource, InboundEvent};
use crate::config::PubSubConfig;
use crate::domain::post::Post;
use crate::services::post_notification_service::PostNotificationService;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    events: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("post-notifier");
        Self {
            events: meter
                .u64_counter("post_events_processed_total")
                .with_description("Total number of post-creation events handled, by outcome")
                .build(),
        }
    }
}

/// How a single event was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Dispatched,
    /// Undecodable payload; acknowledged so it is never redelivered.
    Discarded,
    /// Left unacknowledged for redelivery.
    Deferred,
}

impl EventOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Dispatched => "dispatched",
            Self::Discarded => "discarded",
            Self::Deferred => "deferred",
        }
    }
}

/// Polls the event source and drives one notification broadcast per created post.
#[derive(Debug)]
pub struct PostEventWorker {
    source: Arc<dyn EventSource>,
    service: PostNotificationService,
    poll_interval: Duration,
    poll_batch_size: usize,
    metrics: Metrics,
}

impl PostEventWorker {
    #[must_use]
    pub fn new(source: Arc<dyn EventSource>, service: PostNotificationService, config: &PubSubConfig) -> Self {
        Self {
            source,
            service,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            poll_batch_size: config.poll_batch_size.max(1),
            metrics: Metrics::new(),
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!("Post event worker started");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_pending()
                        .instrument(tracing::debug_span!("post_event_iteration"))
                        .await
                    {
                        tracing::error!(error = %e, "Failed to poll post events");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("Post event worker shutting down...");
    }

    /// Drains the events currently due, one at a time. Returns how many were polled.
    ///
    /// # Errors
    /// Returns an error if the event source cannot be polled.
    pub async fn process_pending(&self) -> anyhow::Result<usize> {
        let events = self.source.poll(self.poll_batch_size).await?;
        if events.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = events.len(), "Processing post events");
        for event in &events {
            let outcome = self
                .handle_event(event)
                .instrument(tracing::info_span!("post_event", delivery_id = %event.delivery_id))
                .await;
            self.metrics.events.add(1, &[KeyValue::new("outcome", outcome.label())]);
        }

        Ok(events.len())
    }

    async fn handle_event(&self, event: &InboundEvent) -> EventOutcome {
        let outcome = match Post::from_slice(&event.payload) {
            Ok(post) => match self.service.handle_post_created(&post).await {
                Ok(_) => EventOutcome::Dispatched,
                Err(e) => {
                    tracing::warn!(error = %e, "Post notification failed, leaving event for redelivery");
                    return EventOutcome::Deferred;
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable post event");
                EventOutcome::Discarded
            }
        };

        if let Err(e) = self.source.ack(&event.delivery_id).await {
            // The event will be redelivered and broadcast a second time.
            tracing::error!(error = %e, "Failed to acknowledge post event");
        }
        outcome
    }
}
