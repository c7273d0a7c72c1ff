use crate::adapters::redis::RedisClient;
use crate::adapters::token_store::TokenStore;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
struct Metrics {
    status: Gauge<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("post-notifier");
        Self {
            status: meter
                .i64_gauge("post_notifier_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    store: Arc<dyn TokenStore>,
    pubsub: Option<Arc<RedisClient>>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, pubsub: Option<Arc<RedisClient>>, config: HealthConfig) -> Self {
        Self { store, pubsub, config, metrics: Metrics::new() }
    }

    fn report(&self, component: &'static str, result: Result<(), String>) -> Result<(), String> {
        let value = i64::from(result.is_ok());
        self.metrics.status.record(value, &[KeyValue::new("component", component)]);
        result
    }

    /// Checks token store connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the store is unreachable.
    pub async fn check_token_store(&self) -> Result<(), String> {
        let db_timeout = Duration::from_millis(self.config.db_timeout_ms);

        let result = match timeout(db_timeout, self.store.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Token store check failed: {e}")),
            Err(_) => Err("Token store check timed out".to_string()),
        };
        self.report("token_store", result)
    }

    /// Checks event source connectivity. Always healthy when no Redis is wired in.
    ///
    /// # Errors
    /// Returns a string describing the failure if Redis is unreachable.
    pub async fn check_event_source(&self) -> Result<(), String> {
        let Some(pubsub) = &self.pubsub else {
            return Ok(());
        };
        let pubsub_timeout = Duration::from_millis(self.config.pubsub_timeout_ms);

        let result = match timeout(pubsub_timeout, pubsub.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("Event source check failed: {e}")),
            Err(_) => Err("Event source check timed out".to_string()),
        };
        self.report("event_source", result)
    }
}
