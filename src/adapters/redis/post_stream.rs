use crate::adapters::events::{EventSource, InboundEvent};
use crate::adapters::redis::RedisClient;
use crate::config::PubSubConfig;
use crate::domain::post::Post;
use async_trait::async_trait;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamReadReply};
use std::sync::Arc;

const PAYLOAD_FIELD: &str = "payload";

/// Post-creation events carried by a Redis Stream and read through a consumer group.
///
/// Entries stay pending in the group until acknowledged. Entries that remain
/// pending longer than the visibility timeout are reclaimed by the next poll of
/// any consumer, which gives at-least-once delivery across crashes.
#[derive(Debug, Clone)]
pub struct PostEventStream {
    redis: Arc<RedisClient>,
    stream_key: String,
    group: String,
    consumer: String,
    visibility_timeout_ms: u64,
}

impl PostEventStream {
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, config: &PubSubConfig) -> Self {
        let consumer = config
            .consumer_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", config.consumer_group, uuid::Uuid::new_v4()));

        Self {
            redis,
            stream_key: config.stream_key.clone(),
            group: config.consumer_group.clone(),
            consumer,
            visibility_timeout_ms: config.visibility_timeout_secs.saturating_mul(1000),
        }
    }

    #[must_use]
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Creates the stream and the consumer group if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error if Redis rejects the command for any reason other than the group already existing.
    pub async fn ensure_group(&self) -> anyhow::Result<()> {
        let mut conn = self.redis.connection();
        let created: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match created {
            Ok(()) => {
                tracing::info!(stream = %self.stream_key, group = %self.group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Appends a post to the stream.
    ///
    /// # Errors
    /// Returns an error if the post cannot be encoded or the Redis operation fails.
    pub async fn publish(&self, post: &Post) -> anyhow::Result<String> {
        let payload = serde_json::to_string(post)?;
        let mut conn = self.redis.connection();
        let id: String = redis::cmd("XADD")
            .arg(&self.stream_key)
            .arg("*")
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(id)
    }

    async fn reclaim_stale(&self, max: usize) -> anyhow::Result<Vec<InboundEvent>> {
        let mut conn = self.redis.connection();
        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(&self.consumer)
            .arg(self.visibility_timeout_ms)
            .arg("0-0")
            .arg("COUNT")
            .arg(max)
            .query_async(&mut conn)
            .await?;

        if !reply.claimed.is_empty() {
            tracing::info!(count = reply.claimed.len(), "Reclaimed unacknowledged post events");
        }

        Ok(reply.claimed.iter().map(to_inbound).collect())
    }

    async fn read_new(&self, max: usize) -> anyhow::Result<Vec<InboundEvent>> {
        let mut conn = self.redis.connection();
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(max)
            .arg("STREAMS")
            .arg(&self.stream_key)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        Ok(reply.into_iter().flat_map(|r| r.keys).flat_map(|k| k.ids).map(|id| to_inbound(&id)).collect())
    }
}

fn to_inbound(entry: &StreamId) -> InboundEvent {
    InboundEvent {
        delivery_id: entry.id.clone(),
        // A missing field decodes as an empty payload, which the worker rejects and acknowledges.
        payload: entry.get::<Vec<u8>>(PAYLOAD_FIELD).unwrap_or_default(),
    }
}

#[async_trait]
impl EventSource for PostEventStream {
    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn poll(&self, max: usize) -> anyhow::Result<Vec<InboundEvent>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let mut events = self.reclaim_stale(max).await?;
        let remaining = max.saturating_sub(events.len());
        if remaining > 0 {
            events.extend(self.read_new(remaining).await?);
        }
        Ok(events)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn ack(&self, delivery_id: &str) -> anyhow::Result<()> {
        let mut conn = self.redis.connection();
        let _: i64 = redis::cmd("XACK")
            .arg(&self.stream_key)
            .arg(&self.group)
            .arg(delivery_id)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}
