use async_trait::async_trait;

/// A raw post-creation event as handed out by an event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Opaque handle used to acknowledge the event.
    pub delivery_id: String,
    pub payload: Vec<u8>,
}

/// At-least-once feed of post-creation events.
///
/// Events that are polled but never acknowledged are handed out again later.
#[async_trait]
pub trait EventSource: Send + Sync + std::fmt::Debug {
    /// Returns up to `max` events that are due for processing.
    ///
    /// # Errors
    /// Returns an error if the source is unreachable.
    async fn poll(&self, max: usize) -> anyhow::Result<Vec<InboundEvent>>;

    /// Marks an event as handled so it is never redelivered.
    ///
    /// # Errors
    /// Returns an error if the source is unreachable.
    async fn ack(&self, delivery_id: &str) -> anyhow::Result<()>;
}
