pub mod fcm;
pub mod google_auth;

use crate::domain::notification::NotificationPayload;
use crate::domain::push::TokenOutcome;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a whole batch call, before any per-token answer came back.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Push backend did not answer in time")]
    Timeout,
    #[error("Push backend rejected the request with status {status}")]
    Rejected { status: u16 },
    #[error("Malformed push backend response: {0}")]
    MalformedResponse(String),
    #[error("Push backend credentials unusable: {0}")]
    Credentials(String),
}

impl PushError {
    /// Transport-level failures that may go away on resend.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Rejected { status } => *status == 429 || *status >= 500,
            Self::MalformedResponse(_) | Self::Credentials(_) => false,
        }
    }
}

#[async_trait]
pub trait PushProvider: Send + Sync + std::fmt::Debug {
    /// Largest number of tokens accepted by a single `send_batch` call.
    fn max_batch_size(&self) -> usize;

    /// Sends one notification to a batch of device tokens.
    ///
    /// On success the returned outcomes are positionally aligned with `tokens`.
    ///
    /// # Errors
    /// Returns a `PushError` if the batch as a whole could not be delivered; the
    /// caller treats every token of the batch as not yet attempted.
    async fn send_batch(
        &self,
        payload: &NotificationPayload,
        tokens: &[String],
    ) -> Result<Vec<TokenOutcome>, PushError>;
}
