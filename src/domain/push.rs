use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub user_id: String,
    pub token: String,
    pub updated_at: OffsetDateTime,
}

impl TokenRecord {
    #[must_use]
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), token: token.into(), updated_at: OffsetDateTime::now_utc() }
    }
}

/// Per-token answer of the push backend for a single send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOutcome {
    Delivered,
    /// The backend will never accept this token again; it must be pruned.
    InvalidToken,
    TransientError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    InvalidToken,
    Transient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub token: String,
    pub success: bool,
    pub error_kind: Option<DeliveryErrorKind>,
}

impl DeliveryResult {
    #[must_use]
    pub fn delivered(token: impl Into<String>) -> Self {
        Self { token: token.into(), success: true, error_kind: None }
    }

    #[must_use]
    pub fn failed(token: impl Into<String>, kind: DeliveryErrorKind) -> Self {
        Self { token: token.into(), success: false, error_kind: Some(kind) }
    }

    #[must_use]
    pub fn from_outcome(token: impl Into<String>, outcome: TokenOutcome) -> Self {
        match outcome {
            TokenOutcome::Delivered => Self::delivered(token),
            TokenOutcome::InvalidToken => Self::failed(token, DeliveryErrorKind::InvalidToken),
            TokenOutcome::TransientError => Self::failed(token, DeliveryErrorKind::Transient),
        }
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        !self.success && self.error_kind == Some(DeliveryErrorKind::InvalidToken)
    }
}

/// Aggregate counts of one dispatch, for logs and metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub delivered: usize,
    pub invalid: usize,
    pub transient: usize,
}

impl DispatchSummary {
    #[must_use]
    pub fn from_results(results: &[DeliveryResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match (r.success, r.error_kind) {
                (true, _) => acc.delivered += 1,
                (false, Some(DeliveryErrorKind::InvalidToken)) => acc.invalid += 1,
                (false, _) => acc.transient += 1,
            }
            acc
        })
    }

    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.delivered + self.invalid + self.transient
    }
}
