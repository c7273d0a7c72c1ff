use crate::adapters::push::google_auth::{AccessTokenSource, ServiceAccountAuth, ServiceAccountKey};
use crate::adapters::push::{PushError, PushProvider};
use crate::config::FcmConfig;
use crate::domain::notification::NotificationPayload;
use crate::domain::push::TokenOutcome;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest batch handed to one `send_batch` call. The v1 API has no multicast,
/// so a batch is fanned out as single sends.
pub const FCM_MAX_BATCH_SIZE: usize = 500;

const FCM_ERROR_TYPE: &str = "type.googleapis.com/google.firebase.fcm.v1.FcmError";

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: Notification<'a>,
    android: AndroidConfig<'a>,
    data: Data<'a>,
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct AndroidConfig<'a> {
    notification: AndroidNotification<'a>,
}

#[derive(Debug, Serialize)]
struct AndroidNotification<'a> {
    click_action: &'a str,
}

#[derive(Debug, Serialize)]
struct Data<'a> {
    click_action: &'a str,
}

impl<'a> SendRequest<'a> {
    fn new(payload: &'a NotificationPayload, token: &'a str) -> Self {
        Self {
            message: Message {
                token,
                notification: Notification { title: payload.title.as_str(), body: payload.body.as_str() },
                android: AndroidConfig {
                    notification: AndroidNotification { click_action: payload.click_action.as_str() },
                },
                data: Data { click_action: payload.click_action.as_str() },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

impl ErrorStatus {
    /// The FCM-specific error code if present, else the canonical status.
    fn code(&self) -> &str {
        self.details
            .iter()
            .find(|d| d.kind == FCM_ERROR_TYPE)
            .and_then(|d| d.error_code.as_deref())
            .unwrap_or(&self.status)
    }
}

/// Maps a failed v1 send onto a per-token outcome, or onto an error when the
/// failure says nothing about the token itself.
fn classify(status: u16, code: &str) -> Result<TokenOutcome, PushError> {
    match code {
        // The payload is fixed, so an invalid argument can only be the token.
        "UNREGISTERED" | "INVALID_ARGUMENT" | "SENDER_ID_MISMATCH" | "NOT_FOUND" => Ok(TokenOutcome::InvalidToken),
        "UNAUTHENTICATED" | "PERMISSION_DENIED" | "THIRD_PARTY_AUTH_ERROR" => Err(PushError::Rejected { status }),
        _ if status == 401 || status == 403 || status == 429 || status >= 500 => Err(PushError::Rejected { status }),
        _ => Ok(TokenOutcome::TransientError),
    }
}

const fn is_auth_failure(error: &PushError) -> bool {
    matches!(error, PushError::Rejected { status: 401 | 403 })
}

/// Firebase Cloud Messaging over the HTTP v1 API.
#[derive(Debug)]
pub struct FcmPushProvider {
    client: reqwest::Client,
    send_url: String,
    credentials: AccessTokenSource,
    concurrency: usize,
}

impl FcmPushProvider {
    /// Builds a provider with its own HTTP client.
    ///
    /// A configured access token wins over a service account file. The project id
    /// falls back to the one in the service account file.
    ///
    /// # Errors
    /// Returns `PushError::Credentials` if no usable credentials or project id are configured,
    /// `PushError::Transport` if the HTTP client cannot be initialized.
    pub fn new(config: &FcmConfig) -> Result<Self, PushError> {
        let client = reqwest::Client::builder().connect_timeout(Duration::from_secs(5)).build()?;

        let (credentials, account_project) = match (&config.access_token, &config.credentials_file) {
            (Some(token), _) => (AccessTokenSource::Static(token.clone()), None),
            (None, Some(path)) => {
                let key = ServiceAccountKey::from_file(path)?;
                let auth = ServiceAccountAuth::new(client.clone(), &key)?;
                (AccessTokenSource::ServiceAccount(auth), key.project_id)
            }
            (None, None) => {
                return Err(PushError::Credentials(
                    "either an FCM access token or a service account file is required".into(),
                ));
            }
        };

        let project_id = config
            .project_id
            .clone()
            .or(account_project)
            .ok_or_else(|| PushError::Credentials("FCM project id is not configured".into()))?;

        let send_url = format!("{}/v1/projects/{project_id}/messages:send", config.base_url.trim_end_matches('/'));
        tracing::info!(project_id = %project_id, "FCM provider configured");

        Ok(Self { client, send_url, credentials, concurrency: config.concurrency.max(1) })
    }

    async fn send_one(
        &self,
        bearer: &str,
        payload: &NotificationPayload,
        token: &str,
    ) -> Result<TokenOutcome, PushError> {
        let request = SendRequest::new(payload, token);
        let response = self.client.post(&self.send_url).bearer_auth(bearer).json(&request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(TokenOutcome::Delivered);
        }

        let code = response.json::<ErrorResponse>().await.map(|r| r.error.code().to_string()).unwrap_or_default();
        tracing::debug!(status = status.as_u16(), code = %code, "FCM send failed");
        classify(status.as_u16(), &code)
    }
}

#[async_trait]
impl PushProvider for FcmPushProvider {
    fn max_batch_size(&self) -> usize {
        FCM_MAX_BATCH_SIZE
    }

    #[tracing::instrument(level = "debug", skip_all, fields(size = tokens.len()), err)]
    async fn send_batch(
        &self,
        payload: &NotificationPayload,
        tokens: &[String],
    ) -> Result<Vec<TokenOutcome>, PushError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let bearer = self.credentials.bearer().await?;

        let sends: Vec<BoxFuture<'_, Result<TokenOutcome, PushError>>> =
            tokens.iter().map(|token| self.send_one(&bearer, payload, token).boxed()).collect();
        let answers: Vec<Result<TokenOutcome, PushError>> =
            stream::iter(sends).buffered(self.concurrency).collect().await;

        let mut outcomes = Vec::with_capacity(answers.len());
        let mut failed = 0;
        let mut first_error = None;
        for answer in answers {
            match answer {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if is_auth_failure(&e) => {
                    self.credentials.invalidate().await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "FCM send failed before a per-token answer");
                    outcomes.push(TokenOutcome::TransientError);
                    failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }

        // No send got through at all: surface it as a batch failure so the whole batch is retried.
        match first_error {
            Some(e) if failed == tokens.len() => Err(e),
            _ => Ok(outcomes),
        }
    }
}
