use crate::adapters::push::PushError;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::minutes(60);
/// Cached tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::seconds(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a Google service account key file that the token exchange needs.
#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Reads a service account key file.
    ///
    /// # Errors
    /// Returns `PushError::Credentials` if the file is unreadable or not a service account key.
    pub fn from_file(path: &Path) -> Result<Self, PushError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PushError::Credentials(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// # Errors
    /// Returns `PushError::Credentials` if the document is not a service account key.
    pub fn from_json(raw: &str) -> Result<Self, PushError> {
        serde_json::from_str(raw).map_err(|e| PushError::Credentials(format!("invalid service account key: {e}")))
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: OffsetDateTime,
}

/// OAuth2 access tokens minted from a service account via the JWT bearer grant.
///
/// One token is shared by every send and refreshed shortly before it expires.
pub struct ServiceAccountAuth {
    client: reqwest::Client,
    client_email: String,
    token_uri: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    /// # Errors
    /// Returns `PushError::Credentials` if the private key is not an RSA PEM key.
    pub fn new(client: reqwest::Client, account: &ServiceAccountKey) -> Result<Self, PushError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| PushError::Credentials(format!("invalid private key: {e}")))?;

        Ok(Self {
            client,
            client_email: account.client_email.clone(),
            token_uri: account.token_uri.clone(),
            key,
            cached: Mutex::new(None),
        })
    }

    /// Returns a valid access token, exchanging a fresh assertion when the cached one is stale.
    ///
    /// # Errors
    /// Returns an error if the assertion cannot be signed or the token endpoint refuses it.
    pub async fn access_token(&self) -> Result<String, PushError> {
        let mut cached = self.cached.lock().await;
        let now = OffsetDateTime::now_utc();
        if let Some(token) = cached.as_ref().filter(|t| t.expires_at - EXPIRY_MARGIN > now) {
            return Ok(token.value.clone());
        }

        let token = self.exchange(now).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drops the cached token so the next call mints a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    fn assertion(&self, now: OffsetDateTime) -> Result<String, PushError> {
        let claims = Claims {
            iss: &self.client_email,
            scope: FCM_SCOPE,
            aud: &self.token_uri,
            iat: now.unix_timestamp(),
            exp: (now + ASSERTION_LIFETIME).unix_timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| PushError::Credentials(format!("failed to sign assertion: {e}")))
    }

    #[tracing::instrument(level = "debug", skip_all, fields(client_email = %self.client_email), err)]
    async fn exchange(&self, now: OffsetDateTime) -> Result<CachedToken, PushError> {
        let assertion = self.assertion(now)?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "OAuth2 token exchange rejected");
            return Err(PushError::Rejected { status: status.as_u16() });
        }

        let body: TokenResponse = response.json().await.map_err(|e| PushError::MalformedResponse(e.to_string()))?;
        tracing::debug!(expires_in = body.expires_in, "Obtained FCM access token");

        Ok(CachedToken { value: body.access_token, expires_at: now + Duration::seconds(body.expires_in) })
    }
}

/// Where the bearer token for FCM calls comes from.
#[derive(Debug)]
pub enum AccessTokenSource {
    /// Fixed token, e.g. issued by a sidecar or for local runs.
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl AccessTokenSource {
    /// # Errors
    /// Returns an error if a service account token cannot be obtained.
    pub async fn bearer(&self) -> Result<String, PushError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(auth) => auth.access_token().await,
        }
    }

    pub async fn invalidate(&self) {
        if let Self::ServiceAccount(auth) = self {
            auth.invalidate().await;
        }
    }
}
