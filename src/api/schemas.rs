use serde::{Deserialize, Serialize};

const MAX_TOKEN_LEN: usize = 4096;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPushTokenRequest {
    pub user_id: String,
    pub token: String,
}

impl RegisterPushTokenRequest {
    /// Validates the token registration payload.
    ///
    /// # Errors
    /// Returns an error if a field is blank or the token is excessively large.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("User id cannot be empty".into());
        }
        let trimmed = self.token.trim();
        if trimmed.is_empty() {
            return Err("Token cannot be empty".into());
        }
        if trimmed.len() > MAX_TOKEN_LEN {
            return Err(format!("Token is too long (max {MAX_TOKEN_LEN} characters)"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub event_source: String,
}
