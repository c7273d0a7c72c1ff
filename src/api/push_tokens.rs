use crate::api::AppState;
use crate::api::schemas::RegisterPushTokenRequest;
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Registers or replaces the push token of a user's device.
///
/// # Errors
/// Returns `AppError::BadRequest` if the payload is invalid.
/// Returns `AppError::Database` if the store operation fails.
pub async fn register_token(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPushTokenRequest>,
) -> Result<impl IntoResponse> {
    payload.validate().map_err(AppError::BadRequest)?;
    state.push_token_service.register_token(payload.user_id.trim(), payload.token.trim()).await?;
    Ok(StatusCode::OK)
}

/// Removes the push token of a user. Succeeds even if none was registered.
///
/// The path id is trimmed the same way registration trims it.
///
/// # Errors
/// Returns `AppError::BadRequest` if the user id is blank.
/// Returns `AppError::Database` if the store operation fails.
pub async fn unregister_token(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("User id cannot be empty".into()));
    }
    state.push_token_service.unregister_token(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
