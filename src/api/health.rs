use crate::api::MgmtState;
use crate::api::schemas::HealthResponse;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

/// Liveness check: returns 200 OK as long as the server is running.
pub async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness check: checks connectivity to the token store and the event source.
pub async fn readyz(State(state): State<MgmtState>) -> impl IntoResponse {
    let (db_res, events_res) =
        tokio::join!(state.health_service.check_token_store(), state.health_service.check_event_source());

    let mut status_code = StatusCode::OK;
    let db_status = if let Err(e) = db_res {
        tracing::warn!(error = %e, component = "token_store", "Readiness check failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let events_status = if let Err(e) = events_res {
        tracing::warn!(error = %e, component = "event_source", "Readiness check failed");
        status_code = StatusCode::SERVICE_UNAVAILABLE;
        "error"
    } else {
        "ok"
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "error" }.to_string(),
        database: db_status.to_string(),
        event_source: events_status.to_string(),
    };

    (status_code, Json(response))
}
