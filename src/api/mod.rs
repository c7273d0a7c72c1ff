use crate::config::Config;
use crate::services::health_service::HealthService;
use crate::services::push_token_service::PushTokenService;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{
    Router,
    routing::{delete, get, put},
};
use std::time::Duration;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub mod health;
pub mod push_tokens;
pub mod schemas;

#[derive(Clone, Debug)]
pub struct AppState {
    pub push_token_service: PushTokenService,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

/// Configures the token registration router.
pub fn app_router(config: &Config, state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/push/token", put(push_tokens::register_token))
        .route("/push/token/{user_id}", delete(push_tokens::unregister_token));

    Router::new()
        .nest("/v1", api_routes)
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Configures the liveness/readiness router served on the management port.
pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}
