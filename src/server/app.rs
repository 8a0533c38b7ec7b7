use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{
    handlers::{health, process_batch, process_image},
    limits::rate_limit,
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    // Upload routes, rate limited per client
    let api_routes = Router::new()
        .route("/process", post(process_image))
        .route("/batch", post(process_batch))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(state.limits.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.limits.request_timeout_secs),
        ))
        .with_state(state)
}
