use super::handlers;
use super::state::CallbackState;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

/// Create the OAuth callback router
pub fn create_router(state: CallbackState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // OAuth redirect target
        .route("/", get(handlers::oauth_callback))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
