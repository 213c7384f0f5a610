use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::http::context::WebContext;
use crate::http::handle_webhooks::{handle_cast_webhook, handle_health, handle_member_webhook};

/// Build the intake router.
pub fn build_router(web_context: WebContext) -> Router {
    Router::new()
        .route("/webhooks/casts", post(handle_cast_webhook))
        .route("/webhooks/members", post(handle_member_webhook))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(web_context)
}
