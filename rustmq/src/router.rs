//! HTTP router for the queue service

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use rustmq_queue::engine::Broker;
use rustmq_queue::handlers;

/// Create the application router
pub fn create_router(broker: Arc<Broker>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // The query API accepts requests on any path; the queue is addressed
        // by the QueueUrl parameter, not the request path
        .route("/", any(handlers::handle_request))
        .route("/*path", any(handlers::handle_request))
        .layer(TraceLayer::new_for_http())
        .with_state(broker)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, r#"{"status": "running", "services": ["queue"]}"#)
}
