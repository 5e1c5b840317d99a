//! notiteams service wiring.
//!
//! The binary composes the Postgres registry, the Bot Framework connector
//! and the deferred deletion reaper, and serves a liveness endpoint.

pub mod config;
pub mod health;
pub mod shutdown;

use axum::Router;
use axum::routing::get;
use notiteams_registry::Registry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the HTTP router.
pub fn router(registry: Arc<dyn Registry>) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}
