//! REST API Routes Module
//!
//! Includes:
//! - Todo read/write routes
//! - Health check endpoints
//! - Prometheus scrape endpoint

pub mod health;
pub mod todos;

use axum::{middleware::from_fn, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Build the public API router served on the gateway address.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/todos",
            get(todos::get_todos)
                .post(todos::create_todo)
                .fallback(todos::method_not_allowed),
        )
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .route_layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
