//! Web API router construction.

use crate::state::AppState;
use crate::web::{status, stories};
use axum::Router;
use axum::routing::get;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/beststories", get(stories::best_stories))
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        // Outermost: request/response logging with method, path, and latency.
        TraceLayer::new_for_http(),
        CompressionLayer::new()
            .zstd(true)
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}
