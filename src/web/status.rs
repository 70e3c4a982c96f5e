//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;

use crate::cache::CachePhase;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    status: &'static str,
    version: String,
    commit: String,
    cache_phase: CachePhase,
    stories: usize,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status endpoint: build info plus the cache's phase and size.
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let phase = state.store.phase();
    Json(StatusResponse {
        status: if phase.is_ready() { "active" } else { "starting" },
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        cache_phase: phase,
        stories: state.store.len(),
    })
}
