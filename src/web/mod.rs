//! Web API module.

pub mod error;
pub mod routes;
pub mod status;
pub mod stories;

pub use routes::*;

use crate::state::AppState;
use anyhow::Context;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::info;

/// Bind the listener and serve the API until `shutdown_rx` fires.
pub async fn serve(
    port: u16,
    state: AppState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let router = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "web server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("web server error")
}
