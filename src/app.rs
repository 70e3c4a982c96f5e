use crate::cache::{CacheService, StoryStore};
use crate::config::Config;
use crate::hn::HnApi;
use crate::state::AppState;
use crate::utils::fmt_duration;
use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Main application struct containing all long-lived components
pub struct App {
    config: Config,
    app_state: AppState,
    cache_service: CacheService,
}

impl App {
    /// Wire configuration into the upstream client, store, and services.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let hn_api = Arc::new(
            HnApi::new(&config.hacker_news_api_url, config.request_timeout())
                .context("Failed to create Hacker News API client")?,
        );
        let store = Arc::new(StoryStore::new());
        let cache_service = CacheService::new(
            hn_api,
            store.clone(),
            config.refresh_interval(),
            config.fetch_concurrency,
        );
        let app_state = AppState::new(store);

        Ok(App {
            config,
            app_state,
            cache_service,
        })
    }

    /// Run the web server and cache service until a shutdown signal
    /// arrives, then drain both within the configured timeout.
    pub async fn run(self) -> ExitCode {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let mut cache_handle = {
            let service = self.cache_service.clone();
            let rx = shutdown_tx.subscribe();
            tokio::spawn(async move { service.run(rx).await })
        };

        let mut web_handle = {
            let state = self.app_state.clone();
            let rx = shutdown_tx.subscribe();
            let port = self.config.port;
            tokio::spawn(async move { crate::web::serve(port, state, rx).await })
        };

        let mut exit = ExitCode::SUCCESS;
        tokio::select! {
            _ = shutdown_signal() => {
                info!("shutdown signal received, draining services");
            }
            result = &mut web_handle => {
                match result {
                    Ok(Ok(())) => warn!("web server exited unexpectedly"),
                    Ok(Err(e)) => error!(error = ?e, "web server failed"),
                    Err(e) => error!(error = ?e, "web server task panicked"),
                }
                exit = ExitCode::FAILURE;
            }
            result = &mut cache_handle => {
                if let Err(e) = result {
                    error!(error = ?e, "cache service task panicked");
                } else {
                    error!("cache service exited unexpectedly");
                }
                exit = ExitCode::FAILURE;
            }
        }

        let _ = shutdown_tx.send(());

        let drain = self.config.shutdown_timeout();
        let drained = timeout(drain, async {
            if !cache_handle.is_finished() {
                let _ = cache_handle.await;
            }
            if !web_handle.is_finished() {
                match web_handle.await {
                    Ok(Err(e)) => error!(error = ?e, "web server failed during shutdown"),
                    Err(e) => error!(error = ?e, "web server task panicked during shutdown"),
                    _ => {}
                }
            }
        })
        .await;

        match drained {
            Ok(()) => info!("all services stopped"),
            Err(_) => warn!(
                timeout = fmt_duration(drain),
                "services did not stop in time, exiting anyway"
            ),
        }
        exit
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
