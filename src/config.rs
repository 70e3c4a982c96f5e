//! Environment-driven configuration.

use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration, extracted from the environment by figment.
///
/// `HACKER_NEWS_API_URL` is the only required value; everything else
/// defaults to what production runs with.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Hacker News API, e.g.
    /// `https://hacker-news.firebaseio.com/v0/`.
    pub hacker_news_api_url: String,

    /// Seconds to wait between cache refresh cycles.
    #[serde(default = "default_cache_refresh_seconds")]
    pub cache_refresh_seconds: u64,

    /// Maximum in-flight story fetches per cycle. Zero means "use the
    /// built-in default" rather than "no fetches".
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Per-request timeout for upstream calls, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds to wait for services to drain on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.cache_refresh_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

fn default_cache_refresh_seconds() -> u64 {
    120_000
}

fn default_fetch_concurrency() -> usize {
    100
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> u64 {
    10
}
