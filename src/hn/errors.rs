//! Error types for the Hacker News API client.

/// Errors produced by [`HnApi`](super::HnApi) calls.
///
/// `Unavailable` covers the transport: connection failures, timeouts, and
/// non-success statuses. `Decode` means the endpoint answered but the body
/// was not what we expected. Neither is retried here.
#[derive(Debug, thiserror::Error)]
pub enum HnApiError {
    #[error("Hacker News API unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("request cancelled")]
    Cancelled,
}
