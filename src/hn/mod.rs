//! Client for the Hacker News Firebase API.
//!
//! Two endpoints matter to this service: `beststories.json`, the ranked
//! array of best-story ids, and `item/{id}.json`, one story's detail.
//! Every call honors a cancellation token and returns as soon as it fires.
//! There is no retry layer; a failed fetch is the caller's problem.

pub mod errors;
mod json;
mod models;

pub use errors::HnApiError;
pub use models::{Story, StoryId};

use anyhow::Context;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// HTTP client for the Hacker News API.
///
/// Cheap to clone and share behind an `Arc`; the inner `reqwest::Client`
/// pools connections across concurrent item fetches.
#[derive(Debug, Clone)]
pub struct HnApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HnApi {
    /// Build a client against `base_url`, e.g.
    /// `https://hacker-news.firebaseio.com/v0/`.
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid Hacker News API base URL")?;

        // Url::join treats the last segment as a file unless the base ends
        // with a slash, which would silently drop `/v0`.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http, base_url })
    }

    /// Fetch the ranked list of best-story ids, best first.
    pub async fn fetch_best_ids(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<StoryId>, HnApiError> {
        self.get_json("beststories.json", cancel).await
    }

    /// Fetch one story by id.
    pub async fn fetch_story(
        &self,
        id: StoryId,
        cancel: &CancellationToken,
    ) -> Result<Story, HnApiError> {
        self.get_json(&format!("item/{id}.json"), cancel).await
    }

    /// GET `path` relative to the base URL and decode the JSON body,
    /// racing the request against cancellation.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<T, HnApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| HnApiError::Unavailable(anyhow::anyhow!("invalid endpoint path: {e}")))?;

        tokio::select! {
            _ = cancel.cancelled() => Err(HnApiError::Cancelled),
            result = self.request(url) => result,
        }
    }

    async fn request<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, HnApiError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HnApiError::Unavailable(e.into()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HnApiError::Unavailable(anyhow::anyhow!(
                "{url} returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| HnApiError::Unavailable(e.into()))?;

        json::decode_json(&body).map_err(|source| HnApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
