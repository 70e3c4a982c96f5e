//! Bounded fan-out of per-story fetches.

use crate::hn::{HnApi, HnApiError, Story, StoryId};
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Concurrency ceiling applied when the configured limit is zero.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// What came back from fanning out over one id list.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub stories: Vec<Story>,
    pub failures: Vec<(StoryId, HnApiError)>,
    /// Set when cancellation fired before every fetch finished. `stories`
    /// and `failures` then hold only the subset that completed in time.
    pub cancelled: bool,
}

/// Fetch every id with at most `concurrency` requests in flight.
///
/// One story failing is recorded and never aborts its siblings; results
/// arrive in completion order, not list order, so callers key by id.
/// Cancellation stops pulling from the stream and returns whatever
/// completed so far.
pub async fn fetch_stories(
    api: &HnApi,
    ids: &[StoryId],
    concurrency: usize,
    cancel: &CancellationToken,
) -> FetchOutcome {
    let limit = if concurrency == 0 { DEFAULT_CONCURRENCY } else { concurrency };

    let mut in_flight = stream::iter(ids.iter().copied())
        .map(|id| async move { (id, api.fetch_story(id, cancel).await) })
        .buffer_unordered(limit);

    let mut outcome = FetchOutcome::default();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                outcome.cancelled = true;
                break;
            }
            next = in_flight.next() => match next {
                Some((_, Ok(story))) => outcome.stories.push(story),
                Some((_, Err(HnApiError::Cancelled))) => {
                    outcome.cancelled = true;
                    break;
                }
                Some((id, Err(err))) => {
                    warn!(id, error = %err, "story fetch failed");
                    outcome.failures.push((id, err));
                }
                None => break,
            },
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api_for(server: &MockServer) -> HnApi {
        HnApi::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    async fn mount_item(server: &MockServer, id: StoryId, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": id, "title": format!("story {id}"), "score": id}))
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetches_every_id() {
        let server = MockServer::start().await;
        for id in [1, 2, 3] {
            mount_item(&server, id, Duration::ZERO).await;
        }

        let api = api_for(&server).await;
        let outcome = fetch_stories(&api, &[1, 2, 3], 10, &CancellationToken::new()).await;

        assert_eq!(outcome.stories.len(), 3);
        assert!(outcome.failures.is_empty());
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_rest() {
        let server = MockServer::start().await;
        mount_item(&server, 1, Duration::ZERO).await;
        Mock::given(method("GET"))
            .and(path("/item/2.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_item(&server, 3, Duration::ZERO).await;

        let api = api_for(&server).await;
        let outcome = fetch_stories(&api, &[1, 2, 3], 10, &CancellationToken::new()).await;

        let mut ids: Vec<StoryId> = outcome.stories.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, 2);
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn concurrency_limit_bounds_in_flight_requests() {
        let server = MockServer::start().await;
        let delay = Duration::from_millis(150);
        for id in [1, 2, 3, 4] {
            mount_item(&server, id, delay).await;
        }

        // Four items at 150ms each through a limit of two need at least two
        // waves, so anything under ~300ms would mean the bound leaked.
        let api = api_for(&server).await;
        let start = Instant::now();
        let outcome = fetch_stories(&api, &[1, 2, 3, 4], 2, &CancellationToken::new()).await;

        assert_eq!(outcome.stories.len(), 4);
        assert!(
            start.elapsed() >= Duration::from_millis(280),
            "finished too fast for a concurrency limit of 2: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn zero_concurrency_falls_back_to_the_default() {
        let server = MockServer::start().await;
        for id in [1, 2] {
            mount_item(&server, id, Duration::ZERO).await;
        }

        let api = api_for(&server).await;
        let outcome = fetch_stories(&api, &[1, 2], 0, &CancellationToken::new()).await;
        assert_eq!(outcome.stories.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_returns_the_completed_subset() {
        let server = MockServer::start().await;
        mount_item(&server, 1, Duration::ZERO).await;
        mount_item(&server, 2, Duration::from_secs(30)).await;

        let api = api_for(&server).await;
        let cancel = CancellationToken::new();
        let fire = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                cancel.cancel();
            })
        };

        let outcome = fetch_stories(&api, &[1, 2], 10, &cancel).await;
        fire.await.unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.stories.len() <= 1);
    }

    #[tokio::test]
    async fn empty_id_list_is_a_no_op() {
        let server = MockServer::start().await;
        let api = api_for(&server).await;
        let outcome = fetch_stories(&api, &[], 10, &CancellationToken::new()).await;

        assert!(outcome.stories.is_empty());
        assert!(outcome.failures.is_empty());
        assert!(!outcome.cancelled);
    }
}
