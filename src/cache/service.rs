//! Cache lifecycle: the initial build, periodic refreshes, and the
//! background loop that drives them.
//!
//! Build and refresh share one async mutex, so at most one cache-populating
//! cycle runs at a time. The failure handling is deliberately asymmetric: a
//! failed build resets the phase so the next cycle starts over, while a
//! failed refresh leaves the last good snapshot serving.

use crate::cache::fetch;
use crate::cache::store::{CachePhase, StoryStore};
use crate::hn::{HnApi, HnApiError};
use crate::utils::fmt_duration;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, broadcast};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for an in-flight cycle before abandoning it.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The initial build could not fetch the ranked id list. The cache is
    /// back to square one and the next cycle retries from scratch.
    #[error("cache build failed: {0}")]
    BuildFailed(#[source] HnApiError),

    /// A refresh could not fetch the ranked id list. The previous snapshot
    /// is still serving.
    #[error("cache refresh failed: {0}")]
    RefreshFailed(#[source] HnApiError),

    /// The cycle's cancellation token fired mid-flight.
    #[error("cache cycle cancelled")]
    Cancelled,
}

/// Why a fetch-and-store pass stopped early.
enum CycleFailure {
    IdList(HnApiError),
    Cancelled,
}

struct CycleStats {
    fetched: usize,
    failed: usize,
}

/// Drives the story cache: builds it once, then refreshes on an interval.
///
/// Clones share the same store and cycle lock, so two handles can never run
/// overlapping cycles.
#[derive(Clone)]
pub struct CacheService {
    api: Arc<HnApi>,
    store: Arc<StoryStore>,
    refresh_interval: Duration,
    fetch_concurrency: usize,
    cycle_lock: Arc<Mutex<()>>,
}

impl CacheService {
    pub fn new(
        api: Arc<HnApi>,
        store: Arc<StoryStore>,
        refresh_interval: Duration,
        fetch_concurrency: usize,
    ) -> Self {
        Self {
            api,
            store,
            refresh_interval,
            fetch_concurrency,
            cycle_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Populate the cache from scratch and mark it ready.
    ///
    /// Waits for any in-flight cycle first, and no-ops if that cycle already
    /// made the cache ready. Failure or cancellation resets the phase to
    /// `Uninitialized`; stories upserted before the interruption stay put,
    /// which leaves the store stale but never invalid.
    pub async fn build(&self, cancel: &CancellationToken) -> Result<(), CacheError> {
        let _guard = self.cycle_lock.lock().await;
        if self.store.is_ready() {
            debug!("cache already built, nothing to do");
            return Ok(());
        }
        self.build_locked(cancel).await
    }

    /// Re-fetch the ranked list and every listed story, superseding stale
    /// values in place. Readiness is never reset here; a cache that was
    /// somehow not built yet gets a full build instead.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<(), CacheError> {
        let _guard = self.cycle_lock.lock().await;
        if !self.store.is_ready() {
            return self.build_locked(cancel).await;
        }
        self.refresh_locked(cancel).await
    }

    async fn build_locked(&self, cancel: &CancellationToken) -> Result<(), CacheError> {
        self.store.set_phase(CachePhase::Building);
        info!("building story cache");
        let start = Instant::now();

        match self.fetch_and_store(cancel).await {
            Ok(stats) => {
                self.store.set_phase(CachePhase::Ready);
                info!(
                    stories = self.store.len(),
                    failed = stats.failed,
                    duration = fmt_duration(start.elapsed()),
                    "story cache built"
                );
                Ok(())
            }
            Err(CycleFailure::Cancelled) => {
                self.store.set_phase(CachePhase::Uninitialized);
                debug!("build cancelled");
                Err(CacheError::Cancelled)
            }
            Err(CycleFailure::IdList(err)) => {
                self.store.set_phase(CachePhase::Uninitialized);
                Err(CacheError::BuildFailed(err))
            }
        }
    }

    async fn refresh_locked(&self, cancel: &CancellationToken) -> Result<(), CacheError> {
        self.store.set_phase(CachePhase::Refreshing);
        debug!("refreshing story cache");
        let start = Instant::now();

        let result = self.fetch_and_store(cancel).await;
        // Whatever happened above, the previous snapshot keeps serving.
        self.store.set_phase(CachePhase::Ready);

        match result {
            Ok(stats) => {
                info!(
                    fetched = stats.fetched,
                    failed = stats.failed,
                    duration = fmt_duration(start.elapsed()),
                    "story cache refreshed"
                );
                Ok(())
            }
            Err(CycleFailure::Cancelled) => {
                debug!("refresh cancelled");
                Err(CacheError::Cancelled)
            }
            Err(CycleFailure::IdList(err)) => Err(CacheError::RefreshFailed(err)),
        }
    }

    /// Fetch the ranked id list, then every listed story, upserting each
    /// success as it lands. Per-story failures are counted, not fatal; only
    /// an id-list failure or cancellation aborts the pass. On cancellation
    /// the subset fetched so far is still upserted.
    async fn fetch_and_store(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleStats, CycleFailure> {
        let ids = self.api.fetch_best_ids(cancel).await.map_err(|err| match err {
            HnApiError::Cancelled => CycleFailure::Cancelled,
            other => CycleFailure::IdList(other),
        })?;
        debug!(ids = ids.len(), "fetched ranked id list");

        // Skip the fan-out if cancellation fired while the id list was in flight.
        if cancel.is_cancelled() {
            return Err(CycleFailure::Cancelled);
        }

        let mut outcome =
            fetch::fetch_stories(&self.api, &ids, self.fetch_concurrency, cancel).await;

        let stats = CycleStats {
            fetched: outcome.stories.len(),
            failed: outcome.failures.len(),
        };
        for story in outcome.stories.drain(..) {
            self.store.upsert(story);
        }

        if outcome.cancelled {
            return Err(CycleFailure::Cancelled);
        }
        Ok(stats)
    }

    /// Run the build/refresh loop until `shutdown_rx` fires.
    ///
    /// The first cycle builds; later cycles refresh. The interval applies
    /// between cycles, so an overrunning cycle delays the next one instead
    /// of stacking on top of it. Shutdown cancels the in-flight cycle and
    /// gives it a grace period to finish.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            refresh_interval = fmt_duration(self.refresh_interval),
            concurrency = self.fetch_concurrency,
            "cache service started"
        );

        loop {
            let cancel = CancellationToken::new();
            let mut cycle = {
                let service = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move { service.run_cycle(&cancel).await })
            };

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("cache service received shutdown signal");
                    cancel.cancel();
                    if time::timeout(SHUTDOWN_DRAIN, cycle).await.is_err() {
                        warn!(
                            timeout = fmt_duration(SHUTDOWN_DRAIN),
                            "in-flight cycle did not stop in time, abandoning it"
                        );
                    }
                    break;
                }
                joined = &mut cycle => {
                    if let Err(e) = joined {
                        error!(error = ?e, "cache cycle task panicked");
                    }
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("cache service received shutdown signal");
                    break;
                }
                _ = time::sleep(self.refresh_interval) => {}
            }
        }

        info!("cache service exiting gracefully");
    }

    /// One scheduler tick: build when the cache is not ready, refresh
    /// otherwise. Errors are logged here, never escalated; the loop always
    /// gets another chance next tick.
    async fn run_cycle(&self, cancel: &CancellationToken) {
        if self.store.is_ready() {
            match self.refresh(cancel).await {
                Ok(()) => {}
                Err(CacheError::Cancelled) => debug!("refresh cycle cancelled"),
                Err(e) => warn!(error = ?e, "refresh failed, serving the previous snapshot"),
            }
        } else {
            match self.build(cancel).await {
                Ok(()) => {}
                Err(CacheError::Cancelled) => debug!("build cycle cancelled"),
                Err(e) => error!(error = ?e, "build failed, retrying next cycle"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::query::{self, QueryError};
    use crate::hn::StoryId;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> (CacheService, Arc<StoryStore>) {
        let api = Arc::new(HnApi::new(&server.uri(), Duration::from_secs(5)).unwrap());
        let store = Arc::new(StoryStore::new());
        let service = CacheService::new(api, store.clone(), Duration::from_secs(3600), 10);
        (service, store)
    }

    async fn mount_ids(server: &MockServer, ids: &[StoryId]) {
        Mock::given(method("GET"))
            .and(path("/beststories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(ids)))
            .mount(server)
            .await;
    }

    async fn mount_story(server: &MockServer, id: StoryId, score: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "title": format!("story {id}"),
                "url": format!("https://example.com/{id}"),
                "by": "tester",
                "time": 1_570_887_781,
                "score": score,
                "descendants": 7,
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn build_populates_the_store_and_marks_it_ready() {
        let server = MockServer::start().await;
        mount_ids(&server, &[10, 20]).await;
        mount_story(&server, 10, 5).await;
        mount_story(&server, 20, 9).await;

        let (service, store) = service_for(&server);
        assert_eq!(
            query::top_stories(&store, 1),
            Err(QueryError::CacheNotReady)
        );

        service.build(&CancellationToken::new()).await.unwrap();

        assert_eq!(store.phase(), CachePhase::Ready);
        assert_eq!(store.len(), 2);

        let top = query::top_stories(&store, 1).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, 20);
        assert_eq!(top[0].score, 9);

        let all: Vec<StoryId> = query::top_stories(&store, 5)
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(all, vec![20, 10]);
    }

    #[tokio::test]
    async fn concurrent_builds_fetch_the_id_list_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/beststories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1])))
            .expect(1)
            .mount(&server)
            .await;
        mount_story(&server, 1, 3).await;

        let (service, store) = service_for(&server);
        let first = CancellationToken::new();
        let second = CancellationToken::new();
        let (a, b) = tokio::join!(service.build(&first), service.build(&second));

        a.unwrap();
        b.unwrap();
        assert!(store.is_ready());
        // The expect(1) on the mock verifies the second build was a no-op.
    }

    #[tokio::test]
    async fn item_failures_do_not_fail_the_build() {
        let server = MockServer::start().await;
        mount_ids(&server, &[1, 2, 3]).await;
        mount_story(&server, 1, 4).await;
        Mock::given(method("GET"))
            .and(path("/item/2.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_story(&server, 3, 8).await;

        let (service, store) = service_for(&server);
        service.build(&CancellationToken::new()).await.unwrap();

        assert!(store.is_ready());
        let ids: Vec<StoryId> = query::top_stories(&store, 10)
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn id_list_failure_resets_the_build_and_a_retry_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/beststories.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (service, store) = service_for(&server);
        let err = service.build(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CacheError::BuildFailed(_)), "got: {err:?}");
        assert_eq!(store.phase(), CachePhase::Uninitialized);
        assert!(!store.is_ready());

        // Upstream comes back; the next cycle builds from scratch.
        server.reset().await;
        mount_ids(&server, &[5]).await;
        mount_story(&server, 5, 2).await;

        service.build(&CancellationToken::new()).await.unwrap();
        assert!(store.is_ready());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn refresh_supersedes_stale_scores() {
        let server = MockServer::start().await;
        mount_ids(&server, &[10]).await;
        mount_story(&server, 10, 5).await;

        let (service, store) = service_for(&server);
        service.build(&CancellationToken::new()).await.unwrap();
        assert_eq!(query::top_stories(&store, 1).unwrap()[0].score, 5);

        server.reset().await;
        mount_ids(&server, &[10]).await;
        mount_story(&server, 10, 42).await;

        service.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(store.phase(), CachePhase::Ready);
        assert_eq!(query::top_stories(&store, 1).unwrap()[0].score, 42);
    }

    #[tokio::test]
    async fn refresh_failure_keeps_the_cache_serving() {
        let server = MockServer::start().await;
        mount_ids(&server, &[10, 20]).await;
        mount_story(&server, 10, 5).await;
        mount_story(&server, 20, 9).await;

        let (service, store) = service_for(&server);
        service.build(&CancellationToken::new()).await.unwrap();

        server.reset().await;
        Mock::given(method("GET"))
            .and(path("/beststories.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = service.refresh(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CacheError::RefreshFailed(_)), "got: {err:?}");

        // Stale beats empty.
        assert!(store.is_ready());
        assert_eq!(store.phase(), CachePhase::Ready);
        assert_eq!(query::top_stories(&store, 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn refresh_keeps_stories_that_left_the_ranked_list() {
        let server = MockServer::start().await;
        mount_ids(&server, &[10, 20]).await;
        mount_story(&server, 10, 5).await;
        mount_story(&server, 20, 9).await;

        let (service, store) = service_for(&server);
        service.build(&CancellationToken::new()).await.unwrap();

        server.reset().await;
        mount_ids(&server, &[10]).await;
        mount_story(&server, 10, 6).await;

        service.refresh(&CancellationToken::new()).await.unwrap();

        // 20 fell off the list but its last known value still counts.
        let ids: Vec<StoryId> = query::top_stories(&store, 10)
            .unwrap()
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![20, 10]);
    }

    #[tokio::test]
    async fn cancelled_build_resets_the_phase() {
        let server = MockServer::start().await;
        mount_ids(&server, &[1]).await;
        mount_story(&server, 1, 1).await;

        let (service, store) = service_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = service.build(&cancel).await.unwrap_err();
        assert!(matches!(err, CacheError::Cancelled), "got: {err:?}");
        assert_eq!(store.phase(), CachePhase::Uninitialized);
    }

    #[tokio::test]
    async fn refresh_on_an_unbuilt_cache_builds_it() {
        let server = MockServer::start().await;
        mount_ids(&server, &[1]).await;
        mount_story(&server, 1, 1).await;

        let (service, store) = service_for(&server);
        service.refresh(&CancellationToken::new()).await.unwrap();

        assert!(store.is_ready());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_an_in_flight_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/beststories.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([1]))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let (service, store) = service_for(&server);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let runner = tokio::spawn(async move { service.run(shutdown_rx).await });

        // Let the first cycle get stuck in the slow id fetch, then pull the plug.
        time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(()).unwrap();

        time::timeout(Duration::from_secs(2), runner)
            .await
            .expect("run() should drain well inside the grace period")
            .unwrap();
        assert!(!store.is_ready());
    }
}
