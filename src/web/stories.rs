//! Best-stories read endpoint.

use crate::cache::query::{self, QueryError};
use crate::hn::Story;
use crate::state::AppState;
use crate::web::error::{ApiError, ApiErrorCode};
use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct BestStoriesParams {
    count: Option<i64>,
}

/// One story shaped for API output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySummary {
    title: String,
    uri: Option<String>,
    posted_by: String,
    time: i64,
    score: i64,
    comment_count: i64,
}

impl From<Story> for StorySummary {
    fn from(story: Story) -> Self {
        Self {
            title: story.title,
            uri: story.url,
            posted_by: story.by,
            time: story.time,
            score: story.score,
            comment_count: story.descendants,
        }
    }
}

/// `GET /api/beststories?count=N`
///
/// The top `count` cached stories by score, highest first. Responds 503
/// until the first build completes so clients can tell "not ready" apart
/// from "no stories".
pub(super) async fn best_stories(
    State(state): State<AppState>,
    Query(params): Query<BestStoriesParams>,
) -> Result<Json<Vec<StorySummary>>, ApiError> {
    let Some(count) = params.count else {
        return Err(ApiError::new(
            ApiErrorCode::InvalidCount,
            "missing required query parameter 'count'",
        ));
    };
    if count < 0 {
        return Err(ApiError::new(
            ApiErrorCode::InvalidCount,
            format!("count must be non-negative, got {count}"),
        ));
    }

    match query::top_stories(&state.store, count as usize) {
        Ok(stories) => {
            debug!(count, returned = stories.len(), "served best stories");
            Ok(Json(stories.into_iter().map(StorySummary::from).collect()))
        }
        Err(QueryError::CacheNotReady) => Err(ApiError::new(
            ApiErrorCode::CacheNotReady,
            "story cache is still building, retry shortly",
        )),
    }
}
