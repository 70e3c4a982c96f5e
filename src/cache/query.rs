//! Read-side queries over the story store.

use crate::cache::store::StoryStore;
use crate::hn::Story;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No build has completed yet; callers should retry shortly rather
    /// than treat an empty cache as an empty result.
    #[error("cache not ready")]
    CacheNotReady,
}

/// The current top `count` stories by score, highest first.
///
/// Equal scores break by ascending id so repeated reads of an unchanged
/// cache return identical sequences. A `count` past the cache size returns
/// everything; `count == 0` is valid and yields an empty vec.
pub fn top_stories(store: &StoryStore, count: usize) -> Result<Vec<Story>, QueryError> {
    if !store.is_ready() {
        return Err(QueryError::CacheNotReady);
    }

    let mut stories = store.snapshot();
    stories.sort_unstable_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
    stories.truncate(count);
    Ok(stories)
}
