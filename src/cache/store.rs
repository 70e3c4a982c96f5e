//! Concurrent story store and the cache readiness state machine.

use crate::hn::{Story, StoryId};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Mutex;

/// Lifecycle phase of the cache.
///
/// `Ready` and `Refreshing` both serve reads: a refresh never takes the
/// cache out of service.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePhase {
    #[default]
    Uninitialized,
    Building,
    Ready,
    Refreshing,
}

impl CachePhase {
    /// Whether reads may be served in this phase.
    pub fn is_ready(self) -> bool {
        matches!(self, CachePhase::Ready | CachePhase::Refreshing)
    }
}

/// Process-wide story cache, keyed by story id.
///
/// Created once by the composition root and shared behind an `Arc`. The
/// map is the only synchronization point between the background writer
/// and readers: individual entries are always internally consistent, but
/// a snapshot taken mid-refresh may mix old and new values.
#[derive(Debug, Default)]
pub struct StoryStore {
    stories: DashMap<StoryId, Story>,
    phase: Mutex<CachePhase>,
}

impl StoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `story.id`.
    ///
    /// Same-key writers are last-writer-wins with no ordering guarantee;
    /// re-upserting an identical story is a no-op in effect.
    pub fn upsert(&self, story: Story) {
        self.stories.insert(story.id, story);
    }

    /// Clone out the current contents, in no particular order.
    pub fn snapshot(&self) -> Vec<Story> {
        self.stories.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn phase(&self) -> CachePhase {
        *self.phase.lock().unwrap()
    }

    /// True once at least one full build has completed. Refreshes never
    /// clear this, so readers keep getting the previous snapshot while one
    /// runs.
    pub fn is_ready(&self) -> bool {
        self.phase().is_ready()
    }

    /// Advance the state machine. Only the cache service calls this, and it
    /// serializes cycles, so transitions are single-writer; readers observe
    /// the new phase immediately.
    pub(crate) fn set_phase(&self, phase: CachePhase) {
        *self.phase.lock().unwrap() = phase;
    }
}
