//! Application state shared across components (web handlers, cache service).

use crate::cache::StoryStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StoryStore>,
}

impl AppState {
    pub fn new(store: Arc<StoryStore>) -> Self {
        Self { store }
    }
}
