//! The story cache engine: store, bounded fetch fan-out, lifecycle, and
//! read queries.

pub mod fetch;
pub mod query;
pub mod service;
pub mod store;

pub use service::{CacheError, CacheService};
pub use store::{CachePhase, StoryStore};
