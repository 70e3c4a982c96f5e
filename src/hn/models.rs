//! Wire models for the Hacker News Firebase API.

use serde::{Deserialize, Serialize};

/// Story identifier as used by `item/{id}.json`.
pub type StoryId = u64;

/// One story as returned by the item endpoint.
///
/// The API omits fields for some item kinds (`url` on Ask HN posts,
/// `descendants` on items with comments disabled), so everything except
/// the id is defaulted to keep sparse objects decodable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub by: String,
    /// Unix timestamp of submission.
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub score: i64,
    /// Total comment count.
    #[serde(default)]
    pub descendants: i64,
}
