use serde::{Deserialize, Serialize};

/// One page of the upstream ratings feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<RawFeedItem>,
    /// Continuation token for the next page; empty when the feed is exhausted.
    #[serde(default)]
    pub next_page: String,
}

/// Feed item exactly as received. Every field is kept as a string; `time` in particular is
/// not guaranteed to be a valid timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFeedItem {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub target_from: String,
    #[serde(default)]
    pub target_to: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub brokerage: String,
    #[serde(default)]
    pub rating_from: String,
    #[serde(default)]
    pub rating_to: String,
    #[serde(default)]
    pub time: String,
}
