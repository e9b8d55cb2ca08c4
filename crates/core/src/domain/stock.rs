use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyst rating event as persisted by the store.
///
/// `id` is derived from the ticker and the *raw* feed timestamp (see
/// [`crate::ingest::identity::event_id`]), so ingesting the same feed item twice updates the
/// existing row instead of inserting a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEvent {
    pub id: String,
    pub ticker: String,
    pub company: String,
    pub target_from: String,
    pub target_to: String,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    #[serde(rename = "time")]
    pub event_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Set by the store on first insert; `None` until the event has been persisted.
    pub created_at: Option<DateTime<Utc>>,
}

/// A page of stored events plus the total row count, as returned by listing.
#[derive(Debug, Clone, Serialize)]
pub struct StockPage {
    pub data: Vec<StockEvent>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
