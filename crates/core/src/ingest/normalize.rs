use crate::domain::stock::StockEvent;
use crate::ingest::identity::event_id;
use crate::ingest::types::RawFeedItem;
use chrono::{DateTime, Utc};

/// Converts raw feed items into storable events, stamping `last_updated` with `now`.
///
/// A timestamp that is not RFC 3339 does not drop the item: it is stored with `now` as its
/// event time (lossy) and a warning is logged. The id is always derived from the raw
/// timestamp string, so a malformed item keeps the same id across runs.
pub fn normalize(items: Vec<RawFeedItem>, now: DateTime<Utc>) -> Vec<StockEvent> {
    items
        .into_iter()
        .map(|item| normalize_item(item, now))
        .collect()
}

fn normalize_item(item: RawFeedItem, now: DateTime<Utc>) -> StockEvent {
    let event_time = match DateTime::parse_from_rfc3339(item.time.trim()) {
        Ok(t) => t.with_timezone(&Utc),
        Err(err) => {
            tracing::warn!(
                ticker = %item.ticker,
                raw_time = %item.time,
                error = %err,
                "unparseable event time; using ingestion time"
            );
            now
        }
    };

    StockEvent {
        id: event_id(&item.ticker, &item.time),
        ticker: item.ticker,
        company: item.company,
        target_from: item.target_from,
        target_to: item.target_to,
        action: item.action,
        brokerage: item.brokerage,
        rating_from: item.rating_from,
        rating_to: item.rating_to,
        event_time,
        last_updated: now,
        created_at: None,
    }
}
