use crate::domain::recommendation::Recommendation;
use crate::domain::stock::StockEvent;
use crate::scoring::Scorer;
use crate::storage::StockStore;
use std::collections::HashMap;

/// How many of the most recent events are considered when ranking.
pub const WORKING_SET: i64 = 1000;

/// Ranks the latest event per ticker by score.
///
/// Only strictly positive scores are returned, ordered by score descending and then ticker
/// ascending, truncated to `limit`.
pub async fn recommendations(
    store: &dyn StockStore,
    scorer: &Scorer,
    limit: usize,
) -> anyhow::Result<Vec<Recommendation>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let events = store.list(WORKING_SET, 0).await?;
    Ok(rank(events, scorer, limit))
}

pub fn rank(events: Vec<StockEvent>, scorer: &Scorer, limit: usize) -> Vec<Recommendation> {
    let scored = latest_per_ticker(events)
        .into_iter()
        .map(|stock| {
            let score = scorer.score(&stock);
            Recommendation {
                stock,
                score: score.value,
                reason: score.reason,
            }
        })
        .collect();
    select_top(scored, limit)
}

fn select_top(scored: Vec<Recommendation>, limit: usize) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = scored.into_iter().filter(|r| r.score > 0.0).collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.stock.ticker.cmp(&b.stock.ticker))
    });
    out.truncate(limit);
    out
}

/// Keeps the event with the latest `event_time` per ticker. On a tie the first one seen wins.
fn latest_per_ticker(events: Vec<StockEvent>) -> Vec<StockEvent> {
    let mut latest: HashMap<String, StockEvent> = HashMap::new();
    for event in events {
        match latest.get(&event.ticker) {
            Some(existing) if existing.event_time >= event.event_time => {}
            _ => {
                latest.insert(event.ticker.clone(), event);
            }
        }
    }
    latest.into_values().collect()
}
