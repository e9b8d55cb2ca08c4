use crate::domain::stock::StockEvent;
use crate::storage::StockStore;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process store with the same upsert/ordering semantics as the Postgres store.
/// Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStockStore {
    rows: RwLock<HashMap<String, StockEvent>>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sorted(&self) -> Vec<StockEvent> {
        let rows = self.rows.read().await;
        let mut out: Vec<StockEvent> = rows.values().cloned().collect();
        out.sort_by(|a, b| {
            b.event_time
                .cmp(&a.event_time)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}

#[async_trait::async_trait]
impl StockStore for MemoryStockStore {
    async fn upsert(&self, event: &StockEvent) -> anyhow::Result<()> {
        let mut rows = self.rows.write().await;

        // (ticker, event_time) is the conflict key; the id is the fallback for rows whose
        // event_time was a parse fallback.
        let existing_id = rows
            .values()
            .find(|r| r.ticker == event.ticker && r.event_time == event.event_time)
            .map(|r| r.id.clone())
            .or_else(|| rows.contains_key(&event.id).then(|| event.id.clone()));

        if let Some(existing) = existing_id.and_then(|id| rows.get_mut(&id)) {
            existing.company = event.company.clone();
            existing.target_from = event.target_from.clone();
            existing.target_to = event.target_to.clone();
            existing.action = event.action.clone();
            existing.brokerage = event.brokerage.clone();
            existing.rating_from = event.rating_from.clone();
            existing.rating_to = event.rating_to.clone();
            existing.last_updated = event.last_updated;
            return Ok(());
        }

        let mut row = event.clone();
        row.created_at = Some(Utc::now());
        rows.insert(row.id.clone(), row);
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<StockEvent>> {
        anyhow::ensure!(limit >= 0 && offset >= 0, "limit and offset must be non-negative");
        Ok(self
            .sorted()
            .await
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<StockEvent>> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn search(&self, text: &str) -> anyhow::Result<Vec<StockEvent>> {
        let needle = text.to_lowercase();
        Ok(self
            .sorted()
            .await
            .into_iter()
            .filter(|e| {
                e.ticker.to_lowercase().contains(&needle)
                    || e.company.to_lowercase().contains(&needle)
            })
            .collect())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.rows.read().await.len() as i64)
    }
}
