use crate::domain::stock::StockEvent;
use anyhow::Context;

pub mod lock;
pub mod memory;
pub mod stocks;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Persistence for rating events.
///
/// `upsert` is keyed by the event id, which is a function of (ticker, raw timestamp); a
/// re-ingested event refreshes its mutable columns and `last_updated`, never `created_at`.
#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    async fn upsert(&self, event: &StockEvent) -> anyhow::Result<()>;

    /// Most recent first (`event_time` descending).
    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<StockEvent>>;

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<StockEvent>>;

    /// Case-insensitive substring match on ticker or company, most recent first.
    async fn search(&self, text: &str) -> anyhow::Result<Vec<StockEvent>>;

    async fn count(&self) -> anyhow::Result<i64>;
}
