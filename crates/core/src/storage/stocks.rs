use crate::domain::stock::StockEvent;
use crate::storage::StockStore;
use anyhow::Context;
use chrono::{DateTime, Utc};

const SELECT_COLUMNS: &str = "SELECT id, ticker, company, target_from, target_to, action, brokerage, \
     rating_from, rating_to, event_time, last_updated, created_at FROM stocks";

type StockRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn from_row(row: StockRow) -> StockEvent {
    let (
        id,
        ticker,
        company,
        target_from,
        target_to,
        action,
        brokerage,
        rating_from,
        rating_to,
        event_time,
        last_updated,
        created_at,
    ) = row;

    StockEvent {
        id,
        ticker,
        company,
        target_from,
        target_to,
        action,
        brokerage,
        rating_from,
        rating_to,
        event_time,
        last_updated,
        created_at: Some(created_at),
    }
}

/// Escapes LIKE metacharacters so user text is matched literally.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: sqlx::PgPool,
}

impl PgStockStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn update_by_id(&self, event: &StockEvent) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE stocks \
               SET company = $2, target_from = $3, target_to = $4, action = $5, brokerage = $6, \
                   rating_from = $7, rating_to = $8, last_updated = $9 \
             WHERE id = $1",
        )
        .persistent(false)
        .bind(&event.id)
        .bind(&event.company)
        .bind(&event.target_from)
        .bind(&event.target_to)
        .bind(&event.action)
        .bind(&event.brokerage)
        .bind(&event.rating_from)
        .bind(&event.rating_to)
        .bind(event.last_updated)
        .execute(&self.pool)
        .await
        .with_context(|| format!("update stock by id failed (id={})", event.id))?;

        Ok(())
    }
}

const PRIMARY_KEY_CONSTRAINT: &str = "stocks_pkey";

fn is_primary_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.is_unique_violation() && db.constraint() == Some(PRIMARY_KEY_CONSTRAINT)
    })
}

#[async_trait::async_trait]
impl StockStore for PgStockStore {
    async fn upsert(&self, event: &StockEvent) -> anyhow::Result<()> {
        let inserted = sqlx::query(
            "INSERT INTO stocks (id, ticker, company, target_from, target_to, action, brokerage, \
                                 rating_from, rating_to, event_time, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (ticker, event_time) DO UPDATE \
               SET company = EXCLUDED.company, \
                   target_from = EXCLUDED.target_from, \
                   target_to = EXCLUDED.target_to, \
                   action = EXCLUDED.action, \
                   brokerage = EXCLUDED.brokerage, \
                   rating_from = EXCLUDED.rating_from, \
                   rating_to = EXCLUDED.rating_to, \
                   last_updated = EXCLUDED.last_updated",
        )
        .persistent(false)
        .bind(&event.id)
        .bind(&event.ticker)
        .bind(&event.company)
        .bind(&event.target_from)
        .bind(&event.target_to)
        .bind(&event.action)
        .bind(&event.brokerage)
        .bind(&event.rating_from)
        .bind(&event.rating_to)
        .bind(event.event_time)
        .bind(event.last_updated)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(()),
            // Same id under a different event_time: an unparseable raw time re-ingested with a
            // fresh fallback. Update the existing row in place.
            Err(err) if is_primary_key_violation(&err) => self.update_by_id(event).await,
            Err(err) => Err(err).with_context(|| {
                format!("upsert stocks failed (id={}, ticker={})", event.id, event.ticker)
            }),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> anyhow::Result<Vec<StockEvent>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY event_time DESC, id ASC LIMIT $1 OFFSET $2"
        ))
        .persistent(false)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("select stocks failed")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<StockEvent>> {
        let row = sqlx::query_as::<_, StockRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .persistent(false)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select stock by id failed (id={id})"))?;

        Ok(row.map(from_row))
    }

    async fn search(&self, text: &str) -> anyhow::Result<Vec<StockEvent>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!(
            "{SELECT_COLUMNS} \
             WHERE ticker ILIKE $1 ESCAPE '\\' OR company ILIKE $1 ESCAPE '\\' \
             ORDER BY event_time DESC, id ASC"
        ))
        .persistent(false)
        .bind(like_pattern(text))
        .fetch_all(&self.pool)
        .await
        .context("search stocks failed")?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks")
            .persistent(false)
            .fetch_one(&self.pool)
            .await
            .context("count stocks failed")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("app"), "%app%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
