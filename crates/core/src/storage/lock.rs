use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session, so the lock holds on to the connection
// it was taken on until released.
const SYNC_LOCK_KEY: i64 = 0x5354_4F43_4B53; // "STOCKS"

pub struct SyncLock {
    conn: PoolConnection<Postgres>,
}

/// Returns `None` if another process is already running a feed sync.
pub async fn try_acquire_sync_lock(pool: &sqlx::PgPool) -> anyhow::Result<Option<SyncLock>> {
    let mut conn = pool
        .acquire()
        .await
        .context("failed to acquire connection for sync lock")?;

    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(SYNC_LOCK_KEY)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={SYNC_LOCK_KEY})"))?;

    Ok(acquired.0.then_some(SyncLock { conn }))
}

impl SyncLock {
    pub async fn release(mut self) -> anyhow::Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(SYNC_LOCK_KEY)
            .execute(&mut *self.conn)
            .await
            .with_context(|| format!("failed to release advisory lock (key={SYNC_LOCK_KEY})"))?;
        Ok(())
    }
}
