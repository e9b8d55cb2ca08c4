use anyhow::Context;
use clap::{Parser, Subcommand};
use ratings_core::ingest::provider::HttpFeedClient;
use ratings_core::ingest::sync::SyncReport;
use ratings_core::service::StockService;
use ratings_core::storage::memory::MemoryStockStore;
use ratings_core::storage::stocks::PgStockStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ratings_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull the ratings feed once and upsert every event.
    Sync {
        /// Maximum pages to fetch. 0 uses the default cap; values above the hard cap are clamped.
        #[arg(long, default_value_t = 0)]
        pages: i64,

        /// Fetch from the feed but keep everything in memory instead of writing to the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = ratings_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    match args.command {
        Command::Migrate => {
            let pool = connect(&settings).await?;
            ratings_core::storage::migrate(&pool).await?;
            tracing::info!("migrations completed");
        }
        Command::Sync { pages, dry_run: true } => {
            let feed = HttpFeedClient::from_settings(&settings)?;
            let service = StockService::new(Arc::new(MemoryStockStore::new()), Arc::new(feed));
            let report = run_sync(&service, pages).await?;
            log_report(&report, true);
        }
        Command::Sync {
            pages,
            dry_run: false,
        } => {
            let feed = HttpFeedClient::from_settings(&settings)?;
            let pool = connect(&settings).await?;
            ratings_core::storage::migrate(&pool).await?;

            let Some(lock) = ratings_core::storage::lock::try_acquire_sync_lock(&pool).await? else {
                tracing::warn!("sync lock not acquired; another sync in progress");
                return Ok(());
            };

            let service = StockService::new(Arc::new(PgStockStore::new(pool)), Arc::new(feed));
            let result = run_sync(&service, pages).await;

            if let Err(e) = lock.release().await {
                tracing::warn!(error = %e, "failed to release sync lock");
            }

            log_report(&result?, false);
        }
    }

    Ok(())
}

async fn connect(settings: &ratings_core::config::Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")
}

async fn run_sync(service: &StockService, pages: i64) -> anyhow::Result<SyncReport> {
    service.sync_now(pages).await.map_err(|err| {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "sync failed");
        err
    })
}

fn log_report(report: &SyncReport, dry_run: bool) {
    tracing::info!(
        dry_run,
        pages = report.pages,
        page_cap = report.page_cap,
        exhausted = report.exhausted,
        total_fetched = report.total_fetched,
        total_stored = report.total_stored,
        store_failures = report.store_failures,
        "sync run finished"
    );
}

fn init_sentry(settings: &ratings_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
