use crate::ingest::normalize::normalize;
use crate::ingest::provider::FeedClient;
use crate::storage::StockStore;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;

/// Page cap used when the caller asks for zero or a negative number of pages.
pub const DEFAULT_MAX_PAGES: u32 = 20;
/// Hard upper bound on pages per sync.
pub const ABSOLUTE_MAX_PAGES: u32 = 100;

pub fn resolve_page_cap(requested: i64) -> u32 {
    if requested <= 0 {
        DEFAULT_MAX_PAGES
    } else {
        requested.min(i64::from(ABSOLUTE_MAX_PAGES)) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageProgress {
    /// 1-based page index.
    pub page: u32,
    pub fetched: usize,
    pub stored: usize,
    pub total_fetched: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub page_cap: u32,
    pub pages: u32,
    pub total_fetched: usize,
    pub total_stored: usize,
    pub store_failures: usize,
    /// Whether the feed signalled end-of-feed (as opposed to stopping at the page cap).
    pub exhausted: bool,
    pub progress: Vec<PageProgress>,
}

/// Pulls pages from the feed and upserts every event, page by page.
///
/// A feed error aborts the run; pages already stored stay stored. A failed upsert is logged
/// and skipped.
pub async fn fetch_and_store(
    feed: &dyn FeedClient,
    store: &dyn StockStore,
    max_pages: i64,
) -> anyhow::Result<SyncReport> {
    let page_cap = resolve_page_cap(max_pages);
    let mut report = SyncReport {
        page_cap,
        ..SyncReport::default()
    };
    let mut token = String::new();

    tracing::info!(page_cap, provider = feed.provider_name(), "starting feed sync");

    loop {
        let page = feed
            .fetch_page(&token)
            .await
            .with_context(|| format!("error fetching feed page {}", report.pages + 1))?;

        let events = normalize(page.items, Utc::now());
        let fetched = events.len();
        let mut stored = 0;
        for event in &events {
            match store.upsert(event).await {
                Ok(()) => stored += 1,
                Err(err) => {
                    report.store_failures += 1;
                    tracing::warn!(ticker = %event.ticker, id = %event.id, error = %err, "failed to store event; skipping");
                }
            }
        }

        report.pages += 1;
        report.total_fetched += fetched;
        report.total_stored += stored;
        report.progress.push(PageProgress {
            page: report.pages,
            fetched,
            stored,
            total_fetched: report.total_fetched,
        });

        tracing::info!(
            fetched,
            stored,
            total_fetched = report.total_fetched,
            page = report.pages,
            page_cap,
            "fetched and stored feed page"
        );

        if page.next_page.is_empty() {
            report.exhausted = true;
            tracing::info!(total_fetched = report.total_fetched, "feed exhausted");
            break;
        }

        if report.pages >= page_cap {
            tracing::info!(
                page_cap,
                total_fetched = report.total_fetched,
                "reached sync page cap"
            );
            break;
        }

        token = page.next_page;
    }

    tracing::info!(
        total_fetched = report.total_fetched,
        total_stored = report.total_stored,
        store_failures = report.store_failures,
        pages = report.pages,
        "feed sync completed"
    );
    Ok(report)
}
