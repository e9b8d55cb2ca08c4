use crate::domain::recommendation::Recommendation;
use crate::domain::stock::{StockEvent, StockPage};
use crate::error::ServiceError;
use crate::ingest::provider::FeedClient;
use crate::ingest::sync::{fetch_and_store, SyncReport};
use crate::recommend;
use crate::scoring::Scorer;
use crate::storage::StockStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 1000;
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Started,
    AlreadyRunning,
}

/// Read operations over the store plus the background feed sync.
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn StockStore>,
    feed: Arc<dyn FeedClient>,
    scorer: Scorer,
    sync_running: Arc<AtomicBool>,
}

impl StockService {
    pub fn new(store: Arc<dyn StockStore>, feed: Arc<dyn FeedClient>) -> Self {
        Self {
            store,
            feed,
            scorer: Scorer::default(),
            sync_running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub async fn list_stocks(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<StockPage, ServiceError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let offset = offset.unwrap_or(0);
        if limit < 0 || offset < 0 {
            return Err(ServiceError::Validation(
                "limit and offset must be non-negative".to_string(),
            ));
        }
        let limit = limit.min(MAX_LIST_LIMIT);

        let data = self.store.list(limit, offset).await?;
        let total = self.store.count().await?;

        Ok(StockPage {
            data,
            total,
            limit,
            offset,
        })
    }

    pub async fn get_stock(&self, id: &str) -> Result<StockEvent, ServiceError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Stock".to_string()))
    }

    pub async fn search_stocks(&self, query: Option<&str>) -> Result<Vec<StockEvent>, ServiceError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty()).ok_or_else(|| {
            ServiceError::Validation("query parameter 'q' is required".to_string())
        })?;
        Ok(self.store.search(query).await?)
    }

    pub async fn recommendations(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let limit = match limit {
            None => DEFAULT_RECOMMENDATION_LIMIT,
            Some(n) => usize::try_from(n).map_err(|_| {
                ServiceError::Validation("limit must be non-negative".to_string())
            })?,
        };
        Ok(recommend::recommendations(self.store.as_ref(), &self.scorer, limit).await?)
    }

    /// Runs a sync on the current task and waits for it.
    pub async fn sync_now(&self, pages: i64) -> anyhow::Result<SyncReport> {
        fetch_and_store(self.feed.as_ref(), self.store.as_ref(), pages).await
    }

    /// Starts a sync on a detached task and returns immediately.
    ///
    /// At most one triggered sync runs at a time per service; the outcome is only logged and a
    /// failure is reported to Sentry.
    pub fn trigger_sync(&self, pages: i64) -> SyncTrigger {
        let Some(permit) = SyncPermit::try_acquire(&self.sync_running) else {
            tracing::info!(pages, "sync already running; trigger ignored");
            return SyncTrigger::AlreadyRunning;
        };

        let store = Arc::clone(&self.store);
        let feed = Arc::clone(&self.feed);
        tokio::spawn(async move {
            let _permit = permit;
            match fetch_and_store(feed.as_ref(), store.as_ref(), pages).await {
                Ok(report) => tracing::info!(
                    pages = report.pages,
                    total_fetched = report.total_fetched,
                    total_stored = report.total_stored,
                    "background sync finished"
                ),
                Err(err) => {
                    sentry_anyhow::capture_anyhow(&err);
                    tracing::error!(error = ?err, "background sync failed");
                }
            }
        });

        SyncTrigger::Started
    }

    pub fn sync_in_progress(&self) -> bool {
        self.sync_running.load(Ordering::Acquire)
    }
}

/// Held by the running sync; clears the flag on drop, including on panic.
struct SyncPermit(Arc<AtomicBool>);

impl SyncPermit {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{FeedPage, RawFeedItem};
    use crate::storage::memory::MemoryStockStore;
    use tokio::sync::Notify;

    /// Single-page feed that blocks until released.
    struct GatedFeed {
        gate: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl FeedClient for GatedFeed {
        fn provider_name(&self) -> &'static str {
            "gated"
        }

        async fn fetch_page(&self, _token: &str) -> anyhow::Result<FeedPage> {
            self.gate.notified().await;
            Ok(FeedPage {
                items: vec![RawFeedItem {
                    ticker: "NFLX".to_string(),
                    company: "Netflix".to_string(),
                    target_from: "$600".to_string(),
                    target_to: "$900".to_string(),
                    action: "upgraded by".to_string(),
                    rating_from: "Hold".to_string(),
                    rating_to: "Buy".to_string(),
                    time: "2025-01-20T14:00:00Z".to_string(),
                    ..RawFeedItem::default()
                }],
                next_page: String::new(),
            })
        }
    }

    fn service() -> (StockService, Arc<Notify>, Arc<MemoryStockStore>) {
        let gate = Arc::new(Notify::new());
        let store = Arc::new(MemoryStockStore::new());
        let svc = StockService::new(
            store.clone(),
            Arc::new(GatedFeed { gate: gate.clone() }),
        );
        (svc, gate, store)
    }

    #[tokio::test]
    async fn second_trigger_is_rejected_while_running() {
        let (svc, gate, store) = service();

        assert_eq!(svc.trigger_sync(0), SyncTrigger::Started);
        assert_eq!(svc.trigger_sync(5), SyncTrigger::AlreadyRunning);
        assert!(svc.sync_in_progress());

        gate.notify_one();
        for _ in 0..100 {
            if !svc.sync_in_progress() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(!svc.sync_in_progress());
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(svc.trigger_sync(0), SyncTrigger::Started);
    }

    #[test]
    fn failed_background_sync_is_reported() {
        struct DownFeed;

        #[async_trait::async_trait]
        impl FeedClient for DownFeed {
            fn provider_name(&self) -> &'static str {
                "down"
            }

            async fn fetch_page(&self, _token: &str) -> anyhow::Result<FeedPage> {
                anyhow::bail!("feed HTTP 503 Service Unavailable")
            }
        }

        let events = sentry::test::with_captured_events(|| {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let svc = StockService::new(Arc::new(MemoryStockStore::new()), Arc::new(DownFeed));
                assert_eq!(svc.trigger_sync(1), SyncTrigger::Started);
                for _ in 0..100 {
                    if !svc.sync_in_progress() {
                        break;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                assert!(!svc.sync_in_progress());
            });
        });

        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn lookup_and_search_errors() {
        let (svc, gate, _store) = service();
        gate.notify_one();
        svc.sync_now(1).await.unwrap();

        assert!(matches!(svc.get_stock("nope").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.search_stocks(None).await, Err(ServiceError::Validation(_))));
        assert!(matches!(svc.search_stocks(Some("  ")).await, Err(ServiceError::Validation(_))));
        assert_eq!(svc.search_stocks(Some("netf")).await.unwrap().len(), 1);

        let page = svc.list_stocks(None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, DEFAULT_LIST_LIMIT);
        let id = page.data[0].id.clone();
        assert_eq!(svc.get_stock(&id).await.unwrap().ticker, "NFLX");
    }

    #[tokio::test]
    async fn validates_listing_and_recommendation_limits() {
        let (svc, _gate, _store) = service();
        assert!(matches!(
            svc.list_stocks(Some(-1), None).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.recommendations(Some(-2)).await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(svc.list_stocks(Some(5000), None).await.unwrap().limit, MAX_LIST_LIMIT);
        assert!(svc.recommendations(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_scorer_is_used_for_recommendations() {
        use crate::domain::rating::{Rating, RatingScale};
        static FLAT: &[(&str, Rating)] = &[("Hold", Rating::Buy), ("Buy", Rating::Buy)];

        let (svc, gate, _store) = service();
        gate.notify_one();
        svc.sync_now(1).await.unwrap();

        // Standard table: Hold -> Buy is an upgrade.
        let standard = svc.recommendations(Some(1)).await.unwrap();
        assert!(standard[0].reason.contains("rating upgraded"));

        // Flattened table: both labels rank the same, so the rating is only "maintained".
        let flat = svc
            .clone()
            .with_scorer(Scorer::new(RatingScale::new(FLAT)))
            .recommendations(Some(1))
            .await
            .unwrap();
        assert!(flat[0].reason.contains("positive rating maintained"));
        assert!(flat[0].score < standard[0].score);
    }
}
