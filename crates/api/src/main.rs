use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratings_core::domain::recommendation::Recommendation;
use ratings_core::domain::stock::{StockEvent, StockPage};
use ratings_core::error::ServiceError;
use ratings_core::ingest::provider::HttpFeedClient;
use ratings_core::service::{StockService, SyncTrigger};
use ratings_core::storage::stocks::PgStockStore;

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

    let service = match build_service(&settings).await {
        Ok(service) => Some(service),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "service init failed; starting API in degraded mode");
            None
        }
    };

    let app = app(AppState { service }, settings.allowed_origins());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port()));
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn build_service(settings: &ratings_core::config::Settings) -> anyhow::Result<StockService> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;
    ratings_core::storage::migrate(&pool).await?;

    let feed = HttpFeedClient::from_settings(settings)?;
    Ok(StockService::new(
        Arc::new(PgStockStore::new(pool)),
        Arc::new(feed),
    ))
}

fn app(state: AppState, allowed_origins: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stocks", get(list_stocks))
        .route("/api/stocks/search", get(search_stocks))
        .route("/api/stocks/:id", get(get_stock))
        .route("/api/sync", post(trigger_sync))
        .route("/api/recommendations", get(get_recommendations))
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if allowed_origins.trim() == "*" {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

#[derive(Clone)]
struct AppState {
    service: Option<StockService>,
}

impl AppState {
    fn service(&self) -> Result<&StockService, ApiError> {
        self.service.as_ref().ok_or(ApiError::Unavailable)
    }
}

#[derive(Debug)]
enum ApiError {
    Service(ServiceError),
    Unavailable,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service unavailable".to_string(),
            ),
            ApiError::Service(ServiceError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            ApiError::Service(ServiceError::Validation(detail)) => (StatusCode::BAD_REQUEST, detail),
            ApiError::Service(ServiceError::Internal(e)) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %format!("{e:#}"), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecommendationParams {
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRequest {
    #[serde(default)]
    pages: i64,
}

#[derive(Debug, Serialize)]
struct SyncAccepted {
    message: &'static str,
    pages: i64,
    started: bool,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_stocks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<StockPage>, ApiError> {
    let page = state
        .service()?
        .list_stocks(params.limit, params.offset)
        .await?;
    Ok(Json(page))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StockEvent>, ApiError> {
    Ok(Json(state.service()?.get_stock(&id).await?))
}

async fn search_stocks(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<DataResponse<Vec<StockEvent>>>, ApiError> {
    let data = state
        .service()?
        .search_stocks(params.q.as_deref())
        .await?;
    Ok(Json(DataResponse { data }))
}

// An absent or malformed body falls back to the default page cap.
async fn trigger_sync(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SyncAccepted>), ApiError> {
    let req = serde_json::from_slice::<SyncRequest>(&body).unwrap_or_default();

    let started = state.service()?.trigger_sync(req.pages) == SyncTrigger::Started;
    let message = if started {
        "Stock synchronization started"
    } else {
        "Stock synchronization already in progress"
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAccepted {
            message,
            pages: req.pages,
            started,
        }),
    ))
}

async fn get_recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationParams>,
) -> Result<Json<DataResponse<Vec<Recommendation>>>, ApiError> {
    let data = state.service()?.recommendations(params.limit).await?;
    Ok(Json(DataResponse { data }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
