pub mod domain;
pub mod error;
pub mod ingest;
pub mod recommend;
pub mod scoring;
pub mod service;
pub mod storage;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_STOCK_API_RETRIES: u32 = 3;
    pub const MAX_STOCK_API_RETRIES: u32 = 10;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub stock_api_url: Option<String>,
        pub stock_api_key: Option<String>,
        pub stock_api_timeout_secs: Option<u64>,
        pub stock_api_retries: Option<u32>,
        pub allowed_origins: Option<String>,
        pub port: Option<u16>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                stock_api_url: non_empty_var("STOCK_API_URL"),
                stock_api_key: non_empty_var("STOCK_API_KEY"),
                stock_api_timeout_secs: non_empty_var("STOCK_API_TIMEOUT_SECS")
                    .and_then(|s| s.parse::<u64>().ok()),
                stock_api_retries: non_empty_var("STOCK_API_RETRIES")
                    .and_then(|s| s.parse::<u32>().ok()),
                allowed_origins: non_empty_var("ALLOWED_ORIGINS"),
                port: non_empty_var("PORT").and_then(|s| s.parse::<u16>().ok()),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_stock_api_url(&self) -> anyhow::Result<&str> {
            self.stock_api_url
                .as_deref()
                .context("STOCK_API_URL is required")
        }

        /// `*` or a comma-separated list of origins.
        pub fn allowed_origins(&self) -> &str {
            self.allowed_origins.as_deref().unwrap_or("*")
        }

        pub fn port(&self) -> u16 {
            self.port.unwrap_or(DEFAULT_PORT)
        }

        /// Total feed fetch attempts per page, clamped to `1..=MAX_STOCK_API_RETRIES`.
        pub fn stock_api_retries(&self) -> u32 {
            self.stock_api_retries
                .unwrap_or(DEFAULT_STOCK_API_RETRIES)
                .clamp(1, MAX_STOCK_API_RETRIES)
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

}
