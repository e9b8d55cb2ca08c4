use crate::config::Settings;
use crate::ingest::types::FeedPage;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Paginated source of raw analyst rating events.
#[async_trait::async_trait]
pub trait FeedClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fetches the page starting at `token`; an empty token requests the first page.
    async fn fetch_page(&self, token: &str) -> Result<FeedPage>;
}

#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpFeedClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.require_stock_api_url()?.to_string();
        let api_key = settings.stock_api_key.clone();

        let retries = settings.stock_api_retries();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                settings.stock_api_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .context("failed to build feed http client")?;

        Ok(Self {
            http,
            url,
            api_key,
            retries,
        })
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .context("STOCK_API_KEY is not a valid header value")?,
            );
        }
        Ok(headers)
    }

    async fn fetch_once(&self, token: &str) -> Result<FeedPage> {
        let mut req = self.http.get(&self.url).headers(self.headers()?);
        if !token.is_empty() {
            req = req.query(&[("next_page", token)]);
        }

        let res = req.send().await.context("feed request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read feed response")?;

        if !status.is_success() {
            anyhow::bail!("feed HTTP {status}: {text}");
        }

        serde_json::from_str::<FeedPage>(&text)
            .with_context(|| format!("feed response is not a valid page: {text}"))
    }
}

#[async_trait::async_trait]
impl FeedClient for HttpFeedClient {
    fn provider_name(&self) -> &'static str {
        "http_ratings_feed"
    }

    async fn fetch_page(&self, token: &str) -> Result<FeedPage> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(token).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "feed fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: Option<&str>, key: Option<&str>) -> Settings {
        Settings {
            stock_api_url: url.map(str::to_string),
            stock_api_key: key.map(str::to_string),
            ..Settings::default()
        }
    }

    #[test]
    fn requires_feed_url() {
        let err = HttpFeedClient::from_settings(&settings(None, None)).unwrap_err();
        assert!(err.to_string().contains("STOCK_API_URL"));
    }

    #[test]
    fn sends_bearer_token_when_configured() {
        let client =
            HttpFeedClient::from_settings(&settings(Some("http://feed.local/list"), Some("k3y")))
                .unwrap();
        let headers = client.headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer k3y");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn retry_count_comes_from_settings() {
        let client = HttpFeedClient::from_settings(&Settings {
            stock_api_retries: Some(u32::MAX),
            ..settings(Some("http://feed.local/list"), None)
        })
        .unwrap();
        assert_eq!(client.retries, crate::config::MAX_STOCK_API_RETRIES);
    }

    #[test]
    fn omits_authorization_without_key() {
        let client =
            HttpFeedClient::from_settings(&settings(Some("http://feed.local/list"), None)).unwrap();
        assert!(client.headers().unwrap().get(AUTHORIZATION).is_none());
    }
}
