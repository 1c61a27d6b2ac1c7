//! Rate limited HTTP client for the Notion API.
//!
//! [`NotionClient`] implements [`NotionApi`] on top of `reqwest`. Every
//! physical request, including pagination continuations and retries, first
//! waits on the shared [`RateLimiter`] so the process never exceeds the
//! configured request rate, whichever task issues the call.
//!
//! The limiter enforces a minimum spacing *between* consecutive calls rather
//! than a fixed delay before each one: the first call goes out immediately,
//! and every later call starts no sooner than `rate_limit_delay` after the
//! previous one started.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::NotionConfig;
use crate::contract::{ChildrenPage, NotionApi, PageMetadata};
use crate::error::{ExportError, Result};
use crate::retry::with_retry;

/// Enforces a minimum spacing between consecutive calls.
///
/// The last call time is the only shared state; holding the lock while
/// waiting serialises callers so concurrent users cannot burst.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until a call is allowed, then record it as made.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            tokio::select! {
                _ = cancel.cancelled() => return Err(ExportError::Cancelled),
                _ = tokio::time::sleep_until(ready_at) => {}
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct NotionClient {
    http: reqwest::Client,
    config: NotionConfig,
    limiter: RateLimiter,
    cancel: CancellationToken,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ExportError::Configuration(
                "Notion API key is empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| ExportError::Configuration(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            HeaderName::from_static("notion-version"),
            HeaderValue::from_str(&config.notion_version)
                .map_err(|e| ExportError::Configuration(format!("invalid Notion version: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExportError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            limiter: RateLimiter::new(config.rate_limit_delay),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort waits and stop issuing calls once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, id: &str, url: &str, query: &[(&str, String)]) -> Result<Value> {
        with_retry(&self.config.retry, &self.cancel, || {
            self.send_once(id, url, query)
        })
        .await
    }

    async fn send_once(&self, id: &str, url: &str, query: &[(&str, String)]) -> Result<Value> {
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        self.limiter.acquire(&self.cancel).await?;
        debug!(id, url, "Calling Notion API");

        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|source| ExportError::Transport {
                id: id.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|source| {
                if source.is_decode() {
                    ExportError::Decode {
                        id: id.to_string(),
                        message: source.to_string(),
                    }
                } else {
                    ExportError::Transport {
                        id: id.to_string(),
                        source,
                    }
                }
            });
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        let err = status_error(id, status, retry_after, &body);
        error!(id, status = status.as_u16(), error = %err, "Notion API returned error");
        Err(err)
    }
}

fn status_error(
    id: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ExportError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let id = id.to_string();
    match status {
        StatusCode::NOT_FOUND => ExportError::NotFound { id },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExportError::Unauthorized {
            id,
            message: if parsed.message.is_empty() {
                "check that the integration token is valid and the page is shared with it"
                    .to_string()
            } else {
                parsed.message
            },
        },
        StatusCode::TOO_MANY_REQUESTS => ExportError::RateLimited { id, retry_after },
        _ => ExportError::Api {
            id,
            status: status.as_u16(),
            code: parsed.code,
            message: if parsed.message.is_empty() {
                body.chars().take(200).collect()
            } else {
                parsed.message
            },
        },
    }
}

#[async_trait]
impl NotionApi for NotionClient {
    async fn fetch_page(&self, page_id: &str) -> Result<PageMetadata> {
        let url = self.endpoint(&format!("pages/{page_id}"));
        let value = self.get_json(page_id, &url, &[]).await?;
        Ok(PageMetadata::from_value(page_id, &value))
    }

    async fn list_children_page(
        &self,
        block_id: &str,
        start_cursor: Option<String>,
    ) -> Result<ChildrenPage> {
        let url = self.endpoint(&format!("blocks/{block_id}/children"));
        let mut query = vec![("page_size", self.config.page_size.to_string())];
        if let Some(cursor) = start_cursor {
            query.push(("start_cursor", cursor));
        }
        let value = self.get_json(block_id, &url, &query).await?;
        ChildrenPage::from_value(block_id, value)
    }
}
