use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::retry::{duration_millis, RetryConfig};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
/// Notion allows roughly three requests per second.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_millis(350);
pub const DEFAULT_MAX_DEPTH: usize = 3;
/// Hard ceiling on configurable depth, whatever the config file says.
pub const MAX_DEPTH_LIMIT: usize = 16;

/// Everything a run needs, passed explicitly to the client and exporter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub notion: NotionConfig,
    pub export: ExportOptions,
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.notion.base_url,
            rate_limit_delay_ms = self.notion.rate_limit_delay.as_millis() as u64,
            max_retries = self.notion.retry.max_retries,
            output_dir = %self.export.output_dir.display(),
            max_depth = self.export.max_depth,
            "Loaded AppConfig"
        );
        debug!(?self, "AppConfig loaded (full debug)");
    }
}

/// Connection settings for the Notion API.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Integration token. Never read from or written to config files.
    #[serde(skip)]
    pub api_key: String,
    pub base_url: String,
    pub notion_version: String,
    /// Minimum spacing between two remote calls.
    #[serde(rename = "rate_limit_delay_ms", with = "duration_millis")]
    pub rate_limit_delay: Duration,
    pub page_size: u32,
    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            page_size: 100,
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

impl NotionConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_key", &format_args!("<{} chars>", self.api_key.len()))
            .field("base_url", &self.base_url)
            .field("notion_version", &self.notion_version)
            .field("rate_limit_delay", &self.rate_limit_delay)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// What to export and how to lay it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Deepest level fetched; the root is level 0.
    pub max_depth: usize,
    /// Insert a numbered table of contents after the header.
    pub table_of_contents: bool,
    /// Add a metadata call-out under each section heading.
    pub page_metadata: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            max_depth: DEFAULT_MAX_DEPTH,
            table_of_contents: false,
            page_metadata: false,
        }
    }
}
