//! Run configuration loaded from an optional `config.yaml`.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//!
//! ```yaml
//! listing_url: https://www.klsescreener.com/v2/news
//! market_table: Market_News
//! hot_table: Hot_News
//! detail_concurrency: 8
//! on_read_error: abort
//! unenriched: insert_null
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::ConfigError;
use crate::ingest::{IngestOptions, ReadFailurePolicy, UnenrichedPolicy};
use crate::scrapers::pagination::PagingOptions;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Listing page opened in the browser.
    pub listing_url: String,
    /// Base for resolving relative article links.
    pub base_url: String,
    pub market_table: String,
    /// Hot news is only stored when this is set.
    pub hot_table: Option<String>,
    pub load_more_wait_ms: u64,
    pub settle_ms: u64,
    /// Hard limit for the whole collection phase; 0 disables it.
    pub collection_budget_secs: u64,
    pub detail_concurrency: usize,
    pub detail_timeout_secs: u64,
    pub user_agent: String,
    pub on_read_error: ReadFailurePolicy,
    pub unenriched: UnenrichedPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.klsescreener.com/v2/news".to_string(),
            base_url: "https://www.klsescreener.com".to_string(),
            market_table: "Market_News".to_string(),
            hot_table: None,
            load_more_wait_ms: 10,
            settle_ms: 250,
            collection_budget_secs: 300,
            detail_concurrency: 8,
            detail_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            on_read_error: ReadFailurePolicy::Abort,
            unenriched: UnenrichedPolicy::InsertNull,
        }
    }
}

impl IngestConfig {
    /// Load from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
        info!(path, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn paging_options(&self) -> PagingOptions {
        PagingOptions {
            load_more_wait: Duration::from_millis(self.load_more_wait_ms),
            settle: Duration::from_millis(self.settle_ms),
            budget: (self.collection_budget_secs > 0)
                .then(|| Duration::from_secs(self.collection_budget_secs)),
        }
    }

    pub fn detail_timeout(&self) -> Duration {
        Duration::from_secs(self.detail_timeout_secs)
    }

    /// Options for one feed's ingest step writing to `table`.
    pub fn ingest_options(&self, table: Option<&str>, dry_run: bool) -> IngestOptions {
        IngestOptions {
            table: table.map(str::to_string),
            on_read_error: self.on_read_error,
            unenriched: self.unenriched,
            detail_concurrency: self.detail_concurrency,
            detail_timeout: self.detail_timeout(),
            dry_run,
        }
    }
}
