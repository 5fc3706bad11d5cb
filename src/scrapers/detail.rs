//! Related-stock enrichment from article detail pages.
//!
//! Every distinct link is fetched once, concurrently, and each response is
//! keyed by the link it was requested for. Results are then written onto
//! every item carrying that link, so out-of-order completion can never put
//! one story's stocks on another.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

use crate::error::ScrapeError;
use crate::models::NewsItem;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static STOCK_TABLE: Lazy<Selector> = Lazy::new(|| selector("div.stock-list.table-responsive"));
static STOCK_ROW: Lazy<Selector> = Lazy::new(|| selector("tr"));
static STOCK_NAME: Lazy<Selector> = Lazy::new(|| selector("span"));

/// Something that can return the HTML of a detail page.
pub trait DetailFetcher {
    async fn fetch(&self, link: &str) -> Result<String, ScrapeError>;
}

/// Fetches detail pages over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpDetailFetcher {
    client: Client,
}

impl HttpDetailFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl DetailFetcher for HttpDetailFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, link: &str) -> Result<String, ScrapeError> {
        let body = self
            .client
            .get(link)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Stock names from a detail page, in table order.
///
/// A page without the stock table yields an empty list.
pub fn extract_related_stocks(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&STOCK_TABLE).next() else {
        return Vec::new();
    };
    table
        .select(&STOCK_ROW)
        .filter_map(|row| row.select(&STOCK_NAME).next())
        .map(|span| span.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Counters from one [`enrich`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichReport {
    pub links: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Attach related stocks to `items` in place.
///
/// Fetches run `concurrency` at a time, each bounded by `timeout`. A failed
/// link is logged and its items keep `related_stocks == None`; other links
/// are unaffected.
///
/// # Arguments
///
/// * `fetcher` - Source of detail page HTML
/// * `items` - Items to enrich; several items may share one link
/// * `concurrency` - Maximum fetches in flight (at least 1)
/// * `timeout` - Upper bound for each fetch
///
/// # Returns
///
/// Counts of unique links fetched, succeeded and failed. Each link is
/// fetched once and its stocks are joined back onto every item with it.
#[instrument(level = "info", skip_all, fields(items = items.len(), concurrency = concurrency, timeout = ?timeout))]
pub async fn enrich<F: DetailFetcher>(
    fetcher: &F,
    items: &mut [NewsItem],
    concurrency: usize,
    timeout: Duration,
) -> EnrichReport {
    let links: Vec<String> = items.iter().map(|i| i.link.clone()).unique().collect();
    let total = links.len();

    let results: HashMap<String, Result<Vec<String>, ScrapeError>> = stream::iter(links)
        .map(|link| async move {
            let t0 = Instant::now();
            let outcome = match tokio::time::timeout(timeout, fetcher.fetch(&link)).await {
                Ok(Ok(html)) => Ok(extract_related_stocks(&html)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ScrapeError::Timeout(timeout)),
            };
            match &outcome {
                Ok(stocks) => debug!(
                    %link,
                    stocks = stocks.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Fetched detail page"
                ),
                Err(e) => warn!(%link, error = %e, "Detail fetch failed; stocks left unset"),
            }
            (link, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = EnrichReport {
        links: total,
        ..EnrichReport::default()
    };
    for outcome in results.values() {
        if outcome.is_ok() {
            report.succeeded += 1;
        } else {
            report.failed += 1;
        }
    }

    for item in items.iter_mut() {
        if let Some(Ok(stocks)) = results.get(&item.link) {
            item.related_stocks = Some(stocks.clone());
        }
    }

    info!(
        links = report.links,
        succeeded = report.succeeded,
        failed = report.failed,
        "Enrichment finished"
    );
    report
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// Map-backed fetcher: `Ok(html)`, `Err(message)`, optional delay per link.
    #[derive(Default)]
    pub struct FakeFetcher {
        pub pages: HashMap<String, (Duration, Result<String, String>)>,
    }

    impl FakeFetcher {
        pub fn page(mut self, link: &str, stocks: &[&str]) -> Self {
            self.pages
                .insert(link.to_string(), (Duration::ZERO, Ok(detail_page(stocks))));
            self
        }

        pub fn delayed(mut self, link: &str, delay: Duration, stocks: &[&str]) -> Self {
            self.pages
                .insert(link.to_string(), (delay, Ok(detail_page(stocks))));
            self
        }

        pub fn failing(mut self, link: &str) -> Self {
            self.pages
                .insert(link.to_string(), (Duration::ZERO, Err("connection reset".to_string())));
            self
        }
    }

    impl DetailFetcher for FakeFetcher {
        async fn fetch(&self, link: &str) -> Result<String, ScrapeError> {
            let Some((delay, outcome)) = self.pages.get(link) else {
                return Err(ScrapeError::Extraction(format!("no page for {link}")));
            };
            if !delay.is_zero() {
                tokio::time::sleep(*delay).await;
            }
            outcome.clone().map_err(ScrapeError::Browser)
        }
    }

    pub fn detail_page(stocks: &[&str]) -> String {
        if stocks.is_empty() {
            return "<html><body><article>No stocks here</article></body></html>".to_string();
        }
        let rows: String = stocks
            .iter()
            .map(|s| format!("<tr><td><span> {s} </span></td><td>0.00</td></tr>"))
            .collect();
        format!(
            r#"<html><body><div class="stock-list table-responsive"><table>{rows}</table></div></body></html>"#
        )
    }
}
