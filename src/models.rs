//! Data models for scraped news items and per-run reporting.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsItem`]: One headline as it moves through collection, enrichment and dedup
//! - [`StoredRow`]: A row already persisted in the news table
//! - [`Feed`]: Which part of the listing page an item came from
//! - [`RunSummary`]: Counts for one feed, printed and optionally written as JSON

use serde::{Deserialize, Serialize};

use crate::dedup::normalize_title;

/// A news headline scraped from the listing page.
///
/// `related_stocks` has three meaningful states:
/// - `None`: not enriched (the detail fetch never ran or failed)
/// - `Some(vec![])`: enriched, the story references no stocks
/// - `Some(stocks)`: enriched with the stock names in page order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsItem {
    /// Headline text, trimmed and non-empty.
    pub title: String,
    /// Absolute URL of the story. Join key for enrichment.
    pub link: String,
    /// Published date exactly as the site renders it.
    pub published_at: String,
    /// Stocks listed on the story's detail page.
    pub related_stocks: Option<Vec<String>>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        published_at: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: published_at.into(),
            related_stocks: None,
        }
    }

    /// Deduplication key for this item's title.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    pub fn is_enriched(&self) -> bool {
        self.related_stocks.is_some()
    }

    /// Stocks in their stored textual form: `", "`-joined, `None` when unenriched.
    pub fn stocks_column(&self) -> Option<String> {
        self.related_stocks.as_ref().map(|stocks| stocks.join(", "))
    }
}

/// A row read back from the news table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredRow {
    pub title: String,
    pub link: String,
    pub published_date: String,
    pub related_stocks: Option<String>,
}

/// The two item lists the listing page carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    /// The paginated market news list.
    Market,
    /// The "hot news" sidebar, present on the first rendering only.
    Hot,
}

impl Feed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Market => "market",
            Feed::Hot => "hot",
        }
    }
}

/// Counters for one feed in one run.
///
/// Every collected item ends in exactly one terminal bucket: inserted,
/// duplicate (in batch or already stored), non-English, or held back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunSummary {
    pub feed: Option<Feed>,
    /// Destination table, `None` when the feed is report-only.
    pub table: Option<String>,
    pub collected: usize,
    pub enriched: usize,
    pub enrichment_failures: usize,
    pub held_back: usize,
    pub non_english: usize,
    pub duplicates_in_batch: usize,
    pub already_stored: usize,
    pub inserted: usize,
    /// Set when the store could not be read and the run went on with an empty set.
    pub existing_read_failed: bool,
    pub dry_run: bool,
    /// Why pagination stopped (market feed only).
    pub stop_reason: Option<String>,
}

impl RunSummary {
    pub fn for_feed(feed: Feed, table: Option<&str>) -> Self {
        Self {
            feed: Some(feed),
            table: table.map(str::to_string),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_item_starts_unenriched() {
        let item = NewsItem::new("Fed Raises Rates", "https://example.com/a", "2025-03-10 09:00:00");
        assert!(!item.is_enriched());
        assert_eq!(item.stocks_column(), None);
    }

    #[test]
    fn test_stocks_column_distinguishes_empty_from_unset() {
        let mut item = NewsItem::new("Oil Prices Surge", "https://example.com/b", "2025-03-10");
        item.related_stocks = Some(vec![]);
        assert_eq!(item.stocks_column(), Some(String::new()));

        item.related_stocks = Some(vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(item.stocks_column(), Some("AAPL, MSFT".to_string()));
    }

    #[test]
    fn test_normalized_title_ignores_case_and_punctuation() {
        let a = NewsItem::new("Fed Raises Rates!!", "https://example.com/a", "");
        let b = NewsItem::new("  fed raises rates", "https://example.com/b", "");
        assert_eq!(a.normalized_title(), b.normalized_title());
    }

    #[test]
    fn test_run_summary_serialization() {
        let mut summary = RunSummary::for_feed(Feed::Market, Some("Market_News"));
        summary.inserted = 3;
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"feed\":\"market\""));
        assert!(json.contains("\"inserted\":3"));
        assert!(json.contains("Market_News"));
    }
}
