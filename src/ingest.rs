//! Per-feed ingest: enrich → language filter → dedup → insert.
//!
//! Takes the items collected for one feed and decides which of them become
//! new rows. Every collected item is accounted for in the returned
//! [`RunSummary`].

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::{existing_titles, reconcile};
use crate::error::IngestError;
use crate::language::LanguageFilter;
use crate::models::{Feed, NewsItem, RunSummary};
use crate::scrapers::detail::{DetailFetcher, enrich};
use crate::store::Store;
use crate::utils::truncate_for_log;

/// What to do when the existing rows cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Stop the feed; nothing is inserted.
    Abort,
    /// Carry on as if the table were empty. Can re-insert stored stories.
    TreatAsEmpty,
}

/// What to do with items whose detail page could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnenrichedPolicy {
    /// Insert with `RelatedStocks = NULL`.
    InsertNull,
    /// Leave them out of this run; the next run picks them up again.
    HoldBack,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Destination table; `None` runs everything but the read and insert.
    pub table: Option<String>,
    pub on_read_error: ReadFailurePolicy,
    pub unenriched: UnenrichedPolicy,
    pub detail_concurrency: usize,
    pub detail_timeout: Duration,
    /// Skip the insert but still read and dedup.
    pub dry_run: bool,
}

/// Run one feed through enrichment, filtering, dedup and insert.
///
/// # Arguments
///
/// * `feed` - Which listing block the items came from
/// * `items` - Collected items, unenriched
/// * `fetcher` - Detail page source used for related stocks
/// * `filter` - English vote applied to every title
/// * `store` - Table holding earlier runs' rows
/// * `options` - Destination table, policies and enrichment limits
///
/// # Returns
///
/// A [`RunSummary`] in which every collected item is counted exactly once.
/// Without a destination table the feed is report-only: detail pages are not
/// fetched, and nothing is read or written.
///
/// # Errors
///
/// - [`IngestError::StoreRead`] when existing rows cannot be read and the
///   policy is [`ReadFailurePolicy::Abort`]
/// - [`IngestError::StoreWrite`] when the batch is rejected or the insert
///   fails; no rows of the batch are written in that case
#[instrument(level = "info", skip_all, fields(feed = feed.as_str(), items = items.len()))]
pub async fn ingest_feed<F, S>(
    feed: Feed,
    mut items: Vec<NewsItem>,
    fetcher: &F,
    filter: &LanguageFilter,
    store: &mut S,
    options: &IngestOptions,
) -> Result<RunSummary, IngestError>
where
    F: DetailFetcher,
    S: Store,
{
    let mut summary = RunSummary::for_feed(feed, options.table.as_deref());
    summary.collected = items.len();
    summary.dry_run = options.dry_run;

    // Stocks only matter for rows that get stored.
    if options.table.is_none() {
        debug!("No table configured; skipping detail pages");
    } else {
        let report = enrich(
            fetcher,
            &mut items,
            options.detail_concurrency,
            options.detail_timeout,
        )
        .await;
        summary.enrichment_failures = report.failed;
        summary.enriched = items.iter().filter(|i| i.is_enriched()).count();
    }

    if options.table.is_some() && options.unenriched == UnenrichedPolicy::HoldBack {
        let before = items.len();
        items.retain(NewsItem::is_enriched);
        summary.held_back = before - items.len();
        if summary.held_back > 0 {
            info!(held_back = summary.held_back, "Holding back unenriched items");
        }
    }

    let before = items.len();
    items.retain(|item| {
        let keep = filter.is_english(&item.title);
        if !keep {
            info!(title = %truncate_for_log(&item.title, 80), "Dropping non-English title");
        }
        keep
    });
    summary.non_english = before - items.len();

    let Some(table) = options.table.as_deref() else {
        let reconciled = reconcile(items, &HashSet::new());
        summary.duplicates_in_batch = reconciled.duplicates_in_batch;
        info!(candidates = reconciled.fresh.len(), "No table configured; report only");
        return Ok(summary);
    };

    let existing = match store.read_all(table) {
        Ok(rows) => existing_titles(&rows),
        Err(e) => match options.on_read_error {
            ReadFailurePolicy::Abort => {
                error!(%table, error = %e, "Error reading existing rows; aborting feed");
                return Err(IngestError::StoreRead(e));
            }
            ReadFailurePolicy::TreatAsEmpty => {
                warn!(
                    %table,
                    error = %e,
                    "Error reading existing rows; continuing with an empty set, stored stories may be re-inserted"
                );
                summary.existing_read_failed = true;
                HashSet::new()
            }
        },
    };

    let reconciled = reconcile(items, &existing);
    summary.duplicates_in_batch = reconciled.duplicates_in_batch;
    summary.already_stored = reconciled.already_stored;

    if reconciled.fresh.is_empty() {
        info!(%table, "No new data to insert");
        return Ok(summary);
    }
    if options.dry_run {
        info!(%table, would_insert = reconciled.fresh.len(), "Dry run; skipping insert");
        return Ok(summary);
    }

    match store.insert_many(table, &reconciled.fresh) {
        Ok(inserted) => {
            summary.inserted = inserted;
            info!(%table, inserted, "Inserted new rows");
            Ok(summary)
        }
        Err(e) => {
            error!(%table, error = %e, "Error inserting rows; batch discarded");
            Err(IngestError::StoreWrite(e))
        }
    }
}
