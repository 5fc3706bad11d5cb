//! # Market News Ingest
//!
//! A batch job that collects market news headlines from a paginated listing
//! page, attaches the stocks each story references, drops non-English
//! headlines, and stores only stories that are not already in the database.
//!
//! ## Usage
//!
//! ```sh
//! market_news_ingest --database ./news.db -j ./reports
//! ```
//!
//! ## Architecture
//!
//! The run follows a pipeline:
//! 1. **Collection**: page through the listing in headless Chrome back to the
//!    staleness boundary (sequential, blocking thread)
//! 2. **Enrichment**: fetch each story's detail page for its related stocks
//!    (concurrent, joined back by link)
//! 3. **Filtering**: keep titles either language classifier calls English
//! 4. **Dedup**: drop repeats within the batch and titles already stored
//! 5. **Insert**: one transaction per feed, then a summary and optional JSON report

use std::error::Error;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use clap::Parser;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};
use url::Url;

mod cli;
mod config;
mod dedup;
mod error;
mod ingest;
mod language;
mod models;
mod outputs;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use config::IngestConfig;
use error::ScrapeError;
use ingest::ingest_feed;
use language::LanguageFilter;
use models::{Feed, NewsItem, RunSummary};
use outputs::json::{RunReport, write_run_report};
use scrapers::browser::ChromeSession;
use scrapers::detail::HttpDetailFetcher;
use scrapers::pagination::{Collection, PaginationController, PagingOptions, target_for_run};
use store::SqliteStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    let started_at = Local::now().naive_local();
    info!("market_news_ingest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match IngestConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            println!("❌ Error loading configuration: {e}");
            return Err(e.into());
        }
    };

    // Early check: ensure report dir is writable before spending time scraping
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Report directory is not writable");
            println!("❌ Report directory {dir} is not writable: {e}");
            return Err(e);
        }
    }

    let target = target_for_run(started_at);
    info!(%target, "Collecting news for today");
    let mut summaries: Vec<RunSummary> = Vec::new();

    let outcome = run(&args, &config, target, &mut summaries).await;
    let run_error = outcome.as_ref().err().map(|e| e.to_string());
    if let Some(e) = &run_error {
        error!(error = %e, "Run failed");
        println!("❌ Run failed: {e}");
    }

    if let Some(dir) = &args.json_output_dir {
        let report = RunReport {
            target,
            started_at,
            error: run_error.clone(),
            feeds: &summaries,
        };
        if let Err(e) = write_run_report(&report, dir).await {
            error!(error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        inserted = summaries.iter().map(|s| s.inserted).sum::<usize>(),
        "Execution complete"
    );

    match run_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Collect, then ingest each feed. Per-feed failures are printed and recorded
/// in `summaries`; the returned error is the first run-level failure.
async fn run(
    args: &Cli,
    config: &IngestConfig,
    target: NaiveDateTime,
    summaries: &mut Vec<RunSummary>,
) -> Result<(), Box<dyn Error>> {
    let base = Url::parse(&config.base_url)?;

    // ---- Collection ----
    let collection = collect_listing(
        config.listing_url.clone(),
        config.user_agent.clone(),
        base,
        config.paging_options(),
        target,
    )
    .await?;
    info!(
        market = collection.market.len(),
        hot = collection.hot.len(),
        pages = collection.pages,
        stop = %collection.stop,
        "Collected listing"
    );

    // ---- Collaborators ----
    let fetcher = HttpDetailFetcher::new(config.detail_timeout(), &config.user_agent)?;
    let language = LanguageFilter::default();
    let mut store = SqliteStore::open(&args.database)?;
    store.ensure_table(&config.market_table)?;
    if let Some(hot_table) = &config.hot_table {
        store.ensure_table(hot_table)?;
    }

    let feeds: [(Feed, Vec<NewsItem>, Option<&str>); 2] = [
        (Feed::Market, collection.market, Some(config.market_table.as_str())),
        (Feed::Hot, collection.hot, config.hot_table.as_deref()),
    ];

    let mut first_error: Option<Box<dyn Error>> = None;
    for (feed, items, table) in feeds {
        let options = config.ingest_options(table, args.dry_run);
        match ingest_feed(feed, items, &fetcher, &language, &mut store, &options).await {
            Ok(mut summary) => {
                if feed == Feed::Market {
                    summary.stop_reason = Some(collection.stop.to_string());
                }
                print_summary(&summary);
                summaries.push(summary);
            }
            Err(e) => {
                println!("❌ [{}] {e}", feed.as_str());
                let mut summary = RunSummary::for_feed(feed, table);
                summary.dry_run = args.dry_run;
                summaries.push(summary);
                first_error.get_or_insert_with(|| e.into());
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Drive the browser on a blocking thread; the session closes when it drops.
#[instrument(level = "info", skip(user_agent, base, paging))]
async fn collect_listing(
    listing_url: String,
    user_agent: String,
    base: Url,
    paging: PagingOptions,
    target: NaiveDateTime,
) -> Result<Collection, Box<dyn Error>> {
    let handle = tokio::task::spawn_blocking(move || -> Result<Collection, ScrapeError> {
        let session = ChromeSession::open(&listing_url, &user_agent)?;
        let mut controller = PaginationController::new(session, base, paging);
        Ok(controller.collect(target))
    });

    match handle.await {
        Ok(Ok(collection)) => Ok(collection),
        Ok(Err(e)) => {
            error!(error = %e, "Could not open listing page");
            Err(e.into())
        }
        Err(e) => {
            warn!(error = %e, "Collection thread did not finish");
            Err(e.into())
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let feed = summary.feed.map(|f| f.as_str()).unwrap_or("feed");
    let Some(table) = &summary.table else {
        println!(
            "ℹ️ [{feed}] {} collected, not stored (no table configured).",
            summary.collected
        );
        return;
    };
    if summary.existing_read_failed {
        println!("⚠️ [{feed}] Error reading {table}; deduplicated against an empty set.");
    }
    if summary.inserted > 0 {
        println!("✅ [{feed}] Inserted {} new rows into {table}.", summary.inserted);
    } else if summary.dry_run {
        println!("ℹ️ [{feed}] Dry run; nothing inserted into {table}.");
    } else {
        println!("⚠️ [{feed}] No new data to insert into {table}.");
    }
}
