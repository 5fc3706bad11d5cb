//! Paging through the market news listing.
//!
//! The listing is newest-first and grows at the bottom each time "load more"
//! is clicked. [`PaginationController::collect`] reads the page, and while the
//! oldest item shown is still inside the staleness window of the target time
//! it asks for more. The first page whose oldest item falls outside the window
//! is the boundary page: its items are kept and paging stops.
//!
//! Every read re-parses the whole page, so items are merged by link and keep
//! the order they were first seen in. A failure on one page stops paging but
//! keeps everything collected so far.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, NaiveTime};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::browser::{LoadMore, PageSession};
use super::listing::{parse_hot_news, parse_market_page};
use crate::models::NewsItem;

/// Paging stops once the oldest item is more than this many hours before the target.
pub const STALENESS_WINDOW_HOURS: i64 = 3;

/// Collection target for a run started at `now`: the start of that day.
///
/// A run collects the whole day so far, back to the staleness window before
/// midnight, however late in the day it starts.
pub fn target_for_run(now: NaiveDateTime) -> NaiveDateTime {
    now.date().and_time(NaiveTime::MIN)
}

/// Why the collection loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The oldest item on the page crossed the staleness window.
    BoundaryCrossed,
    /// The page had no parsable timestamp for its last item.
    NoTimestamp,
    /// The load-more control did not appear in time.
    EndOfList,
    /// Reading, parsing or clicking failed.
    PageError,
    /// The overall collection deadline passed.
    BudgetExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::BoundaryCrossed => "boundary_crossed",
            StopReason::NoTimestamp => "no_timestamp",
            StopReason::EndOfList => "end_of_list",
            StopReason::PageError => "page_error",
            StopReason::BudgetExhausted => "budget_exhausted",
        };
        f.write_str(s)
    }
}

/// Everything gathered by one collection run.
#[derive(Debug)]
pub struct Collection {
    pub market: Vec<NewsItem>,
    /// Hot news sidebar from the first rendering.
    pub hot: Vec<NewsItem>,
    pub pages: usize,
    pub stop: StopReason,
}

/// Timing knobs for [`PaginationController`].
#[derive(Debug, Clone)]
pub struct PagingOptions {
    /// How long to wait for the load-more control on each attempt.
    pub load_more_wait: Duration,
    /// Pause after a click before the page is read again.
    pub settle: Duration,
    /// Hard limit for the whole collection.
    pub budget: Option<Duration>,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            load_more_wait: Duration::from_millis(10),
            settle: Duration::from_millis(250),
            budget: Some(Duration::from_secs(300)),
        }
    }
}

/// Owns the page session for the whole collection.
pub struct PaginationController<P> {
    session: P,
    base: Url,
    options: PagingOptions,
}

impl<P: PageSession> PaginationController<P> {
    pub fn new(session: P, base: Url, options: PagingOptions) -> Self {
        Self {
            session,
            base,
            options,
        }
    }

    /// Collect market items back to the staleness boundary of `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - Reference time; paging stops on the first page whose oldest
    ///   item is more than [`STALENESS_WINDOW_HOURS`] before it
    ///
    /// # Returns
    ///
    /// The market items in first-seen order, the hot news sidebar, the number
    /// of pages read and why paging stopped. Page failures end the loop but
    /// never discard items already collected.
    ///
    /// Always starts from the page as currently rendered (newest first), so a
    /// rerun for the same target returns at least what an earlier partial run
    /// returned.
    #[instrument(level = "info", skip(self), fields(base = %self.base))]
    pub fn collect(&mut self, target: NaiveDateTime) -> Collection {
        let deadline = self.options.budget.map(|b| Instant::now() + b);
        let cutoff = target - chrono::Duration::hours(STALENESS_WINDOW_HOURS);

        let mut seen = HashSet::new();
        let mut market = Vec::new();
        let mut hot = Vec::new();
        let mut pages = 0usize;

        let stop = loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(pages, "Collection budget exhausted");
                break StopReason::BudgetExhausted;
            }

            let html = match self.session.html() {
                Ok(html) => html,
                Err(e) => {
                    warn!(pages, error = %e, "Failed to read listing page; keeping items so far");
                    break StopReason::PageError;
                }
            };
            pages += 1;

            if pages == 1 {
                hot = parse_hot_news(&html, &self.base);
            }

            let page = match parse_market_page(&html, &self.base) {
                Ok(page) => page,
                Err(e) => {
                    warn!(page = pages, error = %e, "Extraction failed; keeping items so far");
                    break StopReason::PageError;
                }
            };

            let before = market.len();
            for item in page.items {
                if seen.insert(item.link.clone()) {
                    market.push(item);
                }
            }
            debug!(page = pages, added = market.len() - before, total = market.len(), "Absorbed page");

            let Some(last) = page.last_published else {
                info!(page = pages, "No timestamp on last item; stopping");
                break StopReason::NoTimestamp;
            };
            if last < cutoff {
                info!(page = pages, %last, %cutoff, "Crossed staleness boundary");
                break StopReason::BoundaryCrossed;
            }

            match self.session.load_more(self.options.load_more_wait) {
                Ok(LoadMore::Loaded) => {
                    if !self.options.settle.is_zero() {
                        std::thread::sleep(self.options.settle);
                    }
                }
                Ok(LoadMore::Exhausted) => {
                    info!(page = pages, "Load-more unavailable; end of list");
                    break StopReason::EndOfList;
                }
                Err(e) => {
                    warn!(page = pages, error = %e, "Load-more failed; keeping items so far");
                    break StopReason::PageError;
                }
            }
        };

        info!(
            pages,
            market = market.len(),
            hot = hot.len(),
            stop = %stop,
            "Collection finished"
        );
        Collection {
            market,
            hot,
            pages,
            stop,
        }
    }

    #[cfg(test)]
    pub fn into_session(self) -> P {
        self.session
    }
}
