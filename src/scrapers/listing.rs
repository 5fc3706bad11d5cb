//! Listing page parser.
//!
//! Parses the rendered news listing into [`NewsItem`]s. The page carries two
//! lists:
//!
//! - the market news list (`div#section`), which grows every time the
//!   "load more" control is clicked
//! - the hot news sidebar (`div.channel`), rendered once
//!
//! Items missing a title, link or date are skipped with a debug log; a page
//! without the market container at all is an extraction error.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use crate::error::ScrapeError;
use crate::models::NewsItem;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static MARKET_SECTION: Lazy<Selector> = Lazy::new(|| selector("div#section"));
static MARKET_ARTICLE: Lazy<Selector> = Lazy::new(|| selector("div.item.figure.flex-block"));
static MOMENT_DATE: Lazy<Selector> = Lazy::new(|| selector("span.moment-date[data-date]"));
static DATED_SPAN: Lazy<Selector> = Lazy::new(|| selector("span[data-date]"));
static HEADLINE: Lazy<Selector> = Lazy::new(|| selector("h2"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static HOT_CHANNEL: Lazy<Selector> = Lazy::new(|| selector("div.channel"));
static HOT_ENTRY: Lazy<Selector> = Lazy::new(|| selector("li"));
static SPAN: Lazy<Selector> = Lazy::new(|| selector("span"));

/// One parse of the market news list.
#[derive(Debug, Default)]
pub struct MarketPage {
    /// Items in page order (newest first).
    pub items: Vec<NewsItem>,
    /// Timestamp of the last (oldest) item; `None` when absent or unparsable.
    pub last_published: Option<NaiveDateTime>,
    /// Articles that were present but incomplete.
    pub skipped: usize,
}

/// Parse the market news list of a rendered listing page.
///
/// # Errors
///
/// [`ScrapeError::Extraction`] when the market container is missing, which
/// means the page structure no longer matches.
#[instrument(level = "debug", skip_all, fields(bytes = html.len()))]
pub fn parse_market_page(html: &str, base: &Url) -> Result<MarketPage, ScrapeError> {
    let document = Html::parse_document(html);
    let section = document
        .select(&MARKET_SECTION)
        .next()
        .ok_or_else(|| ScrapeError::Extraction("market news container not found".into()))?;

    let mut page = MarketPage::default();
    for article in section.select(&MARKET_ARTICLE) {
        match market_item(article, base) {
            Some(item) => page.items.push(item),
            None => page.skipped += 1,
        }
    }

    page.last_published = section
        .select(&MOMENT_DATE)
        .last()
        .and_then(|span| span.value().attr("data-date"))
        .and_then(parse_published);

    debug!(
        items = page.items.len(),
        skipped = page.skipped,
        last_published = ?page.last_published,
        "Parsed market page"
    );
    Ok(page)
}

fn market_item(article: ElementRef<'_>, base: &Url) -> Option<NewsItem> {
    let href = article.select(&LINK).next()?.value().attr("href")?;
    let link = base.join(href).ok()?;
    let title = article
        .select(&HEADLINE)
        .next()
        .map(|h| element_text(&h))
        .filter(|t| !t.is_empty());
    let Some(title) = title else {
        debug!(%link, "Market article without a headline");
        return None;
    };
    let published = article
        .select(&DATED_SPAN)
        .next()?
        .value()
        .attr("data-date")?
        .trim()
        .to_string();

    Some(NewsItem::new(title, link.to_string(), published))
}

/// Parse the hot news sidebar. Missing sidebar yields an empty list.
#[instrument(level = "debug", skip_all, fields(bytes = html.len()))]
pub fn parse_hot_news(html: &str, base: &Url) -> Vec<NewsItem> {
    let document = Html::parse_document(html);
    let Some(channel) = document.select(&HOT_CHANNEL).next() else {
        debug!("No hot news sidebar on page");
        return Vec::new();
    };

    let items: Vec<NewsItem> = channel
        .select(&HOT_ENTRY)
        .filter_map(|entry| {
            let anchor = entry.select(&LINK).next()?;
            let title = element_text(&anchor);
            if title.is_empty() {
                return None;
            }
            let link = base.join(anchor.value().attr("href")?).ok()?;
            // the second span holds the date text
            let published = entry.select(&SPAN).nth(1).map(|s| element_text(&s))?;
            Some(NewsItem::new(title, link.to_string(), published))
        })
        .collect();

    debug!(count = items.len(), "Parsed hot news");
    items
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a `data-date` attribute.
///
/// Accepts RFC 3339 (the offset is dropped, keeping the site's wall clock),
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and a bare `YYYY-MM-DD`
/// (read as midnight).
pub fn parse_published(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthetic listing pages shaped like the real site.

    /// Market list with `(slug, title, data-date)` articles plus a hot sidebar.
    pub fn listing_page(articles: &[(&str, &str, &str)]) -> String {
        let mut body = String::from(
            r#"<html><body>
            <div class="channel"><ul>
              <li><a href="/v2/news/view/900/hot-one">KLCI opens higher</a><span>1</span><span>2025-03-10 08:00</span></li>
              <li><a href="/v2/news/view/901/hot-two">  Ringgit   firm vs USD </a><span>2</span><span>2025-03-10 07:30</span></li>
            </ul></div>
            <div id="section">"#,
        );
        for (slug, title, date) in articles {
            body.push_str(&format!(
                r#"<div class="item figure flex-block">
                  <a href="/v2/news/view/{slug}"><h2>{title}</h2></a>
                  <span class="moment-date" data-date="{date}">{date}</span>
                </div>"#
            ));
        }
        body.push_str(r#"<div class="figure_loading">Load more</div></div></body></html>"#);
        body
    }
}
