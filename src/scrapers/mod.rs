//! Upstream site access: the rendered listing and per-article detail pages.
//!
//! Collection follows a two-phase pattern:
//!
//! 1. **Listing**: page through the market news list in a headless browser until
//!    the staleness boundary ([`pagination`], [`browser`], [`listing`])
//! 2. **Detail**: fetch each article page over HTTP and attach its related
//!    stocks ([`detail`])
//!
//! | Module | Role |
//! |--------|------|
//! | [`browser`] | `PageSession` trait and the headless Chrome session |
//! | [`listing`] | HTML → `NewsItem` for the market list and hot news sidebar |
//! | [`pagination`] | "load more" loop with its stop rules |
//! | [`detail`] | concurrent detail fetches joined back by link |
//!
//! Failures are isolated: a bad page ends paging with what was already
//! collected, and a bad detail link only leaves that link's items unenriched.

pub mod browser;
pub mod detail;
pub mod listing;
pub mod pagination;
