//! Rendered page access for the listing.
//!
//! The listing only grows when its "load more" control is clicked, so it needs
//! a real browser. [`PageSession`] is the seam: pagination talks to the trait,
//! [`ChromeSession`] drives headless Chrome, and tests script pages by hand.
//!
//! The Chrome process is owned by the session and is shut down when the
//! session is dropped, on success and on every error path.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info, instrument};

use crate::error::ScrapeError;

/// CSS selector of the "load more" control at the bottom of the listing.
pub const LOAD_MORE_SELECTOR: &str = ".figure_loading";

/// Result of asking the page for more items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// The control was clicked; the page is expected to grow.
    Loaded,
    /// The control did not become available in time: end of the list.
    Exhausted,
}

/// A rendered page that can be read and extended.
pub trait PageSession {
    /// Current HTML of the page, including anything loaded so far.
    fn html(&mut self) -> Result<String, ScrapeError>;

    /// Trigger the "load more" control, waiting at most `wait` for it.
    fn load_more(&mut self, wait: Duration) -> Result<LoadMore, ScrapeError>;
}

/// Headless Chrome tab showing the listing page.
pub struct ChromeSession {
    // Keeps the Chrome process alive; dropping it kills the browser.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    /// Launch headless Chrome and open `url`.
    #[instrument(level = "info", skip(user_agent))]
    pub fn open(url: &str, user_agent: &str) -> Result<Self, ScrapeError> {
        info!("Launching headless Chrome browser");

        let agent_arg = format!("--user-agent={user_agent}");
        let options = LaunchOptions {
            headless: true,
            sandbox: false,
            args: vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new(agent_arg.as_str()),
                OsStr::new("--window-size=1920,1080"),
            ],
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| {
            ScrapeError::Browser(format!(
                "failed to launch headless Chrome (is Chrome/Chromium installed?): {e}"
            ))
        })?;
        let tab = browser
            .new_tab()
            .map_err(|e| ScrapeError::Browser(format!("failed to open tab: {e}")))?;
        tab.navigate_to(url)
            .map_err(|e| ScrapeError::Browser(format!("failed to navigate to {url}: {e}")))?;
        tab.wait_until_navigated()
            .map_err(|e| ScrapeError::Browser(format!("navigation to {url} did not finish: {e}")))?;

        info!("Listing page loaded");
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

impl PageSession for ChromeSession {
    fn html(&mut self) -> Result<String, ScrapeError> {
        self.tab
            .get_content()
            .map_err(|e| ScrapeError::Browser(format!("failed to read page content: {e}")))
    }

    fn load_more(&mut self, wait: Duration) -> Result<LoadMore, ScrapeError> {
        let button = match self
            .tab
            .wait_for_element_with_custom_timeout(LOAD_MORE_SELECTOR, wait)
        {
            Ok(button) => button,
            Err(e) => {
                debug!(?wait, error = %e, "Load-more control not available");
                return Ok(LoadMore::Exhausted);
            }
        };
        button
            .click()
            .map_err(|e| ScrapeError::Browser(format!("failed to click load-more: {e}")))?;
        Ok(LoadMore::Loaded)
    }
}
