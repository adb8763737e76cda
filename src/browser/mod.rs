//! Browser automation: raw page primitives plus the convenience layer the
//! fetcher is written against.
//!
//! [`PagePrimitives`] is what a concrete browser has to provide. [`PageExt`]
//! is implemented for every page and composes those primitives into
//! click-if-present, bounded click loops, strict reads and URL waits.

pub mod chrome;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::{HarvestError, Result};

/// How often the polling helpers re-query the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Navigation-completion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// The navigation was committed (response received).
    Commit,
    DomContentLoaded,
    Load,
    /// No network activity for a short quiet period.
    #[default]
    NetworkIdle,
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WaitUntil::Commit => "commit",
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "commit" => Ok(WaitUntil::Commit),
            "domcontentloaded" => Ok(WaitUntil::DomContentLoaded),
            "load" => Ok(WaitUntil::Load),
            "networkidle" => Ok(WaitUntil::NetworkIdle),
            other => Err(format!("unknown wait policy '{}'", other)),
        }
    }
}

/// A response body captured while a page was loading.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    pub url: String,
    pub body: Vec<u8>,
}

/// Raw capabilities of one live browser page.
#[allow(async_fn_in_trait)]
pub trait PagePrimitives {
    /// Opaque reference to an element found by [`PagePrimitives::query`].
    type Handle;

    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<()>;
    /// Block until the current document reaches `wait`.
    async fn wait_for_load(&mut self, wait: WaitUntil) -> Result<()>;
    async fn current_url(&self) -> Result<Option<String>>;
    async fn query(&self, selector: &str) -> Result<Option<Self::Handle>>;
    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;
    async fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>>;
    async fn read_text(&self, selector: &str) -> Result<Option<String>>;
    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;
    /// Start remembering responses whose URL ends with `suffix`.
    async fn capture_responses(&mut self, suffix: &str) -> Result<()>;
    /// Bodies of the responses remembered since [`PagePrimitives::capture_responses`].
    async fn take_responses(&mut self) -> Result<Vec<CapturedResponse>>;
    async fn close(self) -> Result<()>;
}

/// The shared browser context pages are opened in.
#[allow(async_fn_in_trait)]
pub trait Session {
    type Page: PagePrimitives;

    async fn open_page(&mut self) -> Result<Self::Page>;
    async fn shutdown(&mut self) -> Result<()>;
}

/// Convenience operations layered over [`PagePrimitives`].
#[allow(async_fn_in_trait)]
pub trait PageExt: PagePrimitives {
    /// Click `selector` if it is on the page. Returns whether it was clicked.
    async fn click_if_present(&self, selector: &str) -> Result<bool> {
        if self.query(selector).await?.is_some() {
            self.click(selector).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Keep clicking `selector`, pausing `interval` after each click, until it
    /// disappears. Fails once `max_clicks` clicks did not make it go away.
    async fn click_while_present(
        &self,
        selector: &str,
        interval: Duration,
        max_clicks: usize,
    ) -> Result<usize> {
        let mut clicks = 0;
        while self.query(selector).await?.is_some() {
            if clicks == max_clicks {
                return Err(HarvestError::ClickLimit {
                    selector: selector.to_string(),
                    clicks,
                });
            }
            self.click(selector).await?;
            clicks += 1;
            sleep(interval).await;
        }
        log::debug!("'{}' gone after {} clicks", selector, clicks);
        Ok(clicks)
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<Self::Handle> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(handle) = self.query(selector).await? {
                return Ok(handle);
            }
            if Instant::now() >= deadline {
                return Err(HarvestError::Timeout {
                    what: format!("selector '{}'", selector),
                    after: timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for `selector` to show up, then click it.
    async fn click_when_present(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, timeout).await?;
        log::debug!("Clicking '{}'", selector);
        self.click(selector).await
    }

    async fn strict_query(&self, selector: &str) -> Result<Self::Handle> {
        self.query(selector)
            .await?
            .ok_or_else(|| HarvestError::NotFound { selector: selector.to_string() })
    }

    /// Attribute of the first match; a missing element or an empty value is an error.
    async fn strict_read_attribute(&self, selector: &str, name: &str) -> Result<String> {
        match self.read_attribute(selector, name).await? {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(HarvestError::NotFound {
                selector: format!("{}[{}]", selector, name),
            }),
        }
    }

    /// Text of the first match; a missing element or empty text is an error.
    async fn strict_read_text(&self, selector: &str) -> Result<String> {
        match self.read_text(selector).await? {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(HarvestError::NotFound { selector: selector.to_string() }),
        }
    }

    /// Wait until the page has navigated to `url`, then until it reaches `wait`.
    async fn wait_for_url(&mut self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while self.current_url().await?.as_deref() != Some(url) {
            if Instant::now() >= deadline {
                return Err(HarvestError::Timeout {
                    what: format!("URL {}", url),
                    after: timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
        self.wait_for_load(wait).await
    }
}

impl<P: PagePrimitives> PageExt for P {}
