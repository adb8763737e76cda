//! Chrome over the DevTools protocol (`chromiumoxide`).

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::{FutureExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::{CapturedResponse, PageExt, PagePrimitives, Session, WaitUntil};
use crate::config::Config;
use crate::error::{HarvestError, Result};

/// Quiet period treated as "network idle" when waiting on an already loaded document.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub profile_dir: PathBuf,
    pub download_dir: PathBuf,
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub nav_timeout: Duration,
}

impl From<&Config> for ChromeOptions {
    fn from(config: &Config) -> Self {
        Self {
            profile_dir: config.profile_dir(),
            download_dir: config.download_dir(),
            headless: config.headless,
            executable: config.chrome_executable.clone(),
            nav_timeout: config.nav_timeout,
        }
    }
}

/// One persistent-profile Chrome instance, launched on the first page request.
pub struct ChromeSession {
    options: ChromeOptions,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl ChromeSession {
    pub fn new(options: ChromeOptions) -> Self {
        Self {
            options,
            browser: None,
            handler: None,
        }
    }

    async fn browser(&mut self) -> Result<&Browser> {
        if self.browser.is_none() {
            let browser = self.launch().await?;
            self.browser = Some(browser);
        }
        self.browser
            .as_ref()
            .ok_or_else(|| HarvestError::BrowserLaunch("browser not running".to_string()))
    }

    async fn launch(&mut self) -> Result<Browser> {
        let profile = &self.options.profile_dir;
        std::fs::create_dir_all(profile).map_err(HarvestError::io(profile))?;
        let downloads = &self.options.download_dir;
        std::fs::create_dir_all(downloads).map_err(HarvestError::io(downloads))?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile)
            .request_timeout(self.options.nav_timeout);
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(HarvestError::BrowserLaunch)?;

        log::info!("Launching Chrome with profile {}", profile.display());
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::BrowserLaunch(e.to_string()))?;

        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("CDP handler error: {}", e);
                }
            }
        }));

        let downloads = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(downloads.to_string_lossy().into_owned())
            .build()
            .map_err(HarvestError::BrowserLaunch)?;
        browser.execute(downloads).await?;

        Ok(browser)
    }
}

impl Session for ChromeSession {
    type Page = ChromePage;

    async fn open_page(&mut self) -> Result<ChromePage> {
        let nav_timeout = self.options.nav_timeout;
        let page = self.browser().await?.new_page("about:blank").await?;
        page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
        Ok(ChromePage {
            page,
            nav_timeout,
            capture: None,
        })
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut browser) = self.browser.take() {
            browser.close().await?;
            if let Err(e) = browser.wait().await {
                log::warn!("Chrome did not exit cleanly: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            join_handler(handler).await;
        }
        Ok(())
    }
}

struct ResponseCapture {
    suffix: String,
    events: EventStream<EventResponseReceived>,
}

pub struct ChromePage {
    page: Page,
    nav_timeout: Duration,
    capture: Option<ResponseCapture>,
}

impl ChromePage {
    async fn ready_state(&self) -> Result<String> {
        self.page
            .evaluate("document.readyState")
            .await?
            .into_value::<String>()
            .map_err(|e| HarvestError::Browser(e.to_string()))
    }

    async fn wait_for_ready_state(&self, accepted: &[&str]) -> Result<()> {
        let deadline = Instant::now() + self.nav_timeout;
        loop {
            let state = self.ready_state().await?;
            if accepted.contains(&state.as_str()) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(HarvestError::Timeout {
                    what: format!("document.readyState in {:?}", accepted),
                    after: self.nav_timeout,
                });
            }
            sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Waits for the CDP handler task, reporting a panic or cancellation.
/// Returns whether it finished cleanly.
async fn join_handler(handler: JoinHandle<()>) -> bool {
    match handler.await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("CDP handler task ended abnormally: {}", e);
            false
        }
    }
}

fn lifecycle_event(wait: WaitUntil) -> Option<&'static str> {
    match wait {
        WaitUntil::Commit => None,
        WaitUntil::DomContentLoaded => Some("DOMContentLoaded"),
        WaitUntil::Load => Some("load"),
        WaitUntil::NetworkIdle => Some("networkIdle"),
    }
}

impl PagePrimitives for ChromePage {
    type Handle = Element;

    async fn navigate(&mut self, url: &str, wait: WaitUntil) -> Result<()> {
        // subscribe before navigating so the lifecycle event cannot be missed
        let mut lifecycle = self.page.event_listener::<EventLifecycleEvent>().await?;

        log::debug!("Navigating to {} (until {})", url, wait);
        let navigation = self.page.execute(NavigateParams::new(url)).await?;
        if let Some(reason) = &navigation.result.error_text {
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            });
        }

        let Some(event_name) = lifecycle_event(wait) else {
            return Ok(());
        };
        let frame_id = navigation.result.frame_id.clone();
        let loader_id = navigation.result.loader_id.clone();

        let settled = async {
            while let Some(event) = lifecycle.next().await {
                let same_document = loader_id.as_ref().map_or(true, |id| *id == event.loader_id);
                if event.frame_id == frame_id && same_document && event.name == event_name {
                    return true;
                }
            }
            false
        };

        match tokio::time::timeout(self.nav_timeout, settled).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: "page closed before it settled".to_string(),
            }),
            Err(_) => Err(HarvestError::Timeout {
                what: format!("{} on {}", wait, url),
                after: self.nav_timeout,
            }),
        }
    }

    async fn wait_for_load(&mut self, wait: WaitUntil) -> Result<()> {
        match wait {
            WaitUntil::Commit => Ok(()),
            WaitUntil::DomContentLoaded => self.wait_for_ready_state(&["interactive", "complete"]).await,
            WaitUntil::Load => self.wait_for_ready_state(&["complete"]).await,
            WaitUntil::NetworkIdle => {
                self.wait_for_ready_state(&["complete"]).await?;
                sleep(NETWORK_QUIET).await;
                Ok(())
            }
        }
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn query(&self, selector: &str) -> Result<Option<Element>> {
        let mut found = self.page.find_elements(selector).await?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.remove(0)))
        }
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.strict_query(selector).await?.click().await?;
        Ok(())
    }

    async fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        match self.query(selector).await? {
            Some(element) => Ok(element.attribute(name).await?),
            None => Ok(None),
        }
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        match self.query(selector).await? {
            Some(element) => Ok(element.inner_text().await?),
            None => Ok(None),
        }
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn capture_responses(&mut self, suffix: &str) -> Result<()> {
        let events = self.page.event_listener::<EventResponseReceived>().await?;
        self.capture = Some(ResponseCapture {
            suffix: suffix.to_string(),
            events,
        });
        Ok(())
    }

    async fn take_responses(&mut self) -> Result<Vec<CapturedResponse>> {
        let Some(mut capture) = self.capture.take() else {
            return Ok(Vec::new());
        };

        // bodies are read only now, after the page settled and every load finished
        let mut matched: Vec<(String, RequestId)> = Vec::new();
        while let Some(Some(event)) = capture.events.next().now_or_never() {
            if event.response.url.ends_with(&capture.suffix) {
                matched.push((event.response.url.clone(), event.request_id.clone()));
            }
        }

        let mut captured = Vec::with_capacity(matched.len());
        for (url, request_id) in matched {
            let response = self.page.execute(GetResponseBodyParams::new(request_id)).await?;
            let body = if response.result.base64_encoded {
                base64::engine::general_purpose::STANDARD.decode(&response.result.body)?
            } else {
                response.result.body.clone().into_bytes()
            };
            log::debug!("Captured {} ({} bytes)", url, body.len());
            captured.push(CapturedResponse { url, body });
        }
        Ok(captured)
    }

    async fn close(self) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
