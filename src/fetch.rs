use std::fs;
use std::path::{Path, PathBuf};

use tokio::time::sleep;
use url::Url;

use crate::browser::{PageExt, PagePrimitives, Session, WaitUntil};
use crate::cache::{asset_cache_path, page_cache_path};
use crate::config::{Config, QuizSettings};
use crate::error::{HarvestError, Result};

/// Suffix of the companion spreadsheet a flashcard page loads.
pub const SPREADSHEET_SUFFIX: &str = ".xlsx";

/// What has to happen on the page between navigating and saving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Course landing page; saved as soon as it settles.
    Course,
    /// Also saves every `.xlsx` response the page triggers.
    Flashcards,
    /// Submitted first so the saved HTML carries the graded answers.
    Quiz,
}

/// Cache-first page fetcher over a browser [`Session`].
pub struct Fetcher<S> {
    session: S,
    cache_dir: PathBuf,
    quiz: QuizSettings,
    nav_timeout: std::time::Duration,
    fetches: usize,
}

impl<S: Session> Fetcher<S> {
    pub fn new(session: S, config: &Config) -> Self {
        Self {
            session,
            cache_dir: config.site_cache_dir(),
            quiz: config.quiz.clone(),
            nav_timeout: config.nav_timeout,
            fetches: 0,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Number of pages actually loaded in the browser (cache misses).
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }

    /// Local copy of `url`, loading it in the browser only if it is not cached yet.
    pub async fn ensure_cached(&mut self, url: &Url, kind: PageKind) -> Result<PathBuf> {
        let html_path = page_cache_path(&self.cache_dir, url);
        if html_path.is_file() {
            log::debug!("Cache hit: {} -> {}", url, html_path.display());
            return Ok(html_path);
        }

        log::info!("Fetching {} ({:?})", url, kind);
        let mut page = self.session.open_page().await?;
        if let Err(e) = self.save_page(&mut page, url, kind, &html_path).await {
            log::warn!("Abandoning page {}: {}", url, e);
            if let Err(close_err) = page.close().await {
                log::warn!("Failed to close page {}: {}", url, close_err);
            }
            return Err(e);
        }
        page.close().await?;

        self.fetches += 1;
        Ok(html_path)
    }

    async fn save_page<P: PagePrimitives>(
        &self,
        page: &mut P,
        url: &Url,
        kind: PageKind,
        html_path: &Path,
    ) -> Result<()> {
        if kind == PageKind::Flashcards {
            page.capture_responses(SPREADSHEET_SUFFIX).await?;
        }

        page.navigate(url.as_str(), WaitUntil::NetworkIdle).await?;

        if kind == PageKind::Quiz {
            self.submit_quiz(&*page).await?;
        }

        for response in page.take_responses().await? {
            let asset_url = Url::parse(&response.url)?;
            let asset_path = asset_cache_path(&self.cache_dir, &asset_url);
            write_file(&asset_path, &response.body)?;
            log::info!("Saved {}", asset_path.display());
        }

        let html = page.content().await?;
        write_file(html_path, html.as_bytes())
    }

    async fn submit_quiz<P: PagePrimitives>(&self, page: &P) -> Result<()> {
        page.click_when_present(&self.quiz.submit_selector, self.nav_timeout)
            .await?;
        page.click_when_present(&self.quiz.confirm_selector, self.nav_timeout)
            .await?;

        let Some(ready) = &self.quiz.ready_selector else {
            sleep(self.quiz.settle_delay).await;
            return Ok(());
        };
        match page.wait_for_selector(ready, self.quiz.ready_timeout).await {
            Ok(_) => Ok(()),
            Err(HarvestError::Timeout { .. }) => {
                log::warn!(
                    "Graded quiz marker '{}' never appeared, waiting {:?} instead",
                    ready,
                    self.quiz.settle_delay
                );
                sleep(self.quiz.settle_delay).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.session.shutdown().await
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(HarvestError::io(parent))?;
    }
    fs::write(path, contents).map_err(HarvestError::io(path))
}
