//! Per-course pipeline: main page → content sections → fetch → extract → CSV.

use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

use crate::browser::Session;
use crate::cache::{course_name, output_path};
use crate::config::Config;
use crate::dom::StrictDocument;
use crate::error::{HarvestError, Result};
use crate::extract::{extract_flashcards, extract_quiz, RecordContext};
use crate::fetch::{Fetcher, PageKind};
use crate::output::write_records;

/// Kind of study material an `<article>` links to, decided by its title suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Flashcards,
    Quiz,
}

impl SectionKind {
    pub fn classify(title: &str) -> Option<Self> {
        if title.ends_with("Flashcards") {
            Some(SectionKind::Flashcards)
        } else if title.ends_with("Quiz Without Consequence") || title.ends_with("Pre-Test") {
            Some(SectionKind::Quiz)
        } else {
            None
        }
    }

    fn page_kind(self) -> PageKind {
        match self {
            SectionKind::Flashcards => PageKind::Flashcards,
            SectionKind::Quiz => PageKind::Quiz,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSection {
    pub title: String,
    pub kind: SectionKind,
    pub url: Url,
}

/// What the harvester needs from a course's main page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoursePage {
    pub book_title: String,
    pub sections: Vec<ContentSection>,
}

/// Book title and classified sections, in document order.
///
/// Articles without a title, or with a title that is not study material, are
/// skipped. A study-material article without `data-linktarget` is an error.
pub fn parse_course_page(html: &str, base_url: &Url) -> Result<CoursePage> {
    let doc = StrictDocument::parse(html);
    let book_title = doc.title()?;

    let mut sections = Vec::new();
    for article in doc.select("article")? {
        let Some(title) = article.attr("title") else {
            continue;
        };
        let Some(kind) = SectionKind::classify(title) else {
            continue;
        };
        let target = article.get_attribute("data-linktarget")?;
        sections.push(ContentSection {
            title: title.to_string(),
            kind,
            url: base_url.join(&target)?,
        });
    }

    Ok(CoursePage { book_title, sections })
}

/// Course URLs from a newline-delimited file, trimmed, blank lines dropped.
pub fn read_course_urls(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(HarvestError::io(path))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub section: String,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct CourseReport {
    pub name: String,
    pub book_title: String,
    pub files: Vec<WrittenFile>,
}

pub struct Harvester<S> {
    config: Config,
    fetcher: Fetcher<S>,
}

impl<S: Session> Harvester<S> {
    pub fn new(config: Config, session: S) -> Self {
        let fetcher = Fetcher::new(session, &config);
        Self { config, fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher<S> {
        &self.fetcher
    }

    /// Harvest every course listed in the configured input file, in order.
    pub async fn run(&mut self) -> Result<Vec<CourseReport>> {
        let urls = read_course_urls(&self.config.input)?;
        log::info!("📋 {} course(s) in {}", urls.len(), self.config.input.display());

        let mut reports = Vec::with_capacity(urls.len());
        for url in &urls {
            reports.push(self.harvest_course(url).await?);
        }
        Ok(reports)
    }

    pub async fn harvest_course(&mut self, url: &str) -> Result<CourseReport> {
        let course_url = Url::parse(url)?;
        let name = course_name(&course_url);
        log::info!("Harvesting course {} ({})", name, course_url);

        let main_path = self.fetcher.ensure_cached(&course_url, PageKind::Course).await?;
        let html = fs::read_to_string(&main_path).map_err(HarvestError::io(&main_path))?;
        let course = parse_course_page(&html, &self.config.base_url)?;
        log::debug!(
            "'{}' has {} study section(s)",
            course.book_title,
            course.sections.len()
        );

        let mut files = Vec::new();
        for section in &course.sections {
            let page_path = self
                .fetcher
                .ensure_cached(&section.url, section.kind.page_kind())
                .await?;

            let ctx = RecordContext {
                site: &self.config.site_name,
                book: &course.book_title,
            };
            let out = output_path(&self.config.site_output_dir(), &course.book_title, &section.title);
            let rows = match section.kind {
                SectionKind::Flashcards => {
                    let records = extract_flashcards(
                        &page_path,
                        self.fetcher.cache_dir(),
                        &self.config.base_url,
                        &ctx,
                    )?;
                    write_records(&out, &records)?
                }
                SectionKind::Quiz => write_records(&out, &extract_quiz(&page_path, &ctx)?)?,
            };
            log::info!("💾 {} row(s) -> {}", rows, out.display());

            files.push(WrittenFile {
                section: section.title.clone(),
                path: out,
                rows,
            });
        }

        Ok(CourseReport {
            name,
            book_title: course.book_title,
            files,
        })
    }

    /// Close the browser, if one was ever started.
    pub async fn finish(mut self) -> Result<()> {
        self.fetcher.shutdown().await
    }
}
