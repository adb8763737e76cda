//! In-memory portal and browser session for pipeline tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use rust_xlsxwriter::Workbook;
use scraper::{Html, Selector};

use study_harvester::browser::{CapturedResponse, PagePrimitives, Session, WaitUntil};
use study_harvester::config::{Config, QuizSettings};
use study_harvester::{HarvestError, Result};

pub const BASE: &str = "https://learninglink.oup.com";
pub const COURSE_URL: &str = "https://learninglink.oup.com/courses/demo";
pub const CARDS_URL: &str = "https://learninglink.oup.com/access/content/demo-flashcards";
pub const QUIZ_URL: &str = "https://learninglink.oup.com/access/content/unit-1-quiz";
pub const SHEET_URL: &str =
    "https://learninglink.oup.com/protected/files/content/flashcardXlsx/1573540802783-Ch01.xlsx";

/// Pages, graded quiz variants and spreadsheet responses served by the fake browser.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, String>,
    graded: HashMap<String, String>,
    responses: HashMap<String, Vec<(String, Vec<u8>)>>,
}

impl FakeSite {
    /// The demo course: one flashcard deck and one quiz.
    pub fn demo() -> Self {
        let mut site = FakeSite::default();
        site.pages.insert(COURSE_URL.to_string(), course_page());
        site.pages.insert(CARDS_URL.to_string(), flashcard_page());
        site.pages.insert(QUIZ_URL.to_string(), quiz_page(false));
        site.graded.insert(QUIZ_URL.to_string(), quiz_page(true));
        site.responses.insert(
            CARDS_URL.to_string(),
            vec![
                (SHEET_URL.to_string(), demo_workbook()),
                (format!("{}/static/app.js", BASE), b"console.log(1)".to_vec()),
            ],
        );
        site
    }

    pub fn without(mut self, url: &str) -> Self {
        self.pages.remove(url);
        self
    }

    /// Submitting a quiz no longer reveals which answers were right.
    pub fn ungraded(mut self) -> Self {
        self.graded.clear();
        self
    }
}

/// Records every browser action so tests can assert on what was (not) done.
#[derive(Default, Clone)]
pub struct Journal {
    actions: Rc<RefCell<Vec<String>>>,
    opened: Rc<Cell<usize>>,
}

impl Journal {
    pub fn actions(&self) -> Vec<String> {
        self.actions.borrow().clone()
    }

    pub fn pages_opened(&self) -> usize {
        self.opened.get()
    }

    fn push(&self, action: String) {
        self.actions.borrow_mut().push(action);
    }
}

pub struct FakeSession {
    site: Rc<FakeSite>,
    journal: Journal,
}

impl FakeSession {
    pub fn new(site: FakeSite) -> (Self, Journal) {
        let journal = Journal::default();
        let session = Self {
            site: Rc::new(site),
            journal: journal.clone(),
        };
        (session, journal)
    }
}

impl Session for FakeSession {
    type Page = FakePage;

    async fn open_page(&mut self) -> Result<FakePage> {
        self.journal.opened.set(self.journal.opened.get() + 1);
        Ok(FakePage {
            site: Rc::clone(&self.site),
            journal: self.journal.clone(),
            url: None,
            html: RefCell::new("<html></html>".to_string()),
            capture: None,
        })
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.journal.push("shutdown".to_string());
        Ok(())
    }
}

pub struct FakePage {
    site: Rc<FakeSite>,
    journal: Journal,
    url: Option<String>,
    html: RefCell<String>,
    capture: Option<String>,
}

impl FakePage {
    fn count(&self, selector: &str) -> Result<usize> {
        let parsed = Selector::parse(selector).map_err(|e| HarvestError::InvalidSelector {
            selector: selector.to_string(),
            reason: e.to_string(),
        })?;
        let doc = Html::parse_document(&self.html.borrow());
        let count = doc.select(&parsed).count();
        Ok(count)
    }

    fn first<T>(&self, selector: &str, read: impl Fn(scraper::ElementRef<'_>) -> T) -> Option<T> {
        let parsed = Selector::parse(selector).ok()?;
        let doc = Html::parse_document(&self.html.borrow());
        let found = doc.select(&parsed).next().map(read);
        found
    }
}

impl PagePrimitives for FakePage {
    type Handle = ();

    async fn navigate(&mut self, url: &str, _wait: WaitUntil) -> Result<()> {
        self.journal.push(format!("goto {}", url));
        let html = self.site.pages.get(url).ok_or_else(|| HarvestError::Navigation {
            url: url.to_string(),
            reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })?;
        *self.html.borrow_mut() = html.clone();
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_load(&mut self, _wait: WaitUntil) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.url.clone())
    }

    async fn query(&self, selector: &str) -> Result<Option<()>> {
        Ok((self.count(selector)? > 0).then_some(()))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if self.count(selector)? == 0 {
            return Err(HarvestError::NotFound {
                selector: selector.to_string(),
            });
        }
        self.journal.push(format!("click {}", selector));
        if selector == "button[id='ckSubmit']" {
            if let Some(graded) = self.url.as_ref().and_then(|u| self.site.graded.get(u)) {
                *self.html.borrow_mut() = graded.clone();
            }
        }
        Ok(())
    }

    async fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>> {
        Ok(self
            .first(selector, |el| el.value().attr(name).map(str::to_string))
            .flatten())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.first(selector, |el| el.text().collect::<String>()))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.borrow().clone())
    }

    async fn capture_responses(&mut self, suffix: &str) -> Result<()> {
        self.capture = Some(suffix.to_string());
        Ok(())
    }

    async fn take_responses(&mut self) -> Result<Vec<CapturedResponse>> {
        let (Some(suffix), Some(url)) = (self.capture.take(), self.url.as_ref()) else {
            return Ok(Vec::new());
        };
        Ok(self
            .site
            .responses
            .get(url)
            .into_iter()
            .flatten()
            .filter(|(response_url, _)| response_url.ends_with(&suffix))
            .map(|(url, body)| CapturedResponse {
                url: url.clone(),
                body: body.clone(),
            })
            .collect())
    }

    async fn close(self) -> Result<()> {
        self.journal.push("close".to_string());
        Ok(())
    }
}

/// Config rooted in a scratch directory, with `urls.txt` listing the demo course.
pub fn config_in(root: &Path) -> Config {
    let input = root.join("urls.txt");
    std::fs::write(&input, format!("{}\n\n", COURSE_URL)).unwrap();
    Config {
        input,
        cache_root: root.join("downloaded_files"),
        output_root: root.join("Output"),
        quiz: QuizSettings {
            ready_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(10),
            ..QuizSettings::default()
        },
        ..Config::default()
    }
}

pub fn course_page() -> String {
    r#"<html><head><title>Demo Biology</title></head><body>
        <article title="Course overview" data-linktarget="/access/content/overview"></article>
        <article title="Demo Flashcards" data-linktarget="/access/content/demo-flashcards"></article>
        <article class="no-title"></article>
        <article title="Unit 1 Quiz Without Consequence" data-linktarget="/access/content/unit-1-quiz"></article>
    </body></html>"#
        .to_string()
}

pub fn flashcard_page() -> String {
    r##"<html><head><title>Chapter 1 Flashcards</title>
        <script language="JavaScript" src="/static/app.js"></script>
        </head><body>
        <script language="JavaScript">
            //find the file path for the csv
            var isXlsx=true, dataFile = "/protected/files/content/flashcardXlsx/1573540802783-Ch01.xlsx";
            init(isXlsx,dataFile);
        </script>
        <a href="#" id="button_next">Next Card</a>
    </body></html>"##
        .to_string()
}

fn quiz_question(question: &str, options: &[(&str, bool)], graded: bool) -> String {
    let labels: String = options
        .iter()
        .map(|(text, correct)| {
            let marker = if graded && *correct { "feedback" } else { "feedback d-none" };
            format!(
                "<label><input type=\"radio\"><span>{}</span><span class=\"{}\">Correct!</span></label>",
                text, marker
            )
        })
        .collect();
    format!(
        "<section class=\"indQuest question\"><div><span class=\"txt\">{}</span></div>{}</section>",
        question, labels
    )
}

pub fn quiz_page(graded: bool) -> String {
    let questions = [
        quiz_question("What is the basic unit of life?", &[("Atom", false), ("Cell", true)], graded),
        quiz_question(
            "Which organelle makes ATP?",
            &[("Mitochondrion", true), ("Ribosome", false), ("Nucleus", false)],
            graded,
        ),
    ]
    .concat();
    format!(
        "<html><head><title>Unit 1 Quiz</title></head><body>{}\
         <button type=\"submit\">Submit</button><button id=\"ckSubmit\">Confirm</button></body></html>",
        questions
    )
}

/// Three filled rows plus one half-filled row that must be skipped.
pub fn demo_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let rows = [("cell", "basic unit of life"), ("atom", "smallest unit of matter"), ("ATP", "energy currency")];
    for (i, (term, definition)) in rows.iter().enumerate() {
        sheet.write_string(i as u32, 0, *term).unwrap();
        sheet.write_string(i as u32, 1, *definition).unwrap();
    }
    sheet.write_string(3, 0, "orphan").unwrap();
    workbook.save_to_buffer().unwrap()
}
