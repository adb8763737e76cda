//! Turning cached pages into CSV-ready records.

pub mod flashcards;
pub mod quiz;

pub use flashcards::{extract_flashcards, FlashcardRecord};
pub use quiz::{extract_quiz, QuizRecord};

/// Identifier components shared by every record of one course.
#[derive(Debug, Clone)]
pub struct RecordContext<'a> {
    pub site: &'a str,
    pub book: &'a str,
}

impl RecordContext<'_> {
    /// `"{site} - {book} - {page} - {item}"`
    pub fn identifier(&self, page_title: &str, item: &str) -> String {
        [self.site, self.book, page_title, item].join(" - ")
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
