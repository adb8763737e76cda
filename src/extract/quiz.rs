use std::fs;
use std::path::Path;

use serde::Serialize;

use super::{escape_html, normalize_ws, RecordContext};
use crate::dom::{StrictDocument, StrictNode};
use crate::error::{HarvestError, Result};

const QUESTION_SECTION: &str = "section[class^='indQuest']";
const QUESTION_TEXT: &str = "span[class='txt']";

/// Marker class on the feedback span of every option that is not correct.
const HIDDEN: &str = "d-none";

const CORRECT: &str = "✅";
const WRONG: &str = "❌";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizRecord {
    pub identifier: String,
    pub question_html: String,
    pub answer_html: String,
}

/// One answer option of a graded question.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuizOption {
    text: String,
    correct: bool,
}

fn read_option(label: &StrictNode<'_>) -> Result<QuizOption> {
    let spans = label.select("span")?;
    if spans.len() < 2 {
        return Err(HarvestError::WrongCardinality {
            selector: "label span (text + marker)".to_string(),
            found: spans.len(),
        });
    }
    let marker = &spans[1];
    marker.get_attribute("class")?;
    Ok(QuizOption {
        text: normalize_ws(&spans[0].text()),
        correct: !marker.has_class(HIDDEN),
    })
}

fn question_html(question: &str, options: &[QuizOption]) -> String {
    let mut html = format!("<b>{}</b><br>", escape_html(question));
    for option in options {
        html.push_str(&format!("<input type='radio'>{}<br>", escape_html(&option.text)));
    }
    html
}

fn answer_html(question: &str, options: &[QuizOption]) -> String {
    let mut html = format!("<b>{}</b><br>", escape_html(question));
    for option in options {
        html.push_str(if option.correct { CORRECT } else { WRONG });
        html.push_str(&format!("{}<br>", escape_html(&option.text)));
    }
    html
}

/// One record per question section of a graded quiz page, numbered from 1.
pub fn parse_quiz(html: &str, ctx: &RecordContext<'_>) -> Result<Vec<QuizRecord>> {
    let doc = StrictDocument::parse(html);
    let page_title = doc.title()?;

    let sections = doc.select(QUESTION_SECTION)?;
    let records = sections
        .iter()
        .enumerate()
        .map(|(i, section)| -> Result<QuizRecord> {
            let question = normalize_ws(&section.select_one(QUESTION_TEXT)?.text());
            let options = section
                .select("label")?
                .iter()
                .map(read_option)
                .collect::<Result<Vec<_>>>()?;

            Ok(QuizRecord {
                identifier: ctx.identifier(&page_title, &(i + 1).to_string()),
                question_html: question_html(&question, &options),
                answer_html: answer_html(&question, &options),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(records)
}

pub fn extract_quiz(html_path: &Path, ctx: &RecordContext<'_>) -> Result<Vec<QuizRecord>> {
    let html = fs::read_to_string(html_path).map_err(HarvestError::io(html_path))?;
    parse_quiz(&html, ctx)
}
