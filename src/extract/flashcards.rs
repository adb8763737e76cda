use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use url::Url;

use super::RecordContext;
use crate::cache::asset_cache_path;
use crate::dom::StrictDocument;
use crate::error::{HarvestError, Result};

/// Inline scripts on a flashcard page; one of them names the spreadsheet.
const LOADER_SCRIPT: &str = "script[language='JavaScript']";

static DATA_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"dataFile\s*=\s*"/([^"]+)""#).expect("valid data file regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardRecord {
    pub identifier: String,
    pub term: String,
    pub definition: String,
}

/// What a cached flashcard page tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardPage {
    pub title: String,
    /// Site-relative spreadsheet path, without the leading slash.
    pub data_file: String,
}

/// Pull the spreadsheet path out of the loader script.
///
/// The loader looks like `var isXlsx=true, dataFile = "/protected/.../Ch01.xlsx";`.
/// Fails with `PatternNotFound` when the assignment is missing.
pub fn data_file_path(script: &str) -> Result<String> {
    DATA_FILE
        .captures(script)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(HarvestError::PatternNotFound {
            pattern: r#"dataFile = "/<path>""#,
        })
}

pub fn parse_flashcard_page(html: &str) -> Result<FlashcardPage> {
    let doc = StrictDocument::parse(html);
    let title = doc.title()?;

    let mut loaders: Vec<String> = doc
        .select(LOADER_SCRIPT)?
        .iter()
        .map(|script| script.text())
        .filter(|text| DATA_FILE.is_match(text))
        .collect();

    let loader = match loaders.len() {
        1 => loaders.remove(0),
        0 => {
            return Err(HarvestError::PatternNotFound {
                pattern: r#"dataFile = "/<path>""#,
            })
        }
        found => {
            return Err(HarvestError::WrongCardinality {
                selector: format!("{} with a dataFile assignment", LOADER_SCRIPT),
                found,
            })
        }
    };

    Ok(FlashcardPage {
        title,
        data_file: data_file_path(&loader)?,
    })
}

fn cell_text(cell: Option<&Data>) -> Option<String> {
    let text = match cell? {
        Data::Empty => return None,
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// (column A, column B) of every row of the first sheet where both are filled.
pub fn read_term_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| HarvestError::EmptyWorkbook(path.to_path_buf()))??;

    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return Ok(Vec::new());
    };

    let mut pairs = Vec::new();
    for row in start.0..=end.0 {
        let term = cell_text(range.get_value((row, 0)));
        let definition = cell_text(range.get_value((row, 1)));
        match (term, definition) {
            (Some(term), Some(definition)) => pairs.push((term, definition)),
            (None, None) => {}
            _ => log::warn!("Skipping half-filled row {} in {}", row + 1, path.display()),
        }
    }
    Ok(pairs)
}

/// Records for one cached flashcard page and its cached spreadsheet.
pub fn extract_flashcards(
    html_path: &Path,
    cache_dir: &Path,
    base_url: &Url,
    ctx: &RecordContext<'_>,
) -> Result<Vec<FlashcardRecord>> {
    let html = fs::read_to_string(html_path).map_err(HarvestError::io(html_path))?;
    let page = parse_flashcard_page(&html)?;

    let sheet_url = base_url.join(&format!("/{}", page.data_file))?;
    let sheet_path = asset_cache_path(cache_dir, &sheet_url);
    log::debug!("Reading flashcards from {}", sheet_path.display());

    let records = read_term_pairs(&sheet_path)?
        .into_iter()
        .map(|(term, definition)| FlashcardRecord {
            identifier: ctx.identifier(&page.title, &term),
            term,
            definition,
        })
        .collect();
    Ok(records)
}
