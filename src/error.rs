use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Everything that can stop a harvest run.
///
/// Nothing in the crate catches these: each one unwinds to `main` and ends
/// the run, leaving whatever was already cached or written on disk.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("No matches found for strict select({selector})")]
    NoMatch { selector: String },
    #[error("Wrong number of matches for strict select({selector}), found {found}")]
    WrongCardinality { selector: String, found: usize },
    #[error("Attribute '{name}' not found")]
    MissingAttribute { name: String },
    #[error("Invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("Could not find element with selector: {selector}")]
    NotFound { selector: String },

    #[error("Pattern not found: {pattern}")]
    PatternNotFound { pattern: &'static str },
    #[error("Workbook has no sheets: {0}")]
    EmptyWorkbook(PathBuf),

    #[error("Browser error: {0}")]
    Browser(String),
    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("Selector '{selector}' still present after {clicks} clicks")]
    ClickLimit { selector: String, clicks: usize },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Invalid base64 response body: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl HarvestError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| HarvestError::Io { path, source }
    }
}

impl From<chromiumoxide::error::CdpError> for HarvestError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        HarvestError::Browser(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
