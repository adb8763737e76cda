//! Deterministic mapping from remote URLs to local cache and output paths.
//!
//! Every path component goes through [`legalize`]. When legalizing changes
//! anything (an illegal character, a query string, a reserved name), a short
//! hash of the original URL path is appended so that two URLs which only
//! differ in characters that got replaced still land on different files.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use url::Url;

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Make a single path component safe on every common filesystem.
pub fn legalize(component: &str) -> String {
    let mut out: String = component
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    // Windows silently drops trailing dots and spaces
    let trimmed_len = out.trim_end_matches(['.', ' ']).len();
    if trimmed_len != out.len() {
        out.truncate(trimmed_len);
        out.push('_');
    }

    if out.is_empty() {
        return "_".to_string();
    }

    let stem = out.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        out.insert(0, '_');
    }
    out
}

/// Legalized path segments of a URL plus whether legalizing altered them.
struct UrlKey {
    segments: Vec<String>,
    altered: bool,
    raw: String,
}

impl UrlKey {
    fn new(url: &Url) -> Self {
        let mut altered = false;
        let mut segments: Vec<String> = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                let legal = legalize(s);
                altered |= legal != s;
                legal
            })
            .collect();

        let raw = match url.query() {
            Some(query) => {
                altered = true;
                let last = segments.pop().unwrap_or_else(|| "index".to_string());
                segments.push(format!("{}_{}", last, legalize(query)));
                format!("{}?{}", url.path(), query)
            }
            None => url.path().to_string(),
        };

        if segments.is_empty() {
            segments.push("index".to_string());
        }

        Self { segments, altered, raw }
    }

    fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..8].to_string()
    }

    /// Join all but the last segment onto `root`, returning it with the last segment.
    fn split_last(mut self, root: &Path) -> (PathBuf, String, Option<String>) {
        let hash = self.altered.then(|| self.hash());
        let last = self.segments.pop().unwrap_or_else(|| "index".to_string());
        let mut dir = root.to_path_buf();
        for segment in &self.segments {
            dir.push(segment);
        }
        (dir, last, hash)
    }
}

/// Cache file for an HTML page: the URL path under `site_dir`, ending in `.html`.
///
/// An existing `.html`/`.htm` extension is replaced rather than doubled; any
/// other dots in the last segment are kept so `unit.1` and `unit.2` stay apart.
pub fn page_cache_path(site_dir: &Path, url: &Url) -> PathBuf {
    let (dir, last, hash) = UrlKey::new(url).split_last(site_dir);

    let lower = last.to_ascii_lowercase();
    let stem = if lower.ends_with(".html") {
        &last[..last.len() - 5]
    } else if lower.ends_with(".htm") {
        &last[..last.len() - 4]
    } else {
        &last[..]
    };

    let name = match hash {
        Some(hash) => format!("{}-{}.html", stem, hash),
        None => format!("{}.html", stem),
    };
    dir.join(name)
}

/// Cache file for a binary asset (spreadsheet) captured from a response.
pub fn asset_cache_path(site_dir: &Path, url: &Url) -> PathBuf {
    let (dir, last, hash) = UrlKey::new(url).split_last(site_dir);

    let name = match hash {
        Some(hash) => match last.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, hash, ext),
            _ => format!("{}-{}", last, hash),
        },
        None => last,
    };
    dir.join(name)
}

/// Display name of a course: the legalized final path segment of its URL.
pub fn course_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(legalize)
        .unwrap_or_else(|| legalize(url.host_str().unwrap_or("course")))
}

/// `<site_output_dir>/<book>/<section>.csv`, dropping a leading "View " from the section.
pub fn output_path(site_output_dir: &Path, book_title: &str, section_title: &str) -> PathBuf {
    let section = section_title.strip_prefix("View ").unwrap_or(section_title);
    site_output_dir
        .join(legalize(book_title))
        .join(format!("{}.csv", legalize(section)))
}
