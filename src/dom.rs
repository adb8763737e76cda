//! Fail-fast lookups over parsed HTML.
//!
//! The portal's markup is assumed to be stable, so a selector that matches
//! nothing (or more than expected) is an error at the exact point of
//! divergence instead of an empty value flowing into later string work.

use scraper::{ElementRef, Html, Selector};

use crate::error::{HarvestError, Result};

/// A parsed document with strict query methods.
pub struct StrictDocument {
    html: Html,
}

/// An element inside a [`StrictDocument`].
#[derive(Clone, Copy)]
pub struct StrictNode<'a> {
    element: ElementRef<'a>,
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn require_some<'a>(css: &str, nodes: Vec<StrictNode<'a>>) -> Result<Vec<StrictNode<'a>>> {
    if nodes.is_empty() {
        Err(HarvestError::NoMatch { selector: css.to_string() })
    } else {
        Ok(nodes)
    }
}

fn require_one<'a>(css: &str, mut nodes: Vec<StrictNode<'a>>) -> Result<StrictNode<'a>> {
    if nodes.len() == 1 {
        Ok(nodes.remove(0))
    } else {
        Err(HarvestError::WrongCardinality {
            selector: css.to_string(),
            found: nodes.len(),
        })
    }
}

impl StrictDocument {
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    /// All matches in document order; fails if there are none.
    pub fn select(&self, css: &str) -> Result<Vec<StrictNode<'_>>> {
        let selector = parse_selector(css)?;
        let nodes = self.html.select(&selector).map(StrictNode::new).collect();
        require_some(css, nodes)
    }

    /// The single match; fails on zero or several.
    pub fn select_one(&self, css: &str) -> Result<StrictNode<'_>> {
        let selector = parse_selector(css)?;
        let nodes = self.html.select(&selector).map(StrictNode::new).collect();
        require_one(css, nodes)
    }

    /// Trimmed text of the document's only `<title>`.
    pub fn title(&self) -> Result<String> {
        Ok(self.select_one("title")?.text().trim().to_string())
    }
}

impl<'a> StrictNode<'a> {
    fn new(element: ElementRef<'a>) -> Self {
        Self { element }
    }

    pub fn select(&self, css: &str) -> Result<Vec<StrictNode<'a>>> {
        let selector = parse_selector(css)?;
        let nodes = self.element.select(&selector).map(StrictNode::new).collect();
        require_some(css, nodes)
    }

    pub fn select_one(&self, css: &str) -> Result<StrictNode<'a>> {
        let selector = parse_selector(css)?;
        let nodes = self.element.select(&selector).map(StrictNode::new).collect();
        require_one(css, nodes)
    }

    /// Attribute value, or `None`; for classifying nodes that may legitimately lack it.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Attribute value as a string, failing if the attribute is absent.
    ///
    /// Token-list attributes (`class`, `rel`, ...) come back as their tokens
    /// joined by single spaces.
    pub fn get_attribute(&self, name: &str) -> Result<String> {
        let value = self
            .attr(name)
            .ok_or_else(|| HarvestError::MissingAttribute { name: name.to_string() })?;
        if is_token_list(name) {
            Ok(value.split_whitespace().collect::<Vec<_>>().join(" "))
        } else {
            Ok(value.to_string())
        }
    }

    /// Concatenated text of all descendant text nodes, untrimmed.
    pub fn text(&self) -> String {
        self.element.text().collect::<String>()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|token| token == class))
            .unwrap_or(false)
    }
}

fn is_token_list(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "class" | "rel" | "rev" | "accept-charset" | "headers" | "accesskey" | "dropzone"
    )
}
