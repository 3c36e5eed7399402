//! HTML to text extraction
//!
//! Produces the page's visible text (whitespace-collapsed) and every raw
//! `href` found on `<a>` elements. The hrefs are not resolved or filtered
//! here; that is the link filter's job.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements whose content never counts as page text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "header", "footer", "nav",
];

/// Text and raw links extracted from one HTML document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Normalized text: single spaces, no leading or trailing whitespace
    pub text: String,

    /// Every `href` attribute of `<a>` elements, in document order
    pub hrefs: Vec<String>,
}

/// Turns fetched HTML into text plus discovered links
pub trait TextExtractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedPage;
}

/// [`TextExtractor`] built on `scraper`
#[derive(Debug, Clone, Default)]
pub struct HtmlTextExtractor {
    target: Option<Selector>,
}

impl HtmlTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts text extraction to the first element matching `selector`
    ///
    /// Link discovery still covers the whole document.
    pub fn with_target(selector: Selector) -> Self {
        Self {
            target: Some(selector),
        }
    }

    /// Parses an optional CSS selector from configuration
    pub fn from_selector(selector: Option<&str>) -> Result<Self, String> {
        match selector {
            None => Ok(Self::new()),
            Some(css) => Selector::parse(css)
                .map(Self::with_target)
                .map_err(|e| format!("invalid target selector '{}': {:?}", css, e)),
        }
    }
}

impl TextExtractor for HtmlTextExtractor {
    fn extract(&self, html: &str) -> ExtractedPage {
        let document = Html::parse_document(html);

        let root = match &self.target {
            Some(selector) => document.select(selector).next(),
            None => Some(document.root_element()),
        };

        let text = match root {
            Some(element) => collapse_whitespace(&visible_text(element)),
            None => String::new(),
        };

        ExtractedPage {
            text,
            hrefs: extract_hrefs(&document),
        }
    }
}

/// Concatenates text nodes under `root`, skipping non-content elements
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    let mut stack = vec![*root];

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) if SKIPPED_ELEMENTS.contains(&element.name()) => {}
            Node::Element(_) | Node::Document | Node::Fragment => {
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }

    out
}

fn extract_hrefs(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
