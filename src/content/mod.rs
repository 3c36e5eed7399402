//! Content pipeline: extraction, chunking and deduplication
//!
//! A fetched page flows through three steps:
//!
//! 1. [`TextExtractor`] turns HTML into normalized text plus raw hrefs
//! 2. [`split_text`] cuts the text into bounded chunks, numbered from 1
//! 3. [`ContentDeduper`] drops every chunk whose hash was already emitted
//!
//! Dropped chunks keep their index, so records of one page may have gaps in
//! `chunk_index`.

mod chunker;
mod dedup;
mod extractor;

pub use chunker::split_text;
pub use dedup::{ContentDeduper, ContentHash};
pub use extractor::{ExtractedPage, HtmlTextExtractor, TextExtractor};

use std::sync::Arc;
use url::Url;

/// One chunk of page text, ready for output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    /// The page the chunk came from
    pub url: String,

    /// 1-based position of the chunk within its page
    pub chunk_index: u32,

    pub text: String,

    pub content_hash: ContentHash,
}

/// Everything the crawl needs from one processed page
#[derive(Debug, Default)]
pub struct ProcessedPage {
    /// New, never-seen chunks in page order
    pub records: Vec<ContentRecord>,

    /// Raw hrefs for the link filter
    pub hrefs: Vec<String>,

    /// Chunks dropped because their hash was already emitted
    pub duplicates: usize,
}

/// Runs extraction, chunking and dedup for the whole crawl
///
/// Cloning is cheap and clones share one dedup set.
#[derive(Clone)]
pub struct ContentPipeline {
    extractor: Arc<dyn TextExtractor>,
    split_length: Option<usize>,
    deduper: Arc<ContentDeduper>,
}

impl ContentPipeline {
    pub fn new(extractor: Arc<dyn TextExtractor>, split_length: Option<usize>) -> Self {
        Self {
            extractor,
            split_length,
            deduper: Arc::new(ContentDeduper::new()),
        }
    }

    /// Extracts, chunks and deduplicates `html` fetched from `url`
    pub fn process(&self, url: &Url, html: &str) -> ProcessedPage {
        let page = self.extractor.extract(html);
        let mut records = Vec::new();
        let mut duplicates = 0;

        for (index, text) in split_text(&page.text, self.split_length).into_iter().enumerate() {
            let content_hash = ContentHash::of(&text);
            if !self.deduper.insert_if_new(content_hash) {
                tracing::trace!("Duplicate chunk {} on {}", index + 1, url);
                duplicates += 1;
                continue;
            }
            records.push(ContentRecord {
                url: url.to_string(),
                chunk_index: index as u32 + 1,
                text,
                content_hash,
            });
        }

        ProcessedPage {
            records,
            hrefs: page.hrefs,
            duplicates,
        }
    }

    /// Number of distinct chunks emitted so far
    pub fn unique_chunks(&self) -> usize {
        self.deduper.len()
    }
}
