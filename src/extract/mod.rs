//! Extraction pipeline
//!
//! Turns a fetched HTML document into markdown: a raw rendering of every
//! segment, and, when a content filter is configured, a filtered ("fit")
//! rendering of the segments the filter retained. Output options apply
//! uniformly regardless of which filter produced the retained content.
//!
//! The three content filters are a closed set behind one capability
//! ([`ContentFilter::select_segments`]): a pruning heuristic, lexical
//! BM25 relevance, and an instruction-driven provider call. Filter failure
//! is never fatal to a page: the raw rendering survives and the outcome
//! records the failure.

mod bm25;
mod llm;
mod markdown;
mod pruning;
mod segment;

pub use bm25::Bm25Filter;
pub use llm::{HttpInstructionClient, InstructionClient, LlmFilter};
pub use markdown::render;
pub use pruning::PruningFilter;
pub use segment::{segment_document, Segment, SegmentKind};

use crate::config::{ContentFilterKind, CrawlConfig, MarkdownConfig};
use crate::ConfigError;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Page-level inputs available to content filters
#[derive(Debug, Clone)]
pub struct PageContext {
    pub url: Url,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A content filter's failure
///
/// Only the instruction-driven filter produces these in practice; the
/// heuristic filters are total functions.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("unusable provider response: {0}")]
    BadResponse(String),
}

/// The closed set of content filters
pub enum ContentFilter {
    Pruning(PruningFilter),
    Bm25(Bm25Filter),
    Llm(LlmFilter),
}

impl ContentFilter {
    /// Selects the indices of segments to retain
    pub async fn select_segments(
        &self,
        segments: &[Segment],
        context: &PageContext,
    ) -> Result<Vec<usize>, FilterError> {
        match self {
            Self::Pruning(filter) => Ok(filter.select(segments)),
            Self::Bm25(filter) => Ok(filter.select(segments, context)),
            Self::Llm(filter) => filter.select(segments).await,
        }
    }
}

/// Result of running the pipeline over one page
#[derive(Debug)]
pub struct ExtractedContent {
    /// Markdown rendering of the full document
    pub raw_markdown: String,

    /// Rendering of the filter-retained subset; absent without a filter or
    /// after a filter failure
    pub fit_markdown: Option<String>,

    /// Set when a configured filter failed and raw-only output was delivered
    pub filter_error: Option<FilterError>,
}

/// Per-page extraction: segmentation, optional filtering, rendering
pub struct ExtractionPipeline {
    options: MarkdownConfig,
    filter: Option<ContentFilter>,
}

impl ExtractionPipeline {
    pub fn new(options: MarkdownConfig, filter: Option<ContentFilter>) -> Self {
        Self { options, filter }
    }

    /// Builds the pipeline the configuration asks for
    ///
    /// Returns `None` when markdown output is not requested: a content
    /// filter configured without output is dead configuration and no
    /// pipeline work happens. Building the LLM filter resolves its
    /// credential here, before any fetch.
    pub fn from_config(config: &CrawlConfig) -> Result<Option<Self>, ConfigError> {
        if !config.output.save_markdown {
            return Ok(None);
        }

        let filter = match config.content_filter {
            ContentFilterKind::None => None,
            ContentFilterKind::Pruning => {
                Some(ContentFilter::Pruning(PruningFilter::new(&config.pruning)))
            }
            ContentFilterKind::Bm25 => Some(ContentFilter::Bm25(Bm25Filter::new(&config.bm25))),
            ContentFilterKind::Llm => {
                let client = Arc::new(HttpInstructionClient::from_config(&config.llm)?);
                Some(ContentFilter::Llm(LlmFilter::new(client, &config.llm)))
            }
        };

        Ok(Some(Self::new(config.markdown.clone(), filter)))
    }

    /// Whether a content filter will run on each page
    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Runs the pipeline over one fetched document
    pub async fn extract(&self, html: &str, context: &PageContext) -> ExtractedContent {
        let segments = segment_document(html, &context.url, &self.options);
        let raw_markdown = render(&segments, &self.options);

        let filter = match &self.filter {
            Some(filter) => filter,
            None => {
                return ExtractedContent {
                    raw_markdown,
                    fit_markdown: None,
                    filter_error: None,
                }
            }
        };

        match filter.select_segments(&segments, context).await {
            Ok(indices) => {
                let retained: Vec<Segment> = indices
                    .iter()
                    .filter_map(|&i| segments.get(i).cloned())
                    .collect();

                ExtractedContent {
                    raw_markdown,
                    fit_markdown: Some(render(&retained, &self.options)),
                    filter_error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Content filter failed for {}: {}", context.url, e);
                ExtractedContent {
                    raw_markdown,
                    fit_markdown: None,
                    filter_error: Some(e),
                }
            }
        }
    }
}
