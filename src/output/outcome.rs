use std::fmt;
use url::Url;

/// Per-page failure classification
///
/// These are data, not crate errors: a page failing never aborts the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or HTTP-layer error on this URL
    FetchFailure(String),

    /// The rate limiter's retry budget for the domain was spent on this task
    ThrottleExhausted,

    /// A content filter failed; raw markdown was still delivered
    FilterFailure(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchFailure(msg) => write!(f, "fetch failure: {}", msg),
            Self::ThrottleExhausted => write!(f, "throttle retries exhausted"),
            Self::FilterFailure(msg) => write!(f, "content filter failure: {}", msg),
        }
    }
}

/// The recorded outcome of one crawl task
///
/// Immutable once produced; owned by the collector (batch) or handed to the
/// consumer (streaming).
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub url: Url,

    /// Breadth-first distance from the start URL
    pub depth: u32,

    pub success: bool,

    /// Full markdown rendering; present when an extraction pipeline ran
    pub raw_markdown: Option<String>,

    /// Filter-retained rendering; present when a content filter ran and
    /// succeeded
    pub fit_markdown: Option<String>,

    /// Links found on the page, before any admission filtering
    pub discovered_links: Vec<String>,

    /// Failure classification; may coexist with success for filter failures
    pub error_kind: Option<ErrorKind>,
}

impl PageOutcome {
    /// The markdown text the output sink should persist
    ///
    /// With a content filter configured the filtered rendering is the
    /// deliverable; if the filter failed (no filtered rendering exists),
    /// the raw rendering is delivered instead of dropping the page.
    pub fn output_markdown(&self, filtered: bool) -> Option<&str> {
        if filtered {
            self.fit_markdown.as_deref().or(self.raw_markdown.as_deref())
        } else {
            self.raw_markdown.as_deref()
        }
    }
}
