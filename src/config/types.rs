use serde::Deserialize;
use std::path::PathBuf;

/// Default instruction handed to the LLM content filter when none is given
pub const DEFAULT_LLM_INSTRUCTION: &str = "Extract the main content while preserving its original wording and substance. \
     Remove navigation elements, sidebars, footers, and ads. \
     Format the output as clean markdown with proper code blocks and headers.";

/// Main configuration structure for a crawl
///
/// Every field has a default so that a bare start URL is a complete
/// configuration. The same structure deserializes from a TOML file
/// (kebab-case keys) and is assembled from CLI flags by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// The URL the crawl starts from
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum breadth-first distance from the start URL
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Stop admitting new fetches once this many pages have succeeded
    #[serde(rename = "max-pages")]
    pub max_pages: Option<u32>,

    /// Follow links whose domain differs from the linking page's origin
    #[serde(rename = "include-external")]
    pub include_external: bool,

    /// Deliver outcomes incrementally instead of as a completed batch
    pub stream: bool,

    /// Cache directive threaded through to the fetch layer unchanged
    #[serde(rename = "cache-mode")]
    pub cache_mode: CacheMode,

    /// Link admission predicates
    pub filters: FilterConfig,

    /// Which content filter the extraction pipeline uses
    #[serde(rename = "content-filter")]
    pub content_filter: ContentFilterKind,

    pub pruning: PruningConfig,
    pub bm25: Bm25Config,
    pub llm: LlmConfig,
    pub markdown: MarkdownConfig,

    #[serde(rename = "rate-limiter")]
    pub rate_limiter: RateLimiterConfig,

    pub dispatcher: DispatcherConfig,
    pub output: OutputConfig,

    /// Report live dispatcher statistics while the crawl runs
    pub monitor: bool,
}

impl CrawlConfig {
    /// Creates a configuration with defaults for the given start URL
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            ..Self::default()
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_depth: 2,
            max_pages: None,
            include_external: false,
            stream: false,
            cache_mode: CacheMode::Bypass,
            filters: FilterConfig::default(),
            content_filter: ContentFilterKind::None,
            pruning: PruningConfig::default(),
            bm25: Bm25Config::default(),
            llm: LlmConfig::default(),
            markdown: MarkdownConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            dispatcher: DispatcherConfig::default(),
            output: OutputConfig::default(),
            monitor: false,
        }
    }
}

/// Cache directive for the fetch layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Allow intermediary caches to serve stored responses
    Enabled,
    /// Ask intermediaries to revalidate before serving
    Bypass,
    /// Force end-to-end revalidation
    Refresh,
}

/// Content filter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ContentFilterKind {
    None,
    Pruning,
    Bm25,
    Llm,
}

/// Link admission predicate configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Glob patterns a URL must match at least one of (empty = no constraint)
    #[serde(rename = "url-patterns")]
    pub url_patterns: Vec<String>,

    /// Domains to allow (empty = all allowed); supports `*.example.com`
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,

    /// Domains to block; supports `*.example.com`
    #[serde(rename = "blocked-domains")]
    pub blocked_domains: Vec<String>,

    /// Response content types to accept (empty = all accepted)
    #[serde(rename = "allowed-content-types")]
    pub allowed_content_types: Vec<String>,
}

/// Pruning filter parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Score cutoff; with a dynamic threshold type this scales the page mean
    pub threshold: f64,

    #[serde(rename = "threshold-type")]
    pub threshold_type: ThresholdKind,

    /// Segments shorter than this many words are dropped regardless of score
    #[serde(rename = "min-word-threshold")]
    pub min_word_threshold: usize,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            threshold: 0.45,
            threshold_type: ThresholdKind::Dynamic,
            min_word_threshold: 5,
        }
    }
}

/// How the pruning cutoff is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdKind {
    /// The configured threshold is the cutoff
    Fixed,
    /// The cutoff adapts to the page's own score distribution
    Dynamic,
}

/// Lexical-relevance (BM25) filter parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Query to score segments against; when absent a pseudo-query is
    /// derived from page metadata
    pub query: Option<String>,

    /// Minimum BM25 score for a segment to be retained
    pub threshold: f64,

    #[serde(rename = "use-stemming")]
    pub use_stemming: bool,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            query: None,
            threshold: 1.2,
            use_stemming: false,
        }
    }
}

/// Instruction-driven (LLM) filter parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider identifier, e.g. "openai/gpt-4o" or "groq/llama-3.1-70b"
    pub provider: String,

    /// Explicit API token; when absent the `<PROVIDER>_API_KEY` environment
    /// variable is consulted
    #[serde(rename = "api-token")]
    pub api_token: Option<String>,

    /// Natural-language retention instruction sent with each chunk
    pub instruction: String,

    /// Upper bound on tokens per chunk sent to the provider
    #[serde(rename = "chunk-token-threshold")]
    pub chunk_token_threshold: usize,

    /// Retries per chunk before the filter reports failure
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai/gpt-4o".to_string(),
            api_token: None,
            instruction: DEFAULT_LLM_INSTRUCTION.to_string(),
            chunk_token_threshold: 4096,
            max_retries: 2,
        }
    }
}

/// Markdown rendering options, applied to raw and filtered output alike
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    #[serde(rename = "ignore-links")]
    pub ignore_links: bool,

    #[serde(rename = "ignore-images")]
    pub ignore_images: bool,

    #[serde(rename = "escape-html")]
    pub escape_html: bool,

    /// Wrap text at this many characters; 0 disables wrapping
    #[serde(rename = "body-width")]
    pub body_width: usize,

    /// Omit local anchors referencing the same page
    #[serde(rename = "skip-internal-links")]
    pub skip_internal_links: bool,
}

/// Per-domain rate limiting parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub enabled: bool,

    /// Initial delay range in milliseconds; each domain samples uniformly
    /// from this range
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: (u64, u64),

    /// Ceiling on the backoff delay in milliseconds
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Throttle retries per task before it fails with ThrottleExhausted
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_ms: (1000, 3000),
            max_delay_ms: 60_000,
            max_retries: 3,
        }
    }
}

/// Concurrency strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DispatcherKind {
    /// Fixed number of permits backed by a counting semaphore
    Fixed,
    /// Fixed permits plus a memory-utilization gate
    MemoryAdaptive,
}

/// Dispatcher parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub kind: DispatcherKind,

    /// Maximum number of in-flight fetches
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: u32,

    /// Memory utilization percentage above which no new permits are granted
    #[serde(rename = "memory-threshold-percent")]
    pub memory_threshold_percent: f64,

    /// How often the memory reading is refreshed, in milliseconds
    #[serde(rename = "check-interval-ms")]
    pub check_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            kind: DispatcherKind::MemoryAdaptive,
            max_concurrent: 10,
            memory_threshold_percent: 90.0,
            check_interval_ms: 1000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Render and persist markdown for each successful page
    #[serde(rename = "save-markdown")]
    pub save_markdown: bool,

    /// Directory markdown files are written to
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_markdown: false,
            output_dir: PathBuf::from("./output"),
        }
    }
}
