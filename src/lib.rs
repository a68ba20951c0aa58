//! Fathom: a breadth-first deep crawler
//!
//! This crate implements the orchestration core of a depth-bounded web
//! crawler: frontier expansion under depth/page/domain constraints, fetch
//! dispatch under adaptive concurrency and per-domain rate limits, a
//! markdown extraction pipeline with pluggable content filters, and result
//! delivery either as a completed batch or as an incremental stream.

pub mod config;
pub mod crawler;
pub mod dispatch;
pub mod extract;
pub mod filter;
pub mod limiter;
pub mod output;
pub mod url;

use thiserror::Error;

/// Main error type for Fathom operations
#[derive(Debug, Error)]
pub enum FathomError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Dispatcher shut down before the crawl finished")]
    DispatcherClosed,

    #[error("Crawl task channel closed unexpectedly: {0}")]
    ChannelClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
///
/// These are the only fatal errors in the system: they are surfaced before
/// any fetch begins. Per-page failures are recorded on the page's outcome
/// instead (see [`output::ErrorKind`]).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("No API credential for LLM provider '{provider}': pass an explicit token or set {env_var}")]
    MissingCredential { provider: String, env_var: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Fathom operations
pub type Result<T> = std::result::Result<T, FathomError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CacheMode, CrawlConfig};
pub use crawler::{crawl, crawl_stream};
pub use output::{CrawlReport, CrawlSummary, ErrorKind, PageOutcome};
pub use url::{dedup_key, extract_domain, normalize_url};
