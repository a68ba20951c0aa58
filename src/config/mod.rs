//! Configuration module for Fathom
//!
//! This module holds the typed crawl configuration, its TOML loader, and the
//! validation pass that runs before any fetch begins.
//!
//! # Example
//!
//! ```
//! use fathom::config::CrawlConfig;
//!
//! let config = CrawlConfig::new("https://example.com/");
//! assert_eq!(config.max_depth, 2);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Bm25Config, CacheMode, ContentFilterKind, CrawlConfig, DispatcherConfig, DispatcherKind,
    FilterConfig, LlmConfig, MarkdownConfig, OutputConfig, PruningConfig, RateLimiterConfig,
    ThresholdKind, DEFAULT_LLM_INSTRUCTION,
};

// Re-export parser and validation functions
pub use parser::load_config;
pub use validation::{llm_token_env_var, resolve_llm_token, validate};
