//! URL handling module for Fathom
//!
//! This module provides URL normalization, deduplication keys, domain
//! extraction, and the wildcard/glob matching used by the filter chain.

mod domain;
mod matcher;
mod normalize;

// Re-export main functions
pub use domain::extract_domain;
pub use matcher::{glob_match, matches_wildcard};
pub use normalize::{dedup_key, normalize_url};
