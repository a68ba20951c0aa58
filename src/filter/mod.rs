//! Link admission filtering
//!
//! A [`FilterChain`] is an ordered set of admission predicates evaluated for
//! every discovered link. A link is admitted iff all predicates accept it;
//! an empty chain admits everything. The chain is always constructed (never
//! absent), so callers need no missing-chain handling.
//!
//! Domain and URL-pattern predicates run before the fetch. The content-type
//! predicate can only be evaluated once a response exists, so it abstains at
//! admission time and is applied post-fetch, where it suppresses link
//! expansion and result retention.

use crate::config::FilterConfig;
use crate::url::{glob_match, matches_wildcard};
use url::Url;

/// A single admission predicate
#[derive(Debug, Clone)]
pub enum LinkFilter {
    /// Accept iff the domain is in the allow-set (when non-empty) and not in
    /// the block-set
    Domain {
        allowed: Vec<String>,
        blocked: Vec<String>,
    },

    /// Accept iff the URL matches at least one glob pattern
    UrlPattern { patterns: Vec<String> },

    /// Accept iff the response content type matches one of the allowed types
    ContentType { allowed: Vec<String> },
}

impl LinkFilter {
    /// Evaluates this predicate against a link before any fetch
    ///
    /// Predicates that need response data abstain by accepting.
    fn accepts_link(&self, url: &Url, domain: &str) -> bool {
        match self {
            Self::Domain { allowed, blocked } => {
                if blocked.iter().any(|p| matches_wildcard(p, domain)) {
                    return false;
                }
                allowed.is_empty() || allowed.iter().any(|p| matches_wildcard(p, domain))
            }
            Self::UrlPattern { patterns } => {
                patterns.iter().any(|p| glob_match(p, url.as_str()))
            }
            Self::ContentType { .. } => true,
        }
    }

    /// Evaluates this predicate against a response content type
    ///
    /// Predicates that only constrain the link itself abstain by accepting.
    fn accepts_content_type(&self, content_type: &str) -> bool {
        match self {
            Self::ContentType { allowed } => {
                let essence = content_type
                    .split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_lowercase();
                allowed
                    .iter()
                    .any(|a| essence.starts_with(&a.to_lowercase()))
            }
            _ => true,
        }
    }
}

/// Ordered chain of admission predicates (logical AND)
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<LinkFilter>,
}

impl FilterChain {
    /// Creates a chain from explicit predicates
    pub fn new(filters: Vec<LinkFilter>) -> Self {
        Self { filters }
    }

    /// Builds the chain from configuration, adding only configured predicates
    ///
    /// An entirely unconfigured filter section yields the empty chain, which
    /// admits every link.
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut filters = Vec::new();

        if !config.url_patterns.is_empty() {
            filters.push(LinkFilter::UrlPattern {
                patterns: config.url_patterns.clone(),
            });
        }

        if !config.allowed_domains.is_empty() || !config.blocked_domains.is_empty() {
            filters.push(LinkFilter::Domain {
                allowed: config.allowed_domains.clone(),
                blocked: config.blocked_domains.clone(),
            });
        }

        if !config.allowed_content_types.is_empty() {
            filters.push(LinkFilter::ContentType {
                allowed: config.allowed_content_types.clone(),
            });
        }

        Self { filters }
    }

    /// Returns true if the chain has no predicates
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Pre-fetch admission: all predicates must accept the link
    pub fn admits_link(&self, url: &Url, domain: &str) -> bool {
        self.filters.iter().all(|f| f.accepts_link(url, domain))
    }

    /// Post-fetch admission: all predicates must accept the content type
    pub fn admits_content_type(&self, content_type: &str) -> bool {
        self.filters
            .iter()
            .all(|f| f.accepts_content_type(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_empty_chain_admits_everything() {
        let chain = FilterChain::default();
        assert!(chain.admits_link(&url("https://anything.example/whatever"), "anything.example"));
        assert!(chain.admits_content_type("application/octet-stream"));
    }

    #[test]
    fn test_domain_allow_set() {
        let chain = FilterChain::new(vec![LinkFilter::Domain {
            allowed: vec!["example.com".to_string()],
            blocked: vec![],
        }]);

        assert!(chain.admits_link(&url("https://example.com/a"), "example.com"));
        assert!(!chain.admits_link(&url("https://other.com/a"), "other.com"));
    }

    #[test]
    fn test_domain_block_set() {
        let chain = FilterChain::new(vec![LinkFilter::Domain {
            allowed: vec![],
            blocked: vec!["bad.com".to_string()],
        }]);

        assert!(chain.admits_link(&url("https://example.com/a"), "example.com"));
        assert!(!chain.admits_link(&url("https://bad.com/a"), "bad.com"));
    }

    #[test]
    fn test_block_wins_over_allow() {
        let chain = FilterChain::new(vec![LinkFilter::Domain {
            allowed: vec!["*.example.com".to_string()],
            blocked: vec!["ads.example.com".to_string()],
        }]);

        assert!(chain.admits_link(&url("https://docs.example.com/"), "docs.example.com"));
        assert!(!chain.admits_link(&url("https://ads.example.com/"), "ads.example.com"));
    }

    #[test]
    fn test_url_pattern_any_of() {
        let chain = FilterChain::new(vec![LinkFilter::UrlPattern {
            patterns: vec!["*docs*".to_string(), "*blog*".to_string()],
        }]);

        assert!(chain.admits_link(&url("https://example.com/docs/api"), "example.com"));
        assert!(chain.admits_link(&url("https://example.com/blog/post"), "example.com"));
        assert!(!chain.admits_link(&url("https://example.com/about"), "example.com"));
    }

    #[test]
    fn test_predicates_are_anded() {
        let chain = FilterChain::new(vec![
            LinkFilter::UrlPattern {
                patterns: vec!["*docs*".to_string()],
            },
            LinkFilter::Domain {
                allowed: vec!["example.com".to_string()],
                blocked: vec![],
            },
        ]);

        assert!(chain.admits_link(&url("https://example.com/docs"), "example.com"));
        // Matches the pattern but not the domain
        assert!(!chain.admits_link(&url("https://other.com/docs"), "other.com"));
        // Matches the domain but not the pattern
        assert!(!chain.admits_link(&url("https://example.com/about"), "example.com"));
    }

    #[test]
    fn test_content_type_abstains_pre_fetch() {
        let chain = FilterChain::new(vec![LinkFilter::ContentType {
            allowed: vec!["text/html".to_string()],
        }]);

        // No response yet: the link is admitted
        assert!(chain.admits_link(&url("https://example.com/file.pdf"), "example.com"));
    }

    #[test]
    fn test_content_type_post_fetch() {
        let chain = FilterChain::new(vec![LinkFilter::ContentType {
            allowed: vec!["text/html".to_string()],
        }]);

        assert!(chain.admits_content_type("text/html"));
        assert!(chain.admits_content_type("text/html; charset=utf-8"));
        assert!(!chain.admits_content_type("application/pdf"));
    }

    #[test]
    fn test_content_type_prefix_entries() {
        let chain = FilterChain::new(vec![LinkFilter::ContentType {
            allowed: vec!["text/".to_string()],
        }]);

        assert!(chain.admits_content_type("text/plain"));
        assert!(chain.admits_content_type("text/html; charset=utf-8"));
        assert!(!chain.admits_content_type("image/png"));
    }

    #[test]
    fn test_from_config_skips_unconfigured_sections() {
        let config = FilterConfig::default();
        let chain = FilterChain::from_config(&config);
        assert!(chain.is_empty());

        let config = FilterConfig {
            url_patterns: vec!["*docs*".to_string()],
            ..Default::default()
        };
        let chain = FilterChain::from_config(&config);
        assert!(!chain.is_empty());
        assert!(!chain.admits_link(&url("https://example.com/about"), "example.com"));
    }
}
