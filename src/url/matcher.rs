/// Checks if a domain matches a wildcard pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "example.com" matches only "example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "blog.example.com" (single subdomain)
///    - "api.v2.example.com" (nested subdomains)
///
/// # Arguments
///
/// * `pattern` - The domain pattern, optionally starting with "*."
/// * `candidate` - The domain to check against the pattern
///
/// # Examples
///
/// ```
/// use fathom::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "blog.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        // Wildcard pattern: matches the base domain itself or any subdomain
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        // Exact match only
        candidate == pattern
    }
}

/// Matches a URL string against a glob pattern
///
/// Supports `*` as "any sequence of characters, including `/`". This is the
/// matching used by URL-pattern filters: `*docs*` matches any URL containing
/// "docs", `https://example.com/blog/*` matches everything under /blog/.
///
/// # Examples
///
/// ```
/// use fathom::url::glob_match;
///
/// assert!(glob_match("*docs*", "https://example.com/docs/api"));
/// assert!(glob_match("https://example.com/blog/*", "https://example.com/blog/2024/post"));
/// assert!(!glob_match("https://example.com/blog/*", "https://example.com/about"));
/// ```
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    // No wildcard: exact match
    if parts.len() == 1 {
        return pattern == candidate;
    }

    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            // Pattern does not start with '*': anchor at the beginning
            if !candidate.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == parts.len() - 1 {
            // Pattern does not end with '*': anchor at the end
            return candidate.len() >= pos + part.len() && candidate[pos..].ends_with(part);
        } else {
            match candidate[pos..].find(part) {
                Some(idx) => pos = pos + idx + part.len(),
                None => return false,
            }
        }
    }

    true
}
