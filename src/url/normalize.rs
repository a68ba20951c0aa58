use crate::UrlError;
use url::Url;

/// Normalizes a URL for crawling
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject schemes other than http/https
/// 3. Lowercase the host
/// 4. Remove the fragment (everything after #)
///
/// Query strings are kept: they may select distinct documents and the fetch
/// must preserve them. Deduplication ignores them via [`dedup_key`].
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use fathom::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/page#section").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let normalized_host = host.to_lowercase();
        url.set_host(Some(&normalized_host))
            .map_err(|_| UrlError::MissingDomain)?;
    } else {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    Ok(url)
}

/// Returns the deduplication key for a URL: scheme + host + path
///
/// Two URLs with the same key are considered the same page for the
/// at-most-once fetch guarantee. Query strings and fragments do not
/// participate in deduplication.
///
/// # Examples
///
/// ```
/// use fathom::url::{dedup_key, normalize_url};
///
/// let a = normalize_url("https://example.com/page?tab=1").unwrap();
/// let b = normalize_url("https://example.com/page?tab=2").unwrap();
/// assert_eq!(dedup_key(&a), dedup_key(&b));
/// ```
pub fn dedup_key(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or(""),
        url.path()
    )
}
