use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Normalizes a URL according to Sumi-Spider's normalization rules
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not HTTP or HTTPS
/// 3. Lowercase the host/domain
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters by key
/// 8. Remove empty query string (trailing ?)
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
/// use sumi_spider::url::normalize_url;
///
/// let url = normalize_url("http://EXAMPLE.COM/page/#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let normalized_host = host.to_lowercase();
            url.set_host(Some(&normalized_host))
                .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
        }
        _ => return Err(UrlError::MissingDomain),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(filtered_params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Produces the canonical string form of an address
///
/// This is the key used by the dedup ledger and the form placed on the work
/// queue: the normalized URL with a single trailing `/` stripped, so that
/// `http://a.test/` and `http://a.test` collapse to one entry.
///
/// Canonicalizing an already canonical address yields the identical string.
///
/// # Examples
///
/// ```
/// use sumi_spider::url::canonicalize;
///
/// assert_eq!(canonicalize("http://A.test/").unwrap(), "http://a.test");
/// assert_eq!(canonicalize("http://a.test").unwrap(), "http://a.test");
/// ```
pub fn canonicalize(url_str: &str) -> Result<String, UrlError> {
    let normalized = normalize_url(url_str)?;
    let mut canonical: String = normalized.into();
    if canonical.ends_with('/') {
        canonical.pop();
    }
    Ok(canonical)
}

/// Resolves a link href against the page it was found on
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
///
/// # Examples
///
/// ```
/// use sumi_spider::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/docs/intro").unwrap();
/// assert_eq!(
///     resolve_link(&base, "guide"),
///     Some("https://example.com/docs/guide".to_string())
/// );
/// assert_eq!(resolve_link(&base, "mailto:me@example.com"), None);
/// ```
pub fn resolve_link(base_url: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort keeps repeated keys in their original order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_scheme() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");

        let result = normalize_url("https://example.com/page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_remove_tracking_params() {
        let result = normalize_url("https://example.com/page?utm_source=twitter").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = normalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_lowercase_domain_keeps_path_case() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_mixed_query_params() {
        let result = normalize_url(
            "https://example.com/page?keep=yes&utm_medium=email&another=value&fbclid=123",
        )
        .unwrap();
        assert_eq!(
            result.as_str(),
            "https://example.com/page?another=value&keep=yes"
        );
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
        assert!(normalize_url("").is_err());
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_multiple_slashes() {
        let result = normalize_url("https://example.com///path//to///page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/path/to/page");
    }

    #[test]
    fn test_canonicalize_strips_one_trailing_slash() {
        assert_eq!(canonicalize("http://a.test/").unwrap(), "http://a.test");
        assert_eq!(canonicalize("http://a.test/x/").unwrap(), "http://a.test/x");
        assert_eq!(
            canonicalize("http://a.test/x?b=2&a=1").unwrap(),
            "http://a.test/x?a=1&b=2"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let inputs = [
            "http://A.test/",
            "https://example.com/a/../b/?utm_source=x&z=1&a=hello%20world#frag",
            "http://example.com:8080/path/",
            "https://example.com/?q=a%26b",
            "https://example.com/search?q=one+two",
        ];

        for input in inputs {
            let once = canonicalize(input).unwrap();
            let twice = canonicalize(&once).unwrap();
            assert_eq!(once, twice, "canonicalize not idempotent for {}", input);
        }
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("https://example.com/dir/page").unwrap();
        assert_eq!(
            resolve_link(&base, "/other"),
            Some("https://example.com/other".to_string())
        );
        assert_eq!(
            resolve_link(&base, "sibling"),
            Some("https://example.com/dir/sibling".to_string())
        );
        assert_eq!(
            resolve_link(&base, "https://other.com/x"),
            Some("https://other.com/x".to_string())
        );
    }

    #[test]
    fn test_resolve_skips_special_links() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(resolve_link(&base, "javascript:void(0)"), None);
        assert_eq!(resolve_link(&base, "MAILTO:a@b.com"), None);
        assert_eq!(resolve_link(&base, "tel:+123"), None);
        assert_eq!(resolve_link(&base, "data:text/html,hi"), None);
        assert_eq!(resolve_link(&base, "#top"), None);
        assert_eq!(resolve_link(&base, "   "), None);
        assert_eq!(resolve_link(&base, "ftp://example.com/file"), None);
    }
}
