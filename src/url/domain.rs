use std::net::IpAddr;
use url::Url;

/// Second-level labels under which registrations happen one level deeper
/// (`example.co.uk` rather than `co.uk`)
///
/// A short hand-kept list, not the public suffix list. Hosting suffixes such
/// as `github.io` are not on it.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "me.uk", "com.au", "net.au", "org.au", "co.nz",
    "co.jp", "ne.jp", "or.jp", "co.kr", "or.kr", "com.br", "com.cn", "co.in", "co.za",
];

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_spider::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at exactly the same host
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Returns true if both URLs share a registrable base domain
///
/// `blog.example.com` and `shop.example.com` are related, as are
/// `example.com` and `www.example.com`. IP addresses are only related to
/// themselves.
pub fn related_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(a), Some(b)) => base_domain(&a) == base_domain(&b),
        _ => false,
    }
}

/// Reduces a host to its registrable base domain
///
/// This is an approximation: the last two labels, or three under a suffix in
/// `MULTI_LABEL_SUFFIXES`. Any other multi-label public suffix is treated as a
/// domain, so `alice.github.io` and `bob.github.io` share the base `github.io`.
///
/// # Examples
///
/// ```
/// use sumi_spider::url::base_domain;
///
/// assert_eq!(base_domain("api.v2.example.com"), "example.com");
/// assert_eq!(base_domain("news.bbc.co.uk"), "bbc.co.uk");
/// assert_eq!(base_domain("localhost"), "localhost");
/// ```
pub fn base_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();

    if host.parse::<IpAddr>().is_ok() || host.starts_with('[') {
        return host;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        return host;
    }

    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_LABEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };

    labels[labels.len().saturating_sub(keep)..].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_extract_simple_domain() {
        assert_eq!(
            extract_domain(&url("https://example.com/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_with_port() {
        assert_eq!(
            extract_domain(&url("https://example.com:8080/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_extract_mixed_case() {
        assert_eq!(
            extract_domain(&url("https://Example.COM/")),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn test_same_host() {
        assert!(same_host(&url("http://a.test/x"), &url("http://a.test/y")));
        assert!(same_host(&url("http://a.test/"), &url("https://A.TEST/")));
        assert!(!same_host(&url("http://a.test/"), &url("http://b.test/")));
        assert!(!same_host(
            &url("http://a.test/"),
            &url("http://sub.a.test/")
        ));
    }

    #[test]
    fn test_base_domain() {
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("www.example.com"), "example.com");
        assert_eq!(base_domain("deep.nested.example.com"), "example.com");
        assert_eq!(base_domain("example.co.uk"), "example.co.uk");
        assert_eq!(base_domain("shop.example.co.uk"), "example.co.uk");
        assert_eq!(base_domain("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn test_base_domain_unlisted_suffix() {
        // Hosting suffixes outside the list collapse to the suffix itself
        assert_eq!(base_domain("alice.github.io"), "github.io");
        assert!(related_host(
            &url("https://alice.github.io/"),
            &url("https://bob.github.io/")
        ));
    }

    #[test]
    fn test_related_host() {
        assert!(related_host(
            &url("https://blog.example.com/"),
            &url("https://shop.example.com/")
        ));
        assert!(related_host(
            &url("https://example.com/"),
            &url("https://www.example.com/")
        ));
        assert!(!related_host(
            &url("https://example.com/"),
            &url("https://example.org/")
        ));
        assert!(!related_host(
            &url("https://a.co.uk/"),
            &url("https://b.co.uk/")
        ));
        assert!(!related_host(
            &url("http://127.0.0.1/"),
            &url("http://127.0.0.2/")
        ));
    }
}
