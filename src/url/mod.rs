//! URL handling module for Sumi-Spider
//!
//! This module provides URL normalization, domain extraction, domain pattern
//! matching, link resolution, and the follow policy applied to discovered links.

mod domain;
mod matcher;
mod normalize;

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use url::Url;

// Re-export main functions
pub use domain::{base_domain, extract_domain, related_host, same_host};
pub use matcher::{matches_wildcard, DomainPattern, MatchMode};
pub use normalize::{canonicalize, normalize_url, resolve_link};

/// Which discovered links are eligible for scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowBehavior {
    /// Follow every link that normalizes
    Any,
    /// Follow links whose host equals the page host
    #[default]
    SameDomain,
    /// Follow links sharing the page's registrable base domain
    RelatedSubdomains,
    /// Never follow links
    None,
}

impl FollowBehavior {
    /// Returns true if a link found on `page` may be followed
    pub fn allows(&self, page: &Url, candidate: &Url) -> bool {
        match self {
            Self::Any => true,
            Self::SameDomain => same_host(page, candidate),
            Self::RelatedSubdomains => related_host(page, candidate),
            Self::None => false,
        }
    }

    /// Filters discovered links down to those eligible for scheduling
    ///
    /// Links that fail to normalize are dropped silently. The returned strings
    /// are the links as given, in their original order.
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_spider::url::FollowBehavior;
    /// use url::Url;
    ///
    /// let page = Url::parse("http://a.test/").unwrap();
    /// let links = vec!["http://a.test/x".to_string(), "http://b.test/y".to_string()];
    ///
    /// assert_eq!(
    ///     FollowBehavior::SameDomain.filter_links(&page, &links),
    ///     vec!["http://a.test/x".to_string()]
    /// );
    /// assert!(FollowBehavior::None.filter_links(&page, &links).is_empty());
    /// ```
    pub fn filter_links(&self, page: &Url, links: &[String]) -> Vec<String> {
        if *self == Self::None {
            return Vec::new();
        }

        links
            .iter()
            .filter(|link| match normalize_url(link) {
                Ok(candidate) => self.allows(page, &candidate),
                Err(e) => {
                    tracing::trace!("Dropping unfollowable link {}: {}", link, e);
                    false
                }
            })
            .cloned()
            .collect()
    }
}

impl FromStr for FollowBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "any" => Ok(Self::Any),
            "same-domain" => Ok(Self::SameDomain),
            "related-subdomains" => Ok(Self::RelatedSubdomains),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown follow behavior '{}' (expected any, same-domain, related-subdomains, none)",
                other
            )),
        }
    }
}

impl fmt::Display for FollowBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::SameDomain => "same-domain",
            Self::RelatedSubdomains => "related-subdomains",
            Self::None => "none",
        };
        f.write_str(name)
    }
}
