use crate::url::{FollowBehavior, MatchMode};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Sumi-Spider
///
/// `seeds` is a top-level key, so in the TOML file it must appear before the
/// first table header.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub cache: Option<CacheConfig>,
    pub parser: Option<SelectorConfig>,
    #[serde(default, rename = "fetcher-rules")]
    pub fetcher_rules: Vec<FetcherRuleConfig>,
    #[serde(default, rename = "parser-rules")]
    pub parser_rules: Vec<ParserRuleConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Work queue capacity
    #[serde(rename = "queue-size")]
    pub queue_size: usize,

    /// Pause each worker takes between addresses (milliseconds)
    #[serde(rename = "request-delay")]
    pub request_delay: u64,

    /// Approximate ceiling on addresses processed
    #[serde(rename = "max-urls")]
    pub max_urls: Option<u64>,

    /// Which discovered links are followed
    pub follow: FollowBehavior,

    /// Log progress periodically
    #[serde(rename = "report-progress")]
    pub report_progress: bool,

    /// Seconds between progress lines
    #[serde(rename = "progress-interval")]
    pub progress_interval: Option<u64>,

    /// Milliseconds between idle checks
    #[serde(rename = "idle-poll-interval")]
    pub idle_poll_interval: u64,

    /// Addresses treated as already crawled
    #[serde(rename = "known-urls")]
    pub known_urls: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            queue_size: 10_000,
            request_delay: 0,
            max_urls: None,
            follow: FollowBehavior::default(),
            report_progress: false,
            progress_interval: None,
            idle_poll_interval: 1000,
            known_urls: Vec::new(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the `User-Agent` header value
    ///
    /// ```
    /// use sumi_spider::config::UserAgentConfig;
    ///
    /// let config = UserAgentConfig {
    ///     crawler_name: "SumiSpider".to_string(),
    ///     crawler_version: "1.0".to_string(),
    ///     contact_url: "https://example.com/about".to_string(),
    ///     contact_email: "admin@example.com".to_string(),
    /// };
    /// assert_eq!(
    ///     config.user_agent_string(),
    ///     "SumiSpider/1.0 (+https://example.com/about; admin@example.com)"
    /// );
    /// ```
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout (seconds)
    pub timeout: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout")]
    pub connect_timeout: u64,

    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            connect_timeout: 10,
            max_redirects: 10,
        }
    }
}

/// Page cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Named CSS selectors for a `SelectorParser`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectorConfig {
    /// Field name → CSS selector
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    /// Fields that must match at least one element
    #[serde(default)]
    pub required: Vec<String>,
}

/// A `[[fetcher-rules]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherRuleConfig {
    pub pattern: String,

    #[serde(default, rename = "match")]
    pub mode: MatchMode,

    #[serde(default)]
    pub priority: i32,

    /// Request timeout override (seconds)
    pub timeout: Option<u64>,

    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

/// A `[[parser-rules]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ParserRuleConfig {
    pub pattern: String,

    #[serde(default, rename = "match")]
    pub mode: MatchMode,

    #[serde(default)]
    pub priority: i32,

    #[serde(flatten)]
    pub selectors: SelectorConfig,
}
