//! Sumi-Spider: a concurrent, rule-driven site crawler
//!
//! This crate implements a crawl orchestrator that fetches pages with pluggable
//! fetchers, extracts structured data with pluggable parsers, and follows
//! discovered links according to a follow policy while guaranteeing that every
//! normalized address is scheduled at most once.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Spider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] crawler::ParseError),

    #[error("No fetcher configured for domain {domain}")]
    NoFetcher { domain: String },

    #[error("A crawl is already running on this crawler")]
    AlreadyRunning,

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
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

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
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

    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Result type alias for Sumi-Spider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use cache::{Cache, CacheError, MemoryCache, SqliteCache};
pub use config::Config;
pub use crawler::{CrawlResult, Crawler, CrawlerOptions, Fetcher, Parser, Response};
pub use output::{Stats, StatsSnapshot};
pub use crate::url::{canonicalize, normalize_url, FollowBehavior, MatchMode};
