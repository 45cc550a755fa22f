//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Fetcher and parser traits with HTTP and CSS-selector implementations
//! - Domain rules that pick a fetcher and parser per address
//! - The seen-address ledger and bounded work queue
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod rules;
mod scheduler;

pub use coordinator::{
    CrawlResult, Crawler, CrawlerOptions, ResultCallback, DEFAULT_IDLE_POLL_INTERVAL,
    DEFAULT_WORKERS,
};
pub use fetcher::{build_http_client, FetchError, FetchOptions, Fetcher, HttpFetcher, Response};
pub use parser::{parse_html, ParseError, ParsedPage, Parser, SelectorParser};
pub use rules::{FetcherRule, ParserRule, Rule, RuleSet};
pub use scheduler::{Ledger, WorkQueue, DEFAULT_QUEUE_SIZE};
