//! Fetcher trait and HTTP fetcher implementation
//!
//! This module handles retrieving pages for the crawler, including:
//! - The `Fetcher` trait the crawler dispatches to per domain
//! - The `Response` handed from fetchers to parsers
//! - Building HTTP clients with proper user agent strings
//! - Error classification for failed requests

use crate::config::{FetchConfig, UserAgentConfig};
use crate::crawler::parser::parse_html;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::borrow::Cow;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Errors a fetcher can report for a single address
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Could not reach {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },

    #[error("Invalid request option: {0}")]
    InvalidOption(String),
}

/// Per-request options passed to every fetch
///
/// `cancel` is the crawl's cancellation scope; fetchers should stop work
/// promptly once it fires.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// User agent override for this request
    pub user_agent: Option<String>,

    /// Whole-request timeout override
    pub timeout: Option<Duration>,

    /// Extra request headers
    pub headers: Vec<(String, String)>,

    /// Cancellation scope of the running crawl
    pub cancel: CancellationToken,
}

/// A fetched (or cache-synthesized) page
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code, if the page came from the network
    pub status: Option<u16>,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Raw page body
    pub body: Vec<u8>,

    /// Outbound links found in the body (absolute URLs)
    pub links: Vec<String>,

    /// True if the body was served from the page cache
    pub from_cache: bool,
}

impl Response {
    /// Builds a response from a fetched body, extracting links from HTML
    pub fn new(url: Url, status: Option<u16>, content_type: Option<String>, body: Vec<u8>) -> Self {
        let mut response = Self {
            url,
            status,
            content_type,
            body,
            links: Vec::new(),
            from_cache: false,
        };
        if response.is_html() {
            response.links = parse_html(&response.text(), &response.url).links;
        }
        response
    }

    /// Synthesizes a response from cached bytes
    ///
    /// Cached entries carry no headers, so the body is treated as HTML and its
    /// links are extracted as if it had just been fetched.
    pub fn from_cache(url: Url, body: Vec<u8>) -> Self {
        let mut response = Self::new(url, None, None, body);
        response.from_cache = true;
        response
    }

    /// The body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Returns true if the response is HTML, or has no declared type
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| {
                let ct = ct.to_ascii_lowercase();
                ct.contains("text/html") || ct.contains("application/xhtml")
            })
            .unwrap_or(true)
    }

    /// Returns true if there is a body worth caching
    pub fn has_content(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Retrieves pages for the crawler
///
/// Implementations are shared by all crawl workers and must be safe for
/// concurrent use.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a single address
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<Response, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `fetch` - Timeouts and redirect limits
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sumi_spider::config::{FetchConfig, UserAgentConfig};
/// use sumi_spider::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "SumiSpider".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.user_agent_string())
        .timeout(Duration::from_secs(fetch.timeout))
        .connect_timeout(Duration::from_secs(fetch.connect_timeout))
        .redirect(Policy::limited(fetch.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher that retrieves pages over HTTP(S) with reqwest
///
/// Settings given to the fetcher itself (through `with_timeout` or
/// `with_user_agent`) take precedence over the crawl-wide `FetchOptions`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl HttpFetcher {
    /// Wraps an existing client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: None,
            user_agent: None,
        }
    }

    /// Builds a fetcher with its own client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        fetch: &FetchConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, fetch)?))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// The underlying client, for sharing with other fetchers
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn execute(&self, url: &Url, options: &FetchOptions) -> Result<Response, FetchError> {
        let mut request = self.client.get(url.clone());

        if let Some(user_agent) = self.user_agent.as_ref().or(options.user_agent.as_ref()) {
            request = request.header(USER_AGENT, user_agent.as_str());
        }

        if let Some(timeout) = self.timeout.or(options.timeout) {
            request = request.timeout(timeout);
        }

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidOption(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidOption(format!("header value: {}", e)))?;
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        tracing::trace!(
            "Fetched {} ({} bytes, {})",
            final_url,
            body.len(),
            content_type.as_deref().unwrap_or("no content type")
        );

        Ok(Response::new(
            final_url,
            Some(status.as_u16()),
            content_type,
            body.to_vec(),
        ))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<Response, FetchError> {
        tokio::select! {
            _ = options.cancel.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
            result = self.execute(url, options) => result,
        }
    }
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Unreachable {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
