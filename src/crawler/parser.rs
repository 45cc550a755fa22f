//! HTML parsing for link discovery and structured extraction
//!
//! This module handles:
//! - Extracting links to follow (from <a> tags and canonical links)
//! - Extracting the page title
//! - The `Parser` trait the crawler dispatches to per domain
//! - `SelectorParser`, a parser driven by named CSS selectors

use crate::config::SelectorConfig;
use crate::crawler::fetcher::Response;
use crate::url::resolve_link;
use crate::ConfigError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<link rel="stylesheet" ...>`, `<script src="...">`, `<img src="...">`
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links
///
/// `rel="nofollow"` links are kept; whether they are followed is decided by
/// the crawl's follow behavior.
///
/// # Example
///
/// ```
/// use sumi_spider::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(base_url, href))
            {
                links.push(absolute_url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(base_url, href))
            {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// A parser failure
///
/// Parsers may still hand back whatever they managed to extract; the crawler
/// forwards `partial` to the result callback alongside the error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub partial: Option<Value>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }

    pub fn with_partial(message: impl Into<String>, partial: Value) -> Self {
        Self {
            message: message.into(),
            partial: Some(partial),
        }
    }
}

/// Extracts a structured value from a fetched page
///
/// Implementations are shared by all crawl workers and must be safe for
/// concurrent use.
#[async_trait]
pub trait Parser: Send + Sync {
    async fn parse(&self, response: &Response) -> Result<Value, ParseError>;
}

#[derive(Debug, Clone)]
struct FieldSelector {
    name: String,
    css: String,
    selector: Selector,
    required: bool,
}

/// Parser that extracts named fields with CSS selectors
///
/// The parsed value is a JSON object holding the final `url`, the page
/// `title` (or null), and one array of trimmed text values per field.
#[derive(Debug, Clone, Default)]
pub struct SelectorParser {
    fields: Vec<FieldSelector>,
}

impl SelectorParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an optional field
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_spider::crawler::SelectorParser;
    ///
    /// let parser = SelectorParser::new()
    ///     .field("headings", "h1, h2")
    ///     .unwrap()
    ///     .required_field("price", ".price")
    ///     .unwrap();
    /// assert_eq!(parser.field_names(), vec!["headings", "price"]);
    /// ```
    pub fn field(self, name: &str, css: &str) -> Result<Self, ConfigError> {
        self.push_field(name, css, false)
    }

    /// Adds a field that must match at least one element
    pub fn required_field(self, name: &str, css: &str) -> Result<Self, ConfigError> {
        self.push_field(name, css, true)
    }

    /// Builds a parser from a `[parser]` or `[[parser-rules]]` section
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        if let Some(unknown) = config
            .required
            .iter()
            .find(|name| !config.fields.contains_key(*name))
        {
            return Err(ConfigError::Validation(format!(
                "required field '{}' has no selector",
                unknown
            )));
        }

        config
            .fields
            .iter()
            .try_fold(Self::new(), |parser, (name, css)| {
                if config.required.contains(name) {
                    parser.required_field(name, css)
                } else {
                    parser.field(name, css)
                }
            })
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn push_field(mut self, name: &str, css: &str, required: bool) -> Result<Self, ConfigError> {
        let selector = Selector::parse(css)
            .map_err(|e| ConfigError::InvalidSelector(format!("{} ({}): {}", name, css, e)))?;

        self.fields.push(FieldSelector {
            name: name.to_string(),
            css: css.to_string(),
            selector,
            required,
        });
        Ok(self)
    }

    /// Runs every selector over the document
    ///
    /// Returns the extracted object and the names of required fields that
    /// matched nothing.
    fn extract(&self, html: &str, url: &Url) -> (Map<String, Value>, Vec<String>) {
        let document = Html::parse_document(html);
        let mut object = Map::new();
        let mut missing = Vec::new();

        object.insert("url".to_string(), Value::String(url.to_string()));
        object.insert(
            "title".to_string(),
            extract_title(&document).map(Value::String).unwrap_or(Value::Null),
        );

        for field in &self.fields {
            let values: Vec<Value> = document
                .select(&field.selector)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .filter(|text| !text.is_empty())
                .map(Value::String)
                .collect();

            if values.is_empty() && field.required {
                tracing::trace!("Required field {} ({}) matched nothing on {}", field.name, field.css, url);
                missing.push(field.name.clone());
            }

            object.insert(field.name.clone(), Value::Array(values));
        }

        (object, missing)
    }
}

#[async_trait]
impl Parser for SelectorParser {
    async fn parse(&self, response: &Response) -> Result<Value, ParseError> {
        if !response.is_html() {
            return Err(ParseError::new(format!(
                "Expected HTML, got {}",
                response.content_type.as_deref().unwrap_or("unknown content")
            )));
        }

        let (object, missing) = self.extract(&response.text(), &response.url);

        if missing.is_empty() {
            Ok(Value::Object(object))
        } else {
            Err(ParseError::with_partial(
                format!("Missing required fields: {}", missing.join(", ")),
                Value::Object(object),
            ))
        }
    }
}
