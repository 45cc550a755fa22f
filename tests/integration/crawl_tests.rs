//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end through `Crawler::from_config`.

use serde_json::json;
use std::sync::{Arc, Mutex};
use sumi_spider::config::{parse_config, Config};
use sumi_spider::{CrawlResult, Crawler, SpiderError};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration seeded at the server root
///
/// `crawler` lines go into the `[crawler]` table; `sections` is appended
/// after the required tables.
fn create_test_config(server: &MockServer, crawler: &str, sections: &str) -> Config {
    let content = format!(
        r#"
seeds = ["{uri}/"]

[crawler]
workers = 4
idle-poll-interval = 50
{crawler}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[fetch]
timeout = 5

{sections}
"#,
        uri = server.uri(),
        crawler = crawler,
        sections = sections
    );
    parse_config(&content).expect("Failed to parse test config")
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><body>{}</body></html>", body))
        .insert_header("content-type", "text/html")
}

async fn run(config: &Config) -> (Crawler, Vec<CrawlResult>) {
    let crawler = Crawler::from_config(config).expect("Failed to create crawler");
    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();

    crawler
        .crawl(config.seeds.clone(), move |result| {
            sink.lock().unwrap().push(result)
        })
        .await
        .expect("Crawl failed");

    let results = std::mem::take(&mut *results.lock().unwrap());
    (crawler, results)
}

fn find<'a>(results: &'a [CrawlResult], url: &str) -> &'a CrawlResult {
    results
        .iter()
        .find(|r| r.url == url)
        .unwrap_or_else(|| panic!("no result for {}", url))
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            r#"<a href="/page1">1</a><a href="{}/page2">2</a><a href="http://other.test/">out</a>"#,
            base
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<a href="/page2">2</a><a href="/">home</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<p>leaf</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, "", "");
    let (crawler, results) = run(&config).await;

    let mut urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            base.clone(),
            format!("{}/page1", base),
            format!("{}/page2", base)
        ]
    );
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(find(&results, &base)
        .links
        .contains(&"http://other.test/".to_string()));

    let stats = crawler.stats().snapshot();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_http_errors_are_failures() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/missing">gone</a><a href="/broken">broken</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = create_test_config(&server, "", "");
    let (crawler, results) = run(&config).await;

    let missing = find(&results, &format!("{}/missing", base));
    assert!(missing.response.is_none());
    assert!(matches!(missing.error, Some(SpiderError::Fetch(_))));

    let stats = crawler.stats().snapshot();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 2);
}

#[tokio::test]
async fn test_parser_rule_extracts_fields() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<h1>Catalog</h1><span class="price">9.99</span><a href="/item">item</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(html("<h1>Item without price</h1>"))
        .mount(&server)
        .await;

    let sections = r#"
[[parser-rules]]
pattern = "127.0.0.*"
match = "glob"
priority = 5
required = ["price"]

[parser-rules.fields]
heading = "h1"
price = ".price"
"#;
    let config = create_test_config(&server, "", sections);
    let (crawler, results) = run(&config).await;

    let root = find(&results, &base);
    let parsed = root.parsed.as_ref().unwrap();
    assert_eq!(parsed["heading"], json!(["Catalog"]));
    assert_eq!(parsed["price"], json!(["9.99"]));
    assert!(root.is_ok());

    let item = find(&results, &format!("{}/item", base));
    assert!(matches!(item.error, Some(SpiderError::Parse(_))));
    assert_eq!(
        item.parsed.as_ref().unwrap()["heading"],
        json!(["Item without price"])
    );

    assert_eq!(crawler.stats().succeeded(), 2);
}

#[tokio::test]
async fn test_non_html_content_has_no_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/data.json">data</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"next": "<a href='/hidden'>x</a>"}"#)
                .insert_header("content-type", "application/json"),
        )
        .mount(&server)
        .await;

    let sections = r#"
[parser.fields]
heading = "h1"
"#;
    let config = create_test_config(&server, "", sections);
    let (crawler, results) = run(&config).await;

    assert_eq!(results.len(), 2);
    let data = find(&results, &format!("{}/data.json", base));
    assert!(data.links.is_empty());
    assert!(matches!(data.error, Some(SpiderError::Parse(_))));
    assert!(!crawler.is_known(&format!("{}/hidden", base)));
}

#[tokio::test]
async fn test_fetcher_rule_overrides_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("user-agent", "RuleBot/2.0"))
        .respond_with(html("<p>welcome</p>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let sections = r#"
[[fetcher-rules]]
pattern = "127\\.0\\.0\\.1"
match = "regex"
priority = 1
user-agent = "RuleBot/2.0"
"#;
    let config = create_test_config(&server, "", sections);
    let (crawler, results) = run(&config).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_ok());
    assert_eq!(crawler.stats().failed(), 0);
}

#[tokio::test]
async fn test_cache_persists_between_crawlers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cache.db");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/next">next</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("<p>next</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let sections = format!(
        "[cache]\ndatabase-path = \"{}\"\n",
        db_path.display().to_string().replace('\\', "/")
    );
    let config = create_test_config(&server, "", &sections);

    let (_, first) = run(&config).await;
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|r| !r.response.as_ref().unwrap().from_cache));

    // A fresh crawler has an empty ledger but the same cache file
    let (_, second) = run(&config).await;
    assert_eq!(second.len(), 2);
    assert!(second.iter().all(|r| r.response.as_ref().unwrap().from_cache));
}

#[tokio::test]
async fn test_max_urls_limits_crawl() {
    let server = MockServer::start().await;

    let links: String = (1..=20)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&links))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html("<p>leaf</p>"))
        .mount(&server)
        .await;

    let config = create_test_config(&server, "max-urls = 5", "");
    let (crawler, results) = run(&config).await;

    assert_eq!(results.len(), 5);
    assert_eq!(crawler.stats().processed(), 5);
}

#[tokio::test]
async fn test_follow_none_crawls_only_seeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/next">next</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("<p>next</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, r#"follow = "none""#, "");
    let (_, results) = run(&config).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].links.len(), 1);
}
