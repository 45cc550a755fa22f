//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Admitting seed and discovered addresses through the ledger and queue
//! - A pool of workers running the per-address pipeline
//! - Cache lookups and stores around fetching
//! - Fetcher and parser dispatch by domain rules
//! - Idle detection, progress reporting, and cancellation

use crate::cache::{open_cache, Cache};
use crate::config::Config;
use crate::crawler::fetcher::{FetchOptions, Fetcher, HttpFetcher, Response};
use crate::crawler::parser::{Parser, SelectorParser};
use crate::crawler::rules::{FetcherRule, ParserRule, Rule, RuleSet};
use crate::crawler::scheduler::{monitor_idle, Ledger, WorkQueue, DEFAULT_QUEUE_SIZE};
use crate::output::{report_progress, QueueGauge, Stats, DEFAULT_PROGRESS_INTERVAL};
use crate::state::RunControl;
use crate::url::{canonicalize, extract_domain, resolve_link, FollowBehavior};
use crate::{ConfigError, Result, SpiderError};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Worker count used when none is configured
pub const DEFAULT_WORKERS: usize = 10;

/// Interval between idle checks used when none is configured
pub const DEFAULT_IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of processing one address, handed to the result callback
#[derive(Debug)]
pub struct CrawlResult {
    /// Canonical address that was processed
    pub url: String,

    /// Value produced by the parser, or its partial value on failure
    pub parsed: Option<Value>,

    /// Every link discovered on the page, resolved to absolute form
    pub links: Vec<String>,

    /// The fetched or cache-synthesized page
    pub response: Option<Response>,

    /// What went wrong, if anything
    pub error: Option<SpiderError>,
}

impl CrawlResult {
    fn failed(url: String, error: SpiderError) -> Self {
        Self {
            url,
            parsed: None,
            links: Vec::new(),
            response: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Callback invoked once per processed address, possibly concurrently
pub type ResultCallback = Arc<dyn Fn(CrawlResult) + Send + Sync>;

/// Construction options for a `Crawler`
pub struct CrawlerOptions {
    /// Number of concurrent workers
    pub workers: usize,

    /// Work queue capacity; zero means `DEFAULT_QUEUE_SIZE`
    pub queue_size: usize,

    /// Pause each worker takes after finishing an address
    pub request_delay: Option<Duration>,

    /// Approximate ceiling on addresses processed
    pub max_urls: Option<u64>,

    /// Which discovered links are scheduled
    pub follow: FollowBehavior,

    /// Page cache consulted before fetching
    pub cache: Option<Arc<dyn Cache>>,

    /// Addresses treated as already crawled
    pub known_urls: Vec<String>,

    pub fetcher_rules: Vec<FetcherRule>,
    pub default_fetcher: Option<Arc<dyn Fetcher>>,

    pub parser_rules: Vec<ParserRule>,
    pub default_parser: Option<Arc<dyn Parser>>,

    /// Options passed to every fetch; the cancellation token is replaced
    /// with the running crawl's scope
    pub fetch_options: FetchOptions,

    /// Log progress periodically while crawling
    pub report_progress: bool,

    /// Interval between progress lines; defaults to `DEFAULT_PROGRESS_INTERVAL`
    pub progress_interval: Option<Duration>,

    /// Interval between idle checks
    pub idle_poll_interval: Duration,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_size: DEFAULT_QUEUE_SIZE,
            request_delay: None,
            max_urls: None,
            follow: FollowBehavior::default(),
            cache: None,
            known_urls: Vec::new(),
            fetcher_rules: Vec::new(),
            default_fetcher: None,
            parser_rules: Vec::new(),
            default_parser: None,
            fetch_options: FetchOptions::default(),
            report_progress: false,
            progress_interval: None,
            idle_poll_interval: DEFAULT_IDLE_POLL_INTERVAL,
        }
    }
}

impl CrawlerOptions {
    /// Builds options from a loaded configuration
    ///
    /// The default fetcher is an `HttpFetcher` built from the user agent and
    /// fetch sections; each fetcher rule gets an `HttpFetcher` sharing its
    /// client with the rule's own timeout and user agent. Parser sections
    /// become `SelectorParser`s.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlerOptions)` - Options ready for `Crawler::new`
    /// * `Err(SpiderError)` - A client, selector, or cache failed to build
    pub fn from_config(config: &Config) -> Result<Self> {
        let crawler = &config.crawler;
        let http = HttpFetcher::from_config(&config.user_agent, &config.fetch)?;

        let fetcher_rules = config
            .fetcher_rules
            .iter()
            .map(|rule| {
                let mut fetcher = HttpFetcher::new(http.client().clone());
                if let Some(timeout) = rule.timeout {
                    fetcher = fetcher.with_timeout(Duration::from_secs(timeout));
                }
                if let Some(user_agent) = &rule.user_agent {
                    fetcher = fetcher.with_user_agent(user_agent.clone());
                }
                Rule::new(
                    rule.pattern.clone(),
                    rule.mode,
                    rule.priority,
                    Arc::new(fetcher) as Arc<dyn Fetcher>,
                )
            })
            .collect();

        let parser_rules = config
            .parser_rules
            .iter()
            .map(|rule| {
                let parser = SelectorParser::from_config(&rule.selectors)?;
                Ok(Rule::new(
                    rule.pattern.clone(),
                    rule.mode,
                    rule.priority,
                    Arc::new(parser) as Arc<dyn Parser>,
                ))
            })
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;

        let default_parser = match &config.parser {
            Some(selectors) => Some(Arc::new(SelectorParser::from_config(selectors)?) as Arc<dyn Parser>),
            None => None,
        };

        let cache = match &config.cache {
            Some(cache) => {
                tracing::info!("Using page cache at {}", cache.database_path);
                Some(Arc::new(open_cache(Path::new(&cache.database_path))?) as Arc<dyn Cache>)
            }
            None => None,
        };

        Ok(Self {
            workers: crawler.workers,
            queue_size: crawler.queue_size,
            request_delay: (crawler.request_delay > 0)
                .then(|| Duration::from_millis(crawler.request_delay)),
            max_urls: crawler.max_urls,
            follow: crawler.follow,
            cache,
            known_urls: crawler.known_urls.clone(),
            fetcher_rules,
            default_fetcher: Some(Arc::new(http) as Arc<dyn Fetcher>),
            parser_rules,
            default_parser,
            fetch_options: FetchOptions::default(),
            report_progress: crawler.report_progress,
            progress_interval: crawler.progress_interval.map(Duration::from_secs),
            idle_poll_interval: Duration::from_millis(crawler.idle_poll_interval),
        })
    }
}

/// Main crawler structure
///
/// A crawler owns its ledger, queue and counters for its whole lifetime, so an
/// address admitted in one crawl is never scheduled again by a later one. Only
/// one crawl may run on an instance at a time.
pub struct Crawler {
    queue: Arc<WorkQueue>,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    workers: usize,
    request_delay: Option<Duration>,
    max_urls: Option<u64>,
    follow: FollowBehavior,
    cache: Option<Arc<dyn Cache>>,
    fetchers: RwLock<Arc<RuleSet<Arc<dyn Fetcher>>>>,
    parsers: RwLock<Arc<RuleSet<Arc<dyn Parser>>>>,
    fetch_options: FetchOptions,
    progress_interval: Option<Duration>,
    idle_poll_interval: Duration,
    run: RunControl,
}

impl Crawler {
    /// Creates a new crawler
    ///
    /// Known addresses are canonicalized into the ledger up front; ones that
    /// fail to canonicalize are skipped with a warning.
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Ready to crawl
    /// * `Err(SpiderError)` - A rule pattern failed to compile
    pub fn new(options: CrawlerOptions) -> Result<Self> {
        let mut fetchers = RuleSet::new(options.default_fetcher);
        fetchers.add(options.fetcher_rules)?;

        let mut parsers = RuleSet::new(options.default_parser);
        parsers.add(options.parser_rules)?;

        if !fetchers.is_empty() || !parsers.is_empty() {
            tracing::debug!(
                "Dispatch order: {} fetcher rules {:?}, {} parser rules {:?}",
                fetchers.len(),
                fetchers.patterns(),
                parsers.len(),
                parsers.patterns()
            );
        }

        let ledger = Ledger::new();
        for known in &options.known_urls {
            match canonicalize(known) {
                Ok(canonical) => {
                    ledger.insert(&canonical);
                }
                Err(e) => tracing::warn!("Ignoring known URL {}: {}", known, e),
            }
        }
        if !ledger.is_empty() {
            tracing::info!("Loaded {} known URLs", ledger.len());
        }

        let workers = if options.workers == 0 {
            tracing::warn!("Worker count of 0 requested, using 1");
            1
        } else {
            options.workers
        };

        let progress_interval = options
            .report_progress
            .then(|| options.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL));

        Ok(Self {
            queue: Arc::new(WorkQueue::new(options.queue_size)),
            ledger: Arc::new(ledger),
            stats: Arc::new(Stats::new()),
            workers,
            request_delay: options.request_delay,
            max_urls: options.max_urls,
            follow: options.follow,
            cache: options.cache,
            fetchers: RwLock::new(Arc::new(fetchers)),
            parsers: RwLock::new(Arc::new(parsers)),
            fetch_options: options.fetch_options,
            progress_interval,
            idle_poll_interval: options.idle_poll_interval,
            run: RunControl::new(),
        })
    }

    /// Builds a crawler straight from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(CrawlerOptions::from_config(config)?)
    }

    /// Crawls from the given seeds until no work remains or `stop` is called
    ///
    /// `callback` is invoked once for every processed address, from worker
    /// tasks, possibly concurrently.
    pub async fn crawl<I, S, F>(&self, seeds: I, callback: F) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(CrawlResult) + Send + Sync + 'static,
    {
        self.crawl_with_cancellation(seeds, callback, CancellationToken::new())
            .await
    }

    /// Like `crawl`, but also ends when `cancel` fires
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The crawl ran to idle, was stopped, or had nothing to do
    /// * `Err(SpiderError::AlreadyRunning)` - Another crawl holds this instance
    /// * `Err(SpiderError::Cancelled)` - Cancelled while admitting seeds
    pub async fn crawl_with_cancellation<I, S, F>(
        &self,
        seeds: I,
        callback: F,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(CrawlResult) + Send + Sync + 'static,
    {
        let seeds: Vec<String> = seeds.into_iter().map(Into::into).collect();

        let guard = self.run.begin(cancel.child_token())?;
        let cancel = guard.token().clone();
        let context = Arc::new(self.context(cancel.clone(), Arc::new(callback)));

        tracing::info!(
            "Starting crawl with {} seeds, {} workers, following {}",
            seeds.len(),
            self.workers,
            self.follow
        );

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(run_worker(context.clone(), id));
        }

        let monitor = tokio::spawn(monitor_idle(
            self.queue.clone(),
            self.idle_poll_interval,
            cancel.clone(),
        ));

        let reporter = self.progress_interval.map(|interval| {
            tokio::spawn(report_progress(
                self.stats.clone(),
                self.queue.clone() as Arc<dyn QueueGauge>,
                interval,
                cancel.clone(),
            ))
        });

        let admission = context.enqueue(seeds, Admit::Blocking).await;
        if admission.cancelled {
            tracing::warn!(
                "Crawl cancelled while admitting seeds ({} admitted)",
                admission.admitted
            );
            return Err(SpiderError::Cancelled);
        }

        if admission.admitted == 0 {
            tracing::info!("No new seeds to crawl");
            return Ok(());
        }

        tracing::info!("Admitted {} seeds", admission.admitted);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        cancel.cancel();
        if let Err(e) = monitor.await {
            tracing::error!("Idle monitor failed: {}", e);
        }
        if let Some(reporter) = reporter {
            if let Err(e) = reporter.await {
                tracing::error!("Progress reporter failed: {}", e);
            }
        }

        tracing::info!(
            "Crawl finished in {:.1}s: {}",
            self.run.elapsed().unwrap_or_default().as_secs_f64(),
            self.stats.snapshot()
        );
        Ok(())
    }

    /// Cancels the running crawl; harmless when idle
    pub fn stop(&self) {
        if self.run.stop() {
            tracing::info!("Stop requested");
        }
    }

    /// Shared live counters
    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    /// Returns true if the address has been admitted (or was known)
    pub fn is_known(&self, url: &str) -> bool {
        canonicalize(url)
            .map(|canonical| self.ledger.contains(&canonical))
            .unwrap_or(false)
    }

    /// Adds fetcher rules; they take effect from the next crawl
    ///
    /// On an invalid pattern, rules before it in `rules` are kept.
    pub fn add_fetcher_rules<I>(&self, rules: I) -> Result<usize>
    where
        I: IntoIterator<Item = FetcherRule>,
    {
        let mut fetchers = self.fetchers.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::make_mut(&mut fetchers).add(rules)?)
    }

    /// Adds parser rules; they take effect from the next crawl
    ///
    /// On an invalid pattern, rules before it in `rules` are kept.
    pub fn add_parser_rules<I>(&self, rules: I) -> Result<usize>
    where
        I: IntoIterator<Item = ParserRule>,
    {
        let mut parsers = self.parsers.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::make_mut(&mut parsers).add(rules)?)
    }

    /// Snapshot of everything the workers of one crawl share
    fn context(&self, cancel: CancellationToken, callback: ResultCallback) -> CrawlContext {
        let fetchers = self
            .fetchers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let parsers = self
            .parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut fetch_options = self.fetch_options.clone();
        fetch_options.cancel = cancel.clone();

        CrawlContext {
            queue: self.queue.clone(),
            ledger: self.ledger.clone(),
            stats: self.stats.clone(),
            cache: self.cache.clone(),
            fetchers,
            parsers,
            follow: self.follow,
            max_urls: self.max_urls,
            request_delay: self.request_delay,
            fetch_options,
            callback,
            cancel,
        }
    }
}

/// How admission behaves when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admit {
    /// Wait for space (seeds)
    Blocking,
    /// Drop the address (discovered links)
    DropWhenFull,
}

#[derive(Debug, Default)]
struct Admission {
    admitted: usize,
    cancelled: bool,
}

struct CrawlContext {
    queue: Arc<WorkQueue>,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    cache: Option<Arc<dyn Cache>>,
    fetchers: Arc<RuleSet<Arc<dyn Fetcher>>>,
    parsers: Arc<RuleSet<Arc<dyn Parser>>>,
    follow: FollowBehavior,
    max_urls: Option<u64>,
    request_delay: Option<Duration>,
    fetch_options: FetchOptions,
    callback: ResultCallback,
    cancel: CancellationToken,
}

impl CrawlContext {
    /// Admits addresses through the ceiling, ledger and queue
    async fn enqueue(&self, mut urls: Vec<String>, admit: Admit) -> Admission {
        let mut admission = Admission::default();

        if let Some(max_urls) = self.max_urls {
            let remaining = max_urls.saturating_sub(self.stats.processed());
            if remaining == 0 {
                tracing::debug!(
                    "URL limit of {} reached, dropping {} URLs",
                    max_urls,
                    urls.len()
                );
                return admission;
            }
            if urls.len() as u64 > remaining {
                urls.truncate(remaining as usize);
            }
        }

        for raw in urls {
            let canonical = match canonicalize(&raw) {
                Ok(canonical) => canonical,
                Err(e) => {
                    tracing::warn!("Skipping invalid URL {}: {}", raw, e);
                    continue;
                }
            };

            if !self.ledger.insert(&canonical) {
                tracing::trace!("Already scheduled: {}", canonical);
                continue;
            }

            match admit {
                Admit::DropWhenFull => {
                    if self.queue.try_push(canonical.clone()) {
                        admission.admitted += 1;
                    } else {
                        tracing::debug!("Queue full, dropping {}", canonical);
                    }
                }
                Admit::Blocking => {
                    if self.queue.push(canonical, &self.cancel).await.is_err() {
                        admission.cancelled = true;
                        return admission;
                    }
                    admission.admitted += 1;
                }
            }
        }

        admission
    }

    /// Runs the pipeline for one dequeued address
    async fn process_url(&self, address: String) {
        self.stats.record_processed();

        let page_url = match Url::parse(&address) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Dropping unparseable URL {}: {}", address, e);
                return;
            }
        };

        let domain = match extract_domain(&page_url) {
            Some(domain) => domain,
            None => {
                tracing::warn!("Dropping URL without a domain: {}", address);
                return;
            }
        };

        let cached = self.cached_response(&address, &page_url);

        let fetcher = match self.fetchers.resolve(&domain) {
            Some(fetcher) => fetcher.clone(),
            None => {
                tracing::warn!("No fetcher for {}, skipping {}", domain, address);
                self.stats.record_failed();
                (self.callback)(CrawlResult::failed(address, SpiderError::NoFetcher { domain }));
                return;
            }
        };

        let response = match cached {
            Some(response) => response,
            None => match fetcher.fetch(&page_url, &self.fetch_options).await {
                Ok(response) => {
                    self.store_response(&address, &response);
                    response
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch {}: {}", address, e);
                    self.stats.record_failed();
                    (self.callback)(CrawlResult::failed(address, e.into()));
                    return;
                }
            },
        };

        let mut parsed = None;
        let mut error = None;
        if let Some(parser) = self.parsers.resolve(&domain) {
            match parser.parse(&response).await {
                Ok(value) => parsed = Some(value),
                Err(mut e) => {
                    tracing::warn!("Failed to parse {}: {}", address, e);
                    parsed = e.partial.take();
                    error = Some(SpiderError::Parse(e));
                }
            }
        }

        let links = discovered_links(&page_url, &response.links);
        let to_follow = self.follow.filter_links(&page_url, &links);

        tracing::debug!(
            "Processed {} ({} links, {} to follow{})",
            address,
            links.len(),
            to_follow.len(),
            if response.from_cache { ", cached" } else { "" }
        );

        (self.callback)(CrawlResult {
            url: address,
            parsed,
            links,
            response: Some(response),
            error,
        });
        self.stats.record_succeeded();

        if !to_follow.is_empty() {
            let admission = self.enqueue(to_follow, Admit::DropWhenFull).await;
            tracing::trace!("Admitted {} discovered URLs", admission.admitted);
        }
    }

    /// Looks the address up under its canonical key, then with the trailing
    /// slash that canonicalization removed
    fn cached_response(&self, address: &str, page_url: &Url) -> Option<Response> {
        let cache = self.cache.as_ref()?;
        let slashed = format!("{}/", address);

        for key in [address, slashed.as_str()] {
            match cache.get(key) {
                Ok(body) => {
                    tracing::debug!("Cache hit for {} (key {})", address, key);
                    return Some(Response::from_cache(page_url.clone(), body));
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    tracing::warn!("Cache lookup failed for {}: {}", key, e);
                    return None;
                }
            }
        }
        None
    }

    fn store_response(&self, address: &str, response: &Response) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if !response.has_content() {
            return;
        }
        if let Err(e) = cache.set(address, &response.body) {
            tracing::warn!("Failed to cache {}: {}", address, e);
        }
    }
}

/// Resolves links against the page into a sorted, duplicate-free list
fn discovered_links(page_url: &Url, raw_links: &[String]) -> Vec<String> {
    raw_links
        .iter()
        .filter_map(|link| resolve_link(page_url, link))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Pulls addresses from the queue until the crawl is cancelled
async fn run_worker(context: Arc<CrawlContext>, id: usize) {
    tracing::trace!("Worker {} started", id);

    loop {
        let address = tokio::select! {
            biased;
            _ = context.cancel.cancelled() => break,
            next = context.queue.pop() => match next {
                Some(address) => address,
                None => break,
            },
        };

        {
            let _work = context.queue.begin_work();
            context.process_url(address).await;
        }

        if let Some(delay) = context.request_delay {
            tokio::select! {
                _ = context.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    tracing::trace!("Worker {} stopped", id);
}
