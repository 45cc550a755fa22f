//! Sumi-Spider main entry point
//!
//! This is the command-line interface for the Sumi-Spider site crawler.

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use sumi_spider::config::{load_config_with_hash, Config};
use sumi_spider::output::print_statistics;
use sumi_spider::{CrawlResult, Crawler};
use tracing_subscriber::EnvFilter;

/// Sumi-Spider: a concurrent, rule-driven site crawler
///
/// Sumi-Spider crawls from seed URLs, dispatching each page to the fetcher and
/// parser whose domain rule matches, and prints one JSON line per page.
#[derive(Parser, Debug)]
#[command(name = "sumi-spider")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent, rule-driven site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Extra seed URLs, crawled after those in the configuration
    #[arg(value_name = "SEEDS")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let mut seeds = config.seeds.clone();
    seeds.extend(cli.seeds.iter().cloned());

    if cli.dry_run {
        handle_dry_run(&config, &seeds);
        return Ok(());
    }

    if seeds.is_empty() {
        bail!("No seed URLs given in the configuration or on the command line");
    }

    handle_crawl(&config, seeds).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_spider=info,warn"),
            1 => EnvFilter::new("sumi_spider=debug,info"),
            2 => EnvFilter::new("sumi_spider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Results go to stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config, seeds: &[String]) {
    println!("=== Sumi-Spider Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", config.crawler.workers);
    println!("  Queue size: {}", config.crawler.queue_size);
    println!("  Request delay: {}ms", config.crawler.request_delay);
    match config.crawler.max_urls {
        Some(max) => println!("  Max URLs: {}", max),
        None => println!("  Max URLs: unlimited"),
    }
    println!("  Follow: {}", config.crawler.follow);
    println!("  Known URLs: {}", config.crawler.known_urls.len());

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.user_agent_string());

    println!("\nCache:");
    match &config.cache {
        Some(cache) => println!("  Database: {}", cache.database_path),
        None => println!("  Disabled"),
    }

    println!("\nFetcher Rules ({}):", config.fetcher_rules.len());
    for rule in &config.fetcher_rules {
        println!("  - {} ({}, priority {})", rule.pattern, rule.mode, rule.priority);
    }

    println!("\nParser Rules ({}):", config.parser_rules.len());
    for rule in &config.parser_rules {
        println!(
            "  - {} ({}, priority {}, {} fields)",
            rule.pattern,
            rule.mode,
            rule.priority,
            rule.selectors.fields.len()
        );
    }
    if let Some(parser) = &config.parser {
        println!("  Default parser: {} fields", parser.fields.len());
    }

    println!("\nSeeds ({}):", seeds.len());
    for seed in seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, seeds: Vec<String>) -> anyhow::Result<()> {
    let crawler = Arc::new(Crawler::from_config(config).context("Failed to build crawler")?);

    let interrupt = crawler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping crawl");
            interrupt.stop();
        }
    });

    tracing::info!("Total seed URLs: {}", seeds.len());

    crawler
        .crawl(seeds, print_result)
        .await
        .context("Crawl failed")?;

    print_statistics(&crawler.stats().snapshot());
    Ok(())
}

/// Prints one result as a JSON line on stdout
fn print_result(result: CrawlResult) {
    let response = result.response.as_ref();
    let line = json!({
        "url": result.url,
        "ok": result.is_ok(),
        "status": response.and_then(|r| r.status),
        "from_cache": response.map(|r| r.from_cache).unwrap_or(false),
        "parsed": result.parsed,
        "links": result.links,
        "error": result.error.as_ref().map(|e| e.to_string()),
    });
    println!("{}", line);
}
