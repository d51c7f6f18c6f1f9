mod cli;
mod seeds;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

// glibc malloc does not return memory to the OS under high fetch fan-out
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use fleetcrawl_core::config::AppConfig;
use fleetcrawl_core::normalize::normalize;
use fleetcrawl_crawler::Crawler;
use fleetcrawl_fetch::{DnsCache, HttpFetcher};

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;

    if let Ok(v) = std::env::var("FLEETCRAWL_WORKERS") {
        if let Ok(n) = v.parse::<usize>() {
            if n > 0 {
                config.crawl.num_workers = n;
            }
        }
    }
    if let Ok(v) = std::env::var("FLEETCRAWL_MAX_PAGES") {
        if let Ok(n) = v.parse::<u64>() {
            config.crawl.max_pages = n;
        }
    }

    match cli.command {
        Commands::Crawl {
            seeds,
            seed,
            max_pages,
            workers,
        } => {
            if let Some(n) = max_pages {
                config.crawl.max_pages = n;
            }
            if let Some(n) = workers {
                config.crawl.num_workers = n;
            }
            run_crawl(config, seeds, seed).await?;
        }
    }

    Ok(())
}

async fn run_crawl(config: AppConfig, seeds: Option<String>, seed: Option<String>) -> Result<()> {
    let seed_urls = parse_seeds(seeds::collect_seeds(seeds, seed)?, config.crawl.max_url_length);
    if seed_urls.is_empty() {
        anyhow::bail!("no valid seed URLs");
    }
    info!(count = seed_urls.len(), "seeds loaded");

    let dns = config.dns.use_dns_cache.then(|| {
        Arc::new(DnsCache::with_system_resolver(Duration::from_secs(
            config.dns.negative_ttl_s,
        )))
    });
    let fetcher = Arc::new(HttpFetcher::new(
        &config.fetch,
        config.crawl.max_per_host,
        dns,
    )?);

    let crawler = Crawler::new(config, fetcher);
    let shutdown = crawler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    let summary = crawler.run(seed_urls).await?;
    info!(
        pages = summary.stats.fetched_ok,
        errors = summary.stats.dns_errors
            + summary.stats.net_errors
            + summary.stats.http_errors
            + summary.stats.cancelled,
        elapsed_s = summary.elapsed.as_secs(),
        "done"
    );
    Ok(())
}

/// Seeds go through the same normalization as discovered links so dedup
/// keys line up.
fn parse_seeds(raw: Vec<String>, max_url_length: usize) -> Vec<Url> {
    raw.iter()
        .filter_map(|s| match Url::parse(s) {
            Ok(parsed) => match normalize(&parsed, s, max_url_length) {
                Some(url) => Some(url),
                None => {
                    warn!(seed = %s, "seed rejected by normalizer");
                    None
                }
            },
            Err(e) => {
                warn!(seed = %s, error = %e, "invalid seed URL");
                None
            }
        })
        .collect()
}
