use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use fleetcrawl_core::config::AppConfig;
use fleetcrawl_core::metrics::{LogSink, MetricsSink};
use fleetcrawl_core::stats::{CrawlStats, StatsSnapshot};
use fleetcrawl_core::Fetcher;
use fleetcrawl_frontier::{Frontier, FrontierLimits, VisitedSet};

use crate::worker::{run_worker, WorkerContext};

/// Final accounting returned when the crawl ends.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub stats: StatsSnapshot,
    pub distinct_urls_seen: usize,
    pub elapsed: Duration,
}

/// Cloneable handle that triggers a graceful shutdown from outside the
/// run loop (signal handlers, tests).
#[derive(Clone)]
pub struct ShutdownHandle(broadcast::Sender<()>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(());
    }
}

/// Owns the crawl lifecycle: seeds in, workers out, shutdown orchestrated.
pub struct Crawler {
    config: AppConfig,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn MetricsSink>,
    frontier: Frontier,
    stats: Arc<CrawlStats>,
    shutdown: broadcast::Sender<()>,
}

impl Crawler {
    pub fn new(config: AppConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_sink(config, fetcher, Arc::new(LogSink))
    }

    pub fn with_sink(
        config: AppConfig,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let visited = if config.dedup.use_bloom {
            let expected = (config.crawl.max_pages as usize)
                .saturating_mul(config.dedup.bloom_inflation)
                .max(1);
            VisitedSet::bloom(expected, config.dedup.bloom_fpr)
        } else {
            VisitedSet::exact()
        };
        let limits = FrontierLimits {
            max_per_host: config.crawl.max_per_host,
            min_interval: Duration::from_millis(config.crawl.min_interval_per_host_ms),
        };
        let (shutdown, _) = broadcast::channel(16);
        Self {
            frontier: Frontier::new(limits, visited),
            stats: Arc::new(CrawlStats::default()),
            config,
            fetcher,
            sink,
            shutdown,
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Seed the frontier and run workers until the budget trips, the
    /// frontier exhausts, or a shutdown is requested. In-flight fetches
    /// past the grace period are abandoned.
    pub async fn run(self, seeds: Vec<Url>) -> anyhow::Result<CrawlSummary> {
        let started = Instant::now();

        let mut seeded = 0usize;
        for seed in seeds {
            if self.frontier.enqueue(seed) {
                seeded += 1;
            }
        }
        info!(
            seeded,
            workers = self.config.crawl.num_workers,
            max_pages = self.config.crawl.max_pages,
            max_per_host = self.config.crawl.max_per_host,
            min_interval_ms = self.config.crawl.min_interval_per_host_ms,
            "crawl starting"
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for worker_id in 0..self.config.crawl.num_workers {
            let ctx = WorkerContext {
                frontier: self.frontier.clone(),
                fetcher: Arc::clone(&self.fetcher),
                stats: Arc::clone(&self.stats),
                sink: Arc::clone(&self.sink),
                max_pages: self.config.crawl.max_pages,
                max_url_length: self.config.crawl.max_url_length,
                shutdown: self.shutdown.clone(),
            };
            handles.push(tokio::spawn(run_worker(worker_id, ctx)));
        }

        let grace = Duration::from_secs(self.config.crawl.shutdown_grace_s);
        let grace_expired = {
            let mut drain = Box::pin(async {
                for handle in handles.iter_mut() {
                    let _ = handle.await;
                }
            });
            tokio::select! {
                _ = &mut drain => false,
                _ = shutdown_rx.recv() => {
                    self.frontier.close();
                    tokio::time::timeout(grace, &mut drain).await.is_err()
                }
            }
        };
        if grace_expired {
            warn!(
                grace_s = grace.as_secs(),
                "grace period expired, abandoning in-flight fetches"
            );
            for handle in &handles {
                handle.abort();
            }
        }
        self.frontier.close();

        let summary = CrawlSummary {
            stats: self.stats.snapshot(),
            distinct_urls_seen: self.frontier.seen(),
            elapsed: started.elapsed(),
        };
        info!(
            fetched_ok = summary.stats.fetched_ok,
            dns_errors = summary.stats.dns_errors,
            net_errors = summary.stats.net_errors,
            http_errors = summary.stats.http_errors,
            cancelled = summary.stats.cancelled,
            rejected_urls = summary.stats.rejected_urls,
            distinct_urls = summary.distinct_urls_seen,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "crawl finished"
        );
        Ok(summary)
    }
}
