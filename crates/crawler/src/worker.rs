use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use fleetcrawl_core::metrics::{MetricsEvent, MetricsSink};
use fleetcrawl_core::normalize::normalize;
use fleetcrawl_core::stats::CrawlStats;
use fleetcrawl_core::{CrawlError, Fetcher};
use fleetcrawl_frontier::{Frontier, Outcome};

#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub frontier: Frontier,
    pub fetcher: Arc<dyn Fetcher>,
    pub stats: Arc<CrawlStats>,
    pub sink: Arc<dyn MetricsSink>,
    pub max_pages: u64,
    pub max_url_length: usize,
    pub shutdown: broadcast::Sender<()>,
}

/// One fetch/parse/enqueue loop. Exits when the frontier reports itself
/// drained, when the page budget trips, or on the shutdown broadcast.
pub(crate) async fn run_worker(worker_id: usize, ctx: WorkerContext) {
    let mut shutdown = ctx.shutdown.subscribe();
    debug!(worker_id, "worker started");
    loop {
        if ctx.stats.fetched_ok() >= ctx.max_pages {
            info!(worker_id, "page budget reached");
            let _ = ctx.shutdown.send(());
            break;
        }

        let leased = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            leased = ctx.frontier.next() => leased,
        };
        let Some((url, lease)) = leased else {
            break;
        };
        // The budget may have tripped while we waited for admission.
        if ctx.stats.fetched_ok() >= ctx.max_pages {
            lease.release(Outcome::Cancelled);
            let _ = ctx.shutdown.send(());
            break;
        }

        let result = tokio::select! {
            biased;
            _ = shutdown.recv() => Err(CrawlError::Cancelled),
            result = ctx.fetcher.fetch(&url) => result,
        };

        match result {
            Ok(resp) => {
                let fetched = ctx.stats.record_fetch_ok();
                ctx.sink.record(MetricsEvent::PageFetched {
                    host: lease.host().to_string(),
                    bytes: resp.body.len(),
                    elapsed_ms: resp.response_time_ms,
                });

                let links = fleetcrawl_parser::extract_links(
                    &resp.final_url,
                    &resp.body,
                    resp.content_type.as_deref(),
                );
                let mut enqueued = 0usize;
                for raw in &links {
                    match normalize(&resp.final_url, raw, ctx.max_url_length) {
                        Some(next_url) => {
                            if ctx.frontier.enqueue(next_url) {
                                enqueued += 1;
                            }
                        }
                        None => {
                            ctx.stats.record_rejected();
                            ctx.sink.record(MetricsEvent::UrlRejected);
                        }
                    }
                }
                debug!(
                    worker_id,
                    url = %url,
                    fetched,
                    links = links.len(),
                    enqueued,
                    "page processed"
                );
                ctx.sink.record(MetricsEvent::FrontierDepth {
                    queued: ctx.frontier.queued(),
                    in_flight: ctx.frontier.in_flight(),
                });
                lease.release(Outcome::Success);

                if fetched >= ctx.max_pages {
                    info!(worker_id, fetched, "page budget reached");
                    let _ = ctx.shutdown.send(());
                    break;
                }
            }
            Err(err) => {
                let kind = err.kind();
                ctx.stats.record_fetch_error(kind);
                ctx.sink.record(MetricsEvent::FetchError {
                    host: lease.host().to_string(),
                    kind,
                });
                let cancelled = matches!(err, CrawlError::Cancelled);
                if cancelled {
                    debug!(worker_id, url = %url, "fetch cancelled");
                    lease.release(Outcome::Cancelled);
                    break;
                }
                warn!(worker_id, url = %url, error = %err, "fetch failed");
                lease.release(Outcome::Error);
            }
        }
    }
    debug!(worker_id, "worker exited");
}
