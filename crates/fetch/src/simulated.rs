use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use url::Url;

use fleetcrawl_core::{CrawlError, FetchResponse, Fetcher};

/// Shape of the synthetic link graph served by [`SimulatedFetcher`].
///
/// Pages live at `http://{host}/page/{n}` for `n < pages_per_host`. Page
/// `n` links to pages `n*links_per_page + 1 ..= n*links_per_page +
/// links_per_page` on the same host (a chain when `links_per_page == 1`),
/// plus its counterpart on `cross_host_links` sibling hosts.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub hosts: Vec<String>,
    pub pages_per_host: usize,
    pub links_per_page: usize,
    pub cross_host_links: usize,
    pub latency: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            hosts: vec!["sim.example".to_string()],
            pages_per_host: 100,
            links_per_page: 10,
            cross_host_links: 0,
            latency: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub url: Url,
    pub host: String,
    pub started_at: Instant,
}

#[derive(Default)]
struct Gauges {
    active: HashMap<String, usize>,
    max_active: HashMap<String, usize>,
}

/// Stand-in for the network: serves the configured graph after an
/// artificial delay and records every fetch start, so politeness and
/// dedup invariants are observable from tests and benchmarks.
pub struct SimulatedFetcher {
    options: SimOptions,
    records: Mutex<Vec<FetchRecord>>,
    gauges: Mutex<Gauges>,
}

impl SimulatedFetcher {
    pub fn new(options: SimOptions) -> Self {
        Self {
            options,
            records: Mutex::new(Vec::new()),
            gauges: Mutex::new(Gauges::default()),
        }
    }

    pub fn records(&self) -> Vec<FetchRecord> {
        self.records.lock().unwrap().clone()
    }

    /// How many times the exact URL was fetched.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.as_str() == url)
            .count()
    }

    /// Fetch-start instants for one host, in start order.
    pub fn starts_for_host(&self, host: &str) -> Vec<Instant> {
        let mut starts: Vec<Instant> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.host == host)
            .map(|r| r.started_at)
            .collect();
        starts.sort();
        starts
    }

    /// Highest number of simultaneously active fetches observed per host.
    pub fn max_concurrent(&self, host: &str) -> usize {
        self.gauges
            .lock()
            .unwrap()
            .max_active
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    fn page_body(&self, host_idx: usize, page: usize) -> String {
        let opts = &self.options;
        let mut body = String::from("<html><body>\n");
        for child in page * opts.links_per_page + 1..=(page + 1) * opts.links_per_page {
            if child < opts.pages_per_host {
                body.push_str(&format!("<a href=\"/page/{child}\">p{child}</a>\n"));
            }
        }
        if opts.hosts.len() > 1 {
            for j in 1..=opts.cross_host_links.min(opts.hosts.len() - 1) {
                let sibling = &opts.hosts[(host_idx + j) % opts.hosts.len()];
                body.push_str(&format!(
                    "<a href=\"http://{sibling}/page/{page}\">{sibling}</a>\n"
                ));
            }
        }
        body.push_str("</body></html>\n");
        body
    }
}

/// Drops the per-host active gauge even if the fetch future is cancelled.
struct ActiveGuard<'a> {
    fetcher: &'a SimulatedFetcher,
    host: String,
}

impl<'a> ActiveGuard<'a> {
    fn enter(fetcher: &'a SimulatedFetcher, host: &str) -> Self {
        let mut gauges = fetcher.gauges.lock().unwrap();
        let active = gauges.active.entry(host.to_string()).or_default();
        *active += 1;
        let active = *active;
        let max = gauges.max_active.entry(host.to_string()).or_default();
        *max = (*max).max(active);
        Self {
            fetcher,
            host: host.to_string(),
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut gauges) = self.fetcher.gauges.lock() {
            if let Some(active) = gauges.active.get_mut(&self.host) {
                *active = active.saturating_sub(1);
            }
        }
    }
}

#[async_trait]
impl Fetcher for SimulatedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, CrawlError> {
        let started = Instant::now();
        let Some(host) = url.host_str().map(str::to_owned) else {
            return Err(CrawlError::InvalidUrl(url.to_string()));
        };
        let Some(host_idx) = self.options.hosts.iter().position(|h| *h == host) else {
            return Err(CrawlError::Dns(format!("unknown host {host}")));
        };

        self.records.lock().unwrap().push(FetchRecord {
            url: url.clone(),
            host: host.clone(),
            started_at: started,
        });
        let _guard = ActiveGuard::enter(self, &host);

        tokio::time::sleep(self.options.latency).await;

        let page = url
            .path()
            .strip_prefix("/page/")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n < self.options.pages_per_host);
        let Some(page) = page else {
            return Err(CrawlError::HttpStatus(404));
        };

        let body = self.page_body(host_idx, page);
        Ok(FetchResponse {
            url: url.clone(),
            final_url: url.clone(),
            status: 200,
            body: body.into_bytes(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            fetched_at: chrono::Utc::now(),
            response_time_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(opts: SimOptions) -> SimulatedFetcher {
        SimulatedFetcher::new(opts)
    }

    #[tokio::test]
    async fn serves_chain_when_one_link_per_page() {
        let sim = fetcher(SimOptions {
            hosts: vec!["a.example".into()],
            pages_per_host: 3,
            links_per_page: 1,
            latency: Duration::ZERO,
            ..SimOptions::default()
        });
        let resp = sim
            .fetch(&Url::parse("http://a.example/page/0").unwrap())
            .await
            .unwrap();
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("href=\"/page/1\""));
        assert!(!body.contains("/page/2"));
    }

    #[tokio::test]
    async fn unknown_pages_are_404() {
        let sim = fetcher(SimOptions {
            hosts: vec!["a.example".into()],
            pages_per_host: 3,
            latency: Duration::ZERO,
            ..SimOptions::default()
        });
        let err = sim
            .fetch(&Url::parse("http://a.example/page/99").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn unknown_hosts_fail_as_dns() {
        let sim = fetcher(SimOptions::default());
        let err = sim
            .fetch(&Url::parse("http://nowhere.example/page/0").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::Dns(_)));
    }

    #[tokio::test]
    async fn cross_host_links_point_at_siblings() {
        let sim = fetcher(SimOptions {
            hosts: vec!["a.example".into(), "b.example".into()],
            pages_per_host: 5,
            links_per_page: 1,
            cross_host_links: 1,
            latency: Duration::ZERO,
        });
        let resp = sim
            .fetch(&Url::parse("http://a.example/page/2").unwrap())
            .await
            .unwrap();
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("http://b.example/page/2"));
    }
}
