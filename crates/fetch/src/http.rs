use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use fleetcrawl_core::config::FetchOptions;
use fleetcrawl_core::{CrawlError, FetchResponse, Fetcher};

use crate::dns::{CachingResolver, DnsCache, DnsError};

/// HTTP GET fetcher over a shared reqwest connection pool. Redirects,
/// timeouts and the idle-per-host pool size come from configuration so
/// the transport agrees with frontier admission.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
    request_timeout: Duration,
}

impl HttpFetcher {
    /// `dns` carries the shared resolution cache; pass None to fall back
    /// to raw per-call OS lookups.
    pub fn new(
        options: &FetchOptions,
        max_per_host: usize,
        dns: Option<Arc<DnsCache>>,
    ) -> Result<Self, CrawlError> {
        let request_timeout = Duration::from_secs(options.request_timeout_s);
        let mut builder = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .connect_timeout(Duration::from_secs(options.connect_timeout_s))
            .timeout(request_timeout)
            .pool_max_idle_per_host(max_per_host);
        if let Some(dns) = dns {
            builder = builder.dns_resolver(Arc::new(CachingResolver(dns)));
        }
        let client = builder
            .build()
            .map_err(|e| CrawlError::Config(e.to_string()))?;
        Ok(Self {
            client,
            max_body_bytes: options.max_body_bytes,
            request_timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> CrawlError {
        if is_dns_failure(&err) {
            return CrawlError::Dns(err.to_string());
        }
        if err.is_timeout() {
            return CrawlError::Timeout(self.request_timeout.as_secs());
        }
        CrawlError::Network(err.to_string())
    }
}

/// A resolution failure surfaces buried in reqwest's connect error chain.
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.downcast_ref::<DnsError>().is_some() {
            return true;
        }
        source = cause.source();
    }
    false
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, CrawlError> {
        let start = Instant::now();
        debug!(%url, "fetching");

        let resp = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status().as_u16();
        let final_url = Url::parse(resp.url().as_str()).unwrap_or_else(|_| url.clone());
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !resp.status().is_success() {
            warn!(%url, status, "http error");
            return Err(CrawlError::HttpStatus(status));
        }

        if let Some(length) = resp.content_length() {
            if length as usize > self.max_body_bytes {
                return Err(CrawlError::BodyTooLarge {
                    size: length as usize,
                    max: self.max_body_bytes,
                });
            }
        }

        // The Content-Length header can lie or be absent; enforce the cap
        // on the stream as well.
        let mut resp = resp;
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(CrawlError::BodyTooLarge {
                    size: body.len() + chunk.len(),
                    max: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            url: url.clone(),
            final_url,
            status,
            body,
            content_type,
            fetched_at: chrono::Utc::now(),
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
