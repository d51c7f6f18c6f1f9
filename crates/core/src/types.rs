use async_trait::async_trait;
use url::Url;

use crate::error::CrawlError;

/// Anything that can perform a single HTTP GET. The production
/// implementation talks to the network; benchmarks and tests substitute
/// a simulated one.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, CrawlError>;
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// URL the fetch was issued for.
    pub url: Url,
    /// URL after following redirects. Discovered links resolve against this.
    pub final_url: Url,
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub fetched_at: chrono::DateTime<chrono::Utc>,
    pub response_time_ms: u64,
}
