use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub fetch: FetchOptions,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    #[serde(default = "default_max_per_host")]
    pub max_per_host: usize,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_per_host_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,
    #[serde(default = "default_shutdown_grace_s")]
    pub shutdown_grace_s: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            max_per_host: default_max_per_host(),
            min_interval_per_host_ms: default_min_interval_ms(),
            max_pages: default_max_pages(),
            max_url_length: default_max_url_length(),
            shutdown_grace_s: default_shutdown_grace_s(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchOptions {
    #[serde(default = "default_request_timeout_s")]
    pub request_timeout_s: u64,
    #[serde(default = "default_connect_timeout_s")]
    pub connect_timeout_s: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request_timeout_s: default_request_timeout_s(),
            connect_timeout_s: default_connect_timeout_s(),
            max_redirects: default_max_redirects(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DnsConfig {
    #[serde(default = "default_use_dns_cache")]
    pub use_dns_cache: bool,
    #[serde(default = "default_dns_negative_ttl_s")]
    pub negative_ttl_s: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            use_dns_cache: default_use_dns_cache(),
            negative_ttl_s: default_dns_negative_ttl_s(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    #[serde(default)]
    pub use_bloom: bool,
    #[serde(default = "default_bloom_fpr")]
    pub bloom_fpr: f64,
    /// Expected discovered-to-fetched URL ratio used to size the bloom filter.
    #[serde(default = "default_bloom_inflation")]
    pub bloom_inflation: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            use_bloom: false,
            bloom_fpr: default_bloom_fpr(),
            bloom_inflation: default_bloom_inflation(),
        }
    }
}

fn default_num_workers() -> usize { 20 }
fn default_max_per_host() -> usize { 10 }
fn default_min_interval_ms() -> u64 { 500 }
fn default_max_pages() -> u64 { 30_000 }
fn default_max_url_length() -> usize { 2048 }
fn default_shutdown_grace_s() -> u64 { 30 }
fn default_request_timeout_s() -> u64 { 10 }
fn default_connect_timeout_s() -> u64 { 10 }
fn default_max_redirects() -> usize { 5 }
fn default_max_body_bytes() -> usize { 5 * 1024 * 1024 }
fn default_user_agent() -> String { "fleetcrawl/0.1".to_string() }
fn default_use_dns_cache() -> bool { true }
fn default_dns_negative_ttl_s() -> u64 { 30 }
fn default_bloom_fpr() -> f64 { 0.01 }
fn default_bloom_inflation() -> usize { 4 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.crawl.num_workers, 20);
        assert_eq!(config.crawl.max_per_host, 10);
        assert_eq!(config.crawl.min_interval_per_host_ms, 500);
        assert_eq!(config.crawl.max_pages, 30_000);
        assert_eq!(config.fetch.max_body_bytes, 5 * 1024 * 1024);
        assert!(config.dns.use_dns_cache);
        assert!(!config.dedup.use_bloom);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: AppConfig = toml::from_str(
            "[crawl]\nnum_workers = 4\n\n[dedup]\nuse_bloom = true\n",
        )
        .unwrap();
        assert_eq!(config.crawl.num_workers, 4);
        assert_eq!(config.crawl.max_per_host, 10);
        assert!(config.dedup.use_bloom);
        assert_eq!(config.dedup.bloom_fpr, 0.01);
    }
}
