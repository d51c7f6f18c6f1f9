use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Resolution failure shared by every waiter coalesced onto one lookup.
#[derive(Debug, Clone, thiserror::Error)]
#[error("dns resolution failed for {host}: {message}")]
pub struct DnsError {
    pub host: String,
    pub message: String,
}

type ResolveResult = Result<Vec<SocketAddr>, DnsError>;

/// Backend performing an actual lookup on cache miss. A trait so tests
/// can count and script resolutions.
#[async_trait]
pub trait Lookup: Send + Sync + 'static {
    async fn lookup(&self, host: &str) -> io::Result<Vec<SocketAddr>>;
}

/// System resolver via the runtime's blocking pool.
pub struct SystemLookup;

#[async_trait]
impl Lookup for SystemLookup {
    async fn lookup(&self, host: &str) -> io::Result<Vec<SocketAddr>> {
        let addrs = tokio::net::lookup_host((host, 0u16)).await?;
        Ok(addrs.collect())
    }
}

enum CacheEntry {
    Resolved(Vec<SocketAddr>),
    Failed { error: DnsError, at: Instant },
}

/// Host-to-address cache. Concurrent misses for the same host coalesce
/// onto a single backend lookup; every waiter gets the shared result.
/// Successes are cached for the whole run, failures for `negative_ttl`.
pub struct DnsCache {
    entries: DashMap<String, CacheEntry>,
    in_flight: DashMap<String, Arc<OnceCell<ResolveResult>>>,
    backend: Arc<dyn Lookup>,
    negative_ttl: Duration,
}

impl DnsCache {
    pub fn new(backend: Arc<dyn Lookup>, negative_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            backend,
            negative_ttl,
        }
    }

    pub fn with_system_resolver(negative_ttl: Duration) -> Self {
        Self::new(Arc::new(SystemLookup), negative_ttl)
    }

    pub async fn resolve(&self, host: &str) -> ResolveResult {
        if let Some(hit) = self.cached(host) {
            return hit;
        }
        let cell = self
            .in_flight
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let result = cell
            .get_or_init(|| async {
                let result = match self.backend.lookup(host).await {
                    Ok(addrs) if !addrs.is_empty() => Ok(addrs),
                    Ok(_) => Err(DnsError {
                        host: host.to_string(),
                        message: "no addresses returned".to_string(),
                    }),
                    Err(e) => Err(DnsError {
                        host: host.to_string(),
                        message: e.to_string(),
                    }),
                };
                match &result {
                    Ok(addrs) => debug!(%host, count = addrs.len(), "host resolved"),
                    Err(e) => warn!(%host, error = %e, "resolution failed"),
                }
                self.store(host, &result);
                result
            })
            .await
            .clone();
        self.in_flight.remove(host);
        result
    }

    fn cached(&self, host: &str) -> Option<ResolveResult> {
        let expired = {
            let entry = self.entries.get(host)?;
            match entry.value() {
                CacheEntry::Resolved(addrs) => return Some(Ok(addrs.clone())),
                CacheEntry::Failed { error, at } => {
                    if at.elapsed() < self.negative_ttl {
                        return Some(Err(error.clone()));
                    }
                    true
                }
            }
        };
        if expired {
            self.entries.remove(host);
        }
        None
    }

    fn store(&self, host: &str, result: &ResolveResult) {
        let entry = match result {
            Ok(addrs) => CacheEntry::Resolved(addrs.clone()),
            Err(error) => CacheEntry::Failed {
                error: error.clone(),
                at: Instant::now(),
            },
        };
        self.entries.insert(host.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Adapter plugging the cache into reqwest's connector, so every fetch
/// resolves through it instead of hitting the OS directly.
pub struct CachingResolver(pub Arc<DnsCache>);

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let cache = Arc::clone(&self.0);
        Box::pin(async move {
            let addrs = cache.resolve(name.as_str()).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingLookup {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Lookup for CountingLookup {
        async fn lookup(&self, _host: &str) -> io::Result<Vec<SocketAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                Err(io::Error::new(io::ErrorKind::NotFound, "nxdomain"))
            } else {
                Ok(vec![SocketAddr::new(
                    IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
                    0,
                )])
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_misses_coalesce_to_one_lookup() {
        let backend = CountingLookup::new(false);
        let cache = Arc::new(DnsCache::new(backend.clone(), Duration::from_secs(30)));

        let mut tasks = Vec::new();
        for _ in 0..50 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(
                async move { cache.resolve("h.example").await },
            ));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn hit_returns_without_lookup() {
        let backend = CountingLookup::new(false);
        let cache = DnsCache::new(backend.clone(), Duration::from_secs(30));

        assert!(cache.resolve("h.example").await.is_ok());
        assert!(cache.resolve("h.example").await.is_ok());
        assert!(cache.resolve("h.example").await.is_ok());
        assert_eq!(backend.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn negative_result_cached_until_ttl() {
        let backend = CountingLookup::new(true);
        let cache = DnsCache::new(backend.clone(), Duration::from_millis(50));

        assert!(cache.resolve("down.example").await.is_err());
        assert!(cache.resolve("down.example").await.is_err());
        assert_eq!(backend.calls(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.resolve("down.example").await.is_err());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn distinct_hosts_resolve_independently() {
        let backend = CountingLookup::new(false);
        let cache = DnsCache::new(backend.clone(), Duration::from_secs(30));

        assert!(cache.resolve("a.example").await.is_ok());
        assert!(cache.resolve("b.example").await.is_ok());
        assert_eq!(backend.calls(), 2);
        assert_eq!(cache.len(), 2);
    }
}
