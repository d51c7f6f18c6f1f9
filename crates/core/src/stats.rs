use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FetchErrorKind;

/// Shared run counters. Incremented by workers, read by the budget check
/// and the final summary; approximate reads are fine for both.
#[derive(Debug, Default)]
pub struct CrawlStats {
    fetched_ok: AtomicU64,
    dns_errors: AtomicU64,
    net_errors: AtomicU64,
    http_errors: AtomicU64,
    cancelled: AtomicU64,
    rejected_urls: AtomicU64,
}

impl CrawlStats {
    /// Returns the counter value after the increment.
    pub fn record_fetch_ok(&self) -> u64 {
        self.fetched_ok.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_fetch_error(&self, kind: FetchErrorKind) {
        let counter = match kind {
            FetchErrorKind::Dns => &self.dns_errors,
            FetchErrorKind::Net => &self.net_errors,
            FetchErrorKind::Http => &self.http_errors,
            FetchErrorKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_urls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fetched_ok(&self) -> u64 {
        self.fetched_ok.load(Ordering::Relaxed)
    }

    pub fn fetch_errors(&self) -> u64 {
        self.dns_errors.load(Ordering::Relaxed)
            + self.net_errors.load(Ordering::Relaxed)
            + self.http_errors.load(Ordering::Relaxed)
            + self.cancelled.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fetched_ok: self.fetched_ok.load(Ordering::Relaxed),
            dns_errors: self.dns_errors.load(Ordering::Relaxed),
            net_errors: self.net_errors.load(Ordering::Relaxed),
            http_errors: self.http_errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected_urls: self.rejected_urls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub fetched_ok: u64,
    pub dns_errors: u64,
    pub net_errors: u64,
    pub http_errors: u64,
    pub cancelled: u64,
    pub rejected_urls: u64,
}

impl StatsSnapshot {
    pub fn fetch_errors(&self) -> u64 {
        self.dns_errors + self.net_errors + self.http_errors + self.cancelled
    }
}
