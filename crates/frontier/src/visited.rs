use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use dashmap::DashSet;
use growable_bloom_filter::GrowableBloom;

/// Dedup oracle over normalized URL strings.
///
/// The exact variant never lies. The bloom variant may claim an unseen URL
/// was seen (bounded false-positive rate, costing that one URL) but never
/// the reverse, so a URL can never be fetched twice in either mode.
pub enum VisitedSet {
    Exact(DashSet<String>),
    Bloom {
        filter: Mutex<GrowableBloom>,
        count: AtomicUsize,
    },
}

impl VisitedSet {
    pub fn exact() -> Self {
        Self::Exact(DashSet::new())
    }

    pub fn bloom(expected_items: usize, false_positive_rate: f64) -> Self {
        Self::Bloom {
            filter: Mutex::new(GrowableBloom::new(false_positive_rate, expected_items.max(1))),
            count: AtomicUsize::new(0),
        }
    }

    /// Test-and-insert in one step. True iff the URL had never been marked.
    /// This is the only mutation, which is what keeps enqueue race-free.
    pub fn add_if_absent(&self, url: &str) -> bool {
        match self {
            Self::Exact(set) => set.insert(url.to_string()),
            Self::Bloom { filter, count } => {
                let mut filter = filter.lock().unwrap();
                if filter.contains(url) {
                    return false;
                }
                filter.insert(url);
                count.fetch_add(1, Ordering::Relaxed);
                true
            }
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        match self {
            Self::Exact(set) => set.contains(url),
            Self::Bloom { filter, .. } => filter.lock().unwrap().contains(url),
        }
    }

    /// Best-effort count of distinct URLs ever marked.
    pub fn len(&self) -> usize {
        match self {
            Self::Exact(set) => set.len(),
            Self::Bloom { count, .. } => count.load(Ordering::Relaxed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_add_if_absent_is_once_only() {
        let visited = VisitedSet::exact();
        assert!(visited.add_if_absent("http://a/x"));
        assert!(!visited.add_if_absent("http://a/x"));
        assert!(visited.contains("http://a/x"));
        assert!(!visited.contains("http://a/y"));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn bloom_never_forgets() {
        let visited = VisitedSet::bloom(1000, 0.01);
        let mut inserted = 0;
        for i in 0..500 {
            if visited.add_if_absent(&format!("http://a/{i}")) {
                inserted += 1;
            }
        }
        // False positives may eat a few inserts, never the other way round.
        assert!(inserted >= 450, "inserted only {inserted} of 500");
        for i in 0..500 {
            assert!(visited.contains(&format!("http://a/{i}")));
            assert!(!visited.add_if_absent(&format!("http://a/{i}")));
        }
        assert_eq!(visited.len(), inserted);
    }
}
