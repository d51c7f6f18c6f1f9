//! Per-host queueing and admission control.
//!
//! URLs enter through [`Frontier::enqueue`], which dedups against the
//! [`VisitedSet`] and appends to the owning host's FIFO queue. Workers pull
//! through [`Frontier::next`], which hands out one admissible URL at a time
//! together with a [`Lease`] on the host's concurrency slot. A host is
//! admissible when it has fewer than `max_per_host` fetches in flight and
//! its inter-request interval has elapsed.

mod visited;

pub use visited::VisitedSet;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, trace};
use url::Url;

/// Admission limits applied uniformly to every host.
#[derive(Debug, Clone)]
pub struct FrontierLimits {
    pub max_per_host: usize,
    pub min_interval: Duration,
}

impl Default for FrontierLimits {
    fn default() -> Self {
        Self {
            max_per_host: 10,
            min_interval: Duration::from_millis(500),
        }
    }
}

/// How a leased fetch ended. Only affects logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
    Cancelled,
}

struct HostState {
    queue: VecDeque<Url>,
    in_flight: usize,
    next_earliest: Instant,
    /// True while the host sits in the ready or delayed set.
    scheduled: bool,
}

impl HostState {
    fn new(now: Instant) -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: 0,
            next_earliest: now,
            scheduled: false,
        }
    }
}

/// Host bookkeeping behind the frontier lock. Hosts move between `ready`
/// (may dispatch now) and `delayed` (waiting out the interval); a host is
/// in at most one of the two, tracked by `HostState::scheduled`.
struct Scheduler {
    hosts: HashMap<String, HostState>,
    ready: VecDeque<String>,
    delayed: BinaryHeap<Reverse<(Instant, String)>>,
    total_queued: usize,
    total_in_flight: usize,
}

impl Scheduler {
    fn new() -> Self {
        Self {
            hosts: HashMap::new(),
            ready: VecDeque::new(),
            delayed: BinaryHeap::new(),
            total_queued: 0,
            total_in_flight: 0,
        }
    }

    fn push_url(&mut self, host: &str, url: Url, limits: &FrontierLimits, now: Instant) {
        let state = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| HostState::new(now));
        state.queue.push_back(url);
        self.total_queued += 1;
        self.maybe_schedule(host, limits, now);
    }

    /// Put a host into ready or delayed if it could dispatch and is not
    /// already tracked.
    fn maybe_schedule(&mut self, host: &str, limits: &FrontierLimits, now: Instant) {
        let Some(state) = self.hosts.get_mut(host) else {
            return;
        };
        if state.scheduled || state.queue.is_empty() || state.in_flight >= limits.max_per_host {
            return;
        }
        state.scheduled = true;
        let next_earliest = state.next_earliest;
        if next_earliest <= now {
            self.ready.push_back(host.to_string());
        } else {
            self.delayed.push(Reverse((next_earliest, host.to_string())));
        }
    }

    /// Move every host whose interval has elapsed from delayed to ready.
    fn promote_due(&mut self, now: Instant) {
        while let Some(Reverse((deadline, _))) = self.delayed.peek() {
            if *deadline > now {
                break;
            }
            let Some(Reverse((_, host))) = self.delayed.pop() else {
                break;
            };
            let Some(state) = self.hosts.get_mut(&host) else {
                continue;
            };
            // A release may have pushed the window forward while the entry
            // sat in the heap.
            if state.next_earliest > now {
                let deadline = state.next_earliest;
                self.delayed.push(Reverse((deadline, host)));
                continue;
            }
            self.ready.push_back(host);
        }
    }

    fn dispatch(&mut self, limits: &FrontierLimits, now: Instant) -> Option<(Url, String)> {
        while let Some(host) = self.ready.pop_front() {
            let Some(state) = self.hosts.get_mut(&host) else {
                continue;
            };
            state.scheduled = false;
            if state.queue.is_empty() || state.in_flight >= limits.max_per_host {
                continue;
            }
            if state.next_earliest > now {
                state.scheduled = true;
                let deadline = state.next_earliest;
                self.delayed.push(Reverse((deadline, host)));
                continue;
            }
            let Some(url) = state.queue.pop_front() else {
                continue;
            };
            state.in_flight += 1;
            // Advancing the window here spaces fetch *starts*, even when
            // the concurrency cap lets several run at once.
            state.next_earliest = now + limits.min_interval;
            self.total_queued -= 1;
            self.total_in_flight += 1;
            self.maybe_schedule(&host, limits, now);
            return Some((url, host));
        }
        None
    }

    fn release_host(&mut self, host: &str, limits: &FrontierLimits, now: Instant) {
        let Some(state) = self.hosts.get_mut(host) else {
            return;
        };
        state.in_flight = state.in_flight.saturating_sub(1);
        state.next_earliest = now + limits.min_interval;
        self.total_in_flight = self.total_in_flight.saturating_sub(1);
        self.maybe_schedule(host, limits, now);
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.delayed.peek().map(|Reverse((deadline, _))| *deadline)
    }
}

struct Inner {
    state: Mutex<Scheduler>,
    visited: VisitedSet,
    limits: FrontierLimits,
    closed: AtomicBool,
    wake: watch::Sender<()>,
}

/// Shared handle to the crawl frontier. Clones are cheap and refer to the
/// same underlying state.
#[derive(Clone)]
pub struct Frontier {
    inner: Arc<Inner>,
}

impl Frontier {
    pub fn new(limits: FrontierLimits, visited: VisitedSet) -> Self {
        let (wake, _) = watch::channel(());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Scheduler::new()),
                visited,
                limits,
                closed: AtomicBool::new(false),
                wake,
            }),
        }
    }

    /// Queue a URL unless it was ever seen before or the frontier is
    /// closed. Returns true iff the URL was admitted to a host queue.
    /// Never blocks beyond the insertion itself.
    pub fn enqueue(&self, url: Url) -> bool {
        if self.inner.closed.load(Ordering::SeqCst) {
            return false;
        }
        let Some(host) = url.host_str().map(str::to_owned) else {
            return false;
        };
        if !self.inner.visited.add_if_absent(url.as_str()) {
            return false;
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            state.push_url(&host, url, &self.inner.limits, Instant::now());
        }
        self.inner.wake.send_replace(());
        true
    }

    /// Hand out the next admissible URL, waiting for admission windows,
    /// new enqueues, or released leases as needed. Returns None once no
    /// URL can ever be produced again: every queue is empty and no lease
    /// is outstanding (which also closes the frontier), or close() was
    /// called and the remaining queues have drained.
    ///
    /// Callers must seed the frontier before the first `next`, otherwise
    /// the empty frontier reads as an exhausted crawl.
    pub async fn next(&self) -> Option<(Url, Lease)> {
        loop {
            let mut rx = self.inner.wake.subscribe();
            let deadline = {
                let mut state = self.inner.state.lock().unwrap();
                let now = Instant::now();
                state.promote_due(now);
                if let Some((url, host)) = state.dispatch(&self.inner.limits, now) {
                    trace!(%url, %host, "url leased");
                    return Some((url, Lease::new(Arc::clone(&self.inner), host)));
                }
                if state.total_queued == 0 && state.total_in_flight == 0 {
                    // Nothing queued and nothing leased: only lease holders
                    // can enqueue, so the crawl is exhausted.
                    drop(state);
                    if !self.inner.closed.swap(true, Ordering::SeqCst) {
                        debug!("frontier exhausted");
                    }
                    self.inner.wake.send_replace(());
                    return None;
                }
                state.next_deadline()
            };
            match deadline {
                Some(when) => {
                    tokio::select! {
                        _ = rx.changed() => {}
                        _ = tokio::time::sleep_until(when.into()) => {}
                    }
                }
                None => {
                    let _ = rx.changed().await;
                }
            }
        }
    }

    /// Stop admitting new URLs. Queued URLs may still be drained by
    /// `next` callers; waiters are woken so shutdown is prompt.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("frontier closed");
        }
        self.inner.wake.send_replace(());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.inner.state.lock().unwrap().total_queued
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().unwrap().total_in_flight
    }

    /// Distinct URLs ever admitted (best effort in bloom mode).
    pub fn seen(&self) -> usize {
        self.inner.visited.len()
    }
}

/// The right to occupy one of a host's concurrency slots, granted by
/// [`Frontier::next`]. Dropping the lease releases the slot, so a worker
/// that unwinds mid-fetch cannot leak it; the normal path goes through
/// [`Lease::release`] to record the outcome.
pub struct Lease {
    inner: Arc<Inner>,
    host: String,
    released: bool,
}

impl Lease {
    fn new(inner: Arc<Inner>, host: String) -> Self {
        Self {
            inner,
            host,
            released: false,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn release(mut self, outcome: Outcome) {
        self.do_release(outcome);
    }

    fn do_release(&mut self, outcome: Outcome) {
        if self.released {
            return;
        }
        self.released = true;
        {
            let Ok(mut state) = self.inner.state.lock() else {
                return;
            };
            state.release_host(&self.host, &self.inner.limits, Instant::now());
        }
        trace!(host = %self.host, ?outcome, "lease released");
        self.inner.wake.send_replace(());
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.do_release(Outcome::Cancelled);
    }
}
