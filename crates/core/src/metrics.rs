use tracing::debug;

use crate::error::FetchErrorKind;

/// Event notifications for an external metrics pipeline. The engine only
/// emits; transport is the sink's problem.
#[derive(Debug, Clone)]
pub enum MetricsEvent {
    PageFetched {
        host: String,
        bytes: usize,
        elapsed_ms: u64,
    },
    FetchError {
        host: String,
        kind: FetchErrorKind,
    },
    UrlRejected,
    FrontierDepth {
        queued: usize,
        in_flight: usize,
    },
}

pub trait MetricsSink: Send + Sync + 'static {
    fn record(&self, event: MetricsEvent);
}

/// Default sink: structured log lines, nothing exported.
#[derive(Debug, Default)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::PageFetched {
                host,
                bytes,
                elapsed_ms,
            } => debug!(%host, bytes, elapsed_ms, "page fetched"),
            MetricsEvent::FetchError { host, kind } => {
                debug!(%host, ?kind, "fetch error")
            }
            MetricsEvent::UrlRejected => debug!("url rejected"),
            MetricsEvent::FrontierDepth { queued, in_flight } => {
                debug!(queued, in_flight, "frontier depth")
            }
        }
    }
}
