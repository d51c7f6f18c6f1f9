use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("dns error: {0}")]
    Dns(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("fetch cancelled")]
    Cancelled,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse taxonomy used for counters and metrics events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Dns,
    Net,
    Http,
    Cancelled,
}

impl CrawlError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            CrawlError::Dns(_) => FetchErrorKind::Dns,
            CrawlError::HttpStatus(_) | CrawlError::BodyTooLarge { .. } => FetchErrorKind::Http,
            CrawlError::Cancelled => FetchErrorKind::Cancelled,
            _ => FetchErrorKind::Net,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(CrawlError::Dns("nx".into()).kind(), FetchErrorKind::Dns);
        assert_eq!(CrawlError::HttpStatus(404).kind(), FetchErrorKind::Http);
        assert_eq!(
            CrawlError::BodyTooLarge { size: 10, max: 5 }.kind(),
            FetchErrorKind::Http
        );
        assert_eq!(CrawlError::Timeout(10).kind(), FetchErrorKind::Net);
        assert_eq!(CrawlError::Cancelled.kind(), FetchErrorKind::Cancelled);
    }
}
