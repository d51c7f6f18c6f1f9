pub mod config;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod stats;
pub mod types;

pub use config::AppConfig;
pub use error::{CrawlError, FetchErrorKind};
pub use types::*;
