mod controller;
mod worker;

pub use controller::{CrawlSummary, Crawler, ShutdownHandle};
