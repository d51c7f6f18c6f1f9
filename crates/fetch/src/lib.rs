pub mod dns;
pub mod http;
pub mod simulated;

pub use dns::{CachingResolver, DnsCache, DnsError, Lookup, SystemLookup};
pub use http::HttpFetcher;
pub use simulated::{FetchRecord, SimOptions, SimulatedFetcher};
