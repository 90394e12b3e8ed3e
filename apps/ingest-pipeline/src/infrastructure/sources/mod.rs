//! Source adapters: shared REST request path, rate limiting, health probe,
//! built-in catalog.

mod catalog;
mod health;
mod rate_limit;
mod rest;

pub use catalog::{binance, builtin_sources, kraken};
pub use health::{DEFAULT_PROBE_TIMEOUT, SourceHealth, check_sources, check_sources_with_timeout};
pub use rate_limit::RateLimiter;
pub use rest::{QuoteMapper, RestSourceAdapter, RestSourceConfig, SymbolFormat};
