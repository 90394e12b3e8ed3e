//! Tracing subscriber initialization.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level filter (default: `ingest_pipeline=info`)

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Safe to call once at startup; later calls are ignored (the first
/// subscriber wins), which keeps tests that initialize logging independent.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info").add_directive(
            "ingest_pipeline=info"
                .parse()
                .expect("static directive 'ingest_pipeline=info' is valid"),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
