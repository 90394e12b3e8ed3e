//! Source health probe.
//!
//! Fans out a tiny fetch to every registered source and reports per-source
//! status and latency. Used at startup and by operators; never on the
//! ingestion path.

use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time::timeout;

use crate::application::ports::SourceBinding;
use crate::domain::shared::SourceId;

/// Default probe timeout per source.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One source's probe result.
#[derive(Debug, Clone)]
pub struct SourceHealth {
    /// Source probed.
    pub source_id: SourceId,
    /// Whether the probe returned quotes.
    pub healthy: bool,
    /// Probe round-trip time.
    pub latency: Duration,
    /// Failure reason, when unhealthy.
    pub error: Option<String>,
}

/// Probe every source concurrently.
pub async fn check_sources(sources: &[SourceBinding]) -> Vec<SourceHealth> {
    check_sources_with_timeout(sources, DEFAULT_PROBE_TIMEOUT).await
}

/// Probe every source concurrently with an explicit timeout.
pub async fn check_sources_with_timeout(
    sources: &[SourceBinding],
    probe_timeout: Duration,
) -> Vec<SourceHealth> {
    let probes: Vec<_> = sources
        .iter()
        .map(|binding| async move {
            let source_id = binding.adapter.source().id.clone();
            let probe_codes: Vec<String> = binding.request_codes.iter().take(1).cloned().collect();

            let start = Instant::now();
            let result = timeout(probe_timeout, binding.adapter.fetch_quotes(&probe_codes)).await;
            let latency = start.elapsed();

            match result {
                Ok(Ok(_)) => SourceHealth {
                    source_id,
                    healthy: true,
                    latency,
                    error: None,
                },
                Ok(Err(error)) => SourceHealth {
                    source_id,
                    healthy: false,
                    latency,
                    error: Some(error.to_string()),
                },
                Err(_) => SourceHealth {
                    source_id,
                    healthy: false,
                    latency,
                    error: Some("probe timed out".to_string()),
                },
            }
        })
        .collect();

    let results = join_all(probes).await;

    for health in &results {
        if health.healthy {
            tracing::debug!(
                source = %health.source_id,
                latency_ms = health.latency.as_millis(),
                "Source healthy"
            );
        } else {
            tracing::warn!(
                source = %health.source_id,
                error = health.error.as_deref().unwrap_or("unknown"),
                "Source unhealthy"
            );
        }
    }

    results
}
