//! Load stage: fan-out persistence of a cycle's observations.
//!
//! Three sinks are written in parallel, each under its own timeout. The
//! time-series store is the canonical record of truth: its failure fails
//! the cycle. Cache and metadata writes are best-effort; their failures are
//! logged and reported but never abort anything.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::timeout;

use crate::application::ports::{CacheError, CacheStorePort, MetadataStorePort, TimeseriesStorePort};
use crate::domain::observation::PriceObservation;
use crate::domain::shared::AssetId;

/// Default per-sink timeout.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL of the per-(asset, source) snapshot cache entry.
const SNAPSHOT_TTL: Duration = Duration::from_secs(5);

/// TTL of the per-asset multi-source hash.
const MARKET_TTL: Duration = Duration::from_secs(10);

/// The three persistence targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Row-oriented time-series store (critical).
    Timeseries,
    /// Key/value cache (non-critical).
    Cache,
    /// Relational metadata store (non-critical).
    Metadata,
}

impl SinkKind {
    /// Whether this sink's failure fails the cycle.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::Timeseries)
    }

    /// Sink name for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeseries => "timeseries",
            Self::Cache => "cache",
            Self::Metadata => "metadata",
        }
    }
}

/// Result of one sink's write.
#[derive(Debug, Clone)]
pub struct SinkOutcome {
    /// Which sink.
    pub sink: SinkKind,
    /// Failure reason, if the write errored or timed out.
    pub failure: Option<String>,
    /// How long the write took (up to the timeout bound).
    pub duration: Duration,
}

impl SinkOutcome {
    /// Whether the write succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Aggregate result of the load stage.
#[derive(Debug, Clone)]
pub struct LoadReport {
    /// Observations handed to the sinks.
    pub observations_written: usize,
    /// One outcome per sink.
    pub sinks: Vec<SinkOutcome>,
}

impl LoadReport {
    /// Whether the critical sink confirmed the write.
    #[must_use]
    pub fn critical_succeeded(&self) -> bool {
        self.sinks
            .iter()
            .filter(|s| s.sink.is_critical())
            .all(SinkOutcome::is_success)
    }

    /// Non-critical sinks that failed, with reasons.
    #[must_use]
    pub fn non_critical_failures(&self) -> Vec<(&SinkKind, &str)> {
        self.sinks
            .iter()
            .filter(|s| !s.sink.is_critical())
            .filter_map(|s| s.failure.as_deref().map(|r| (&s.sink, r)))
            .collect()
    }
}

/// Loader error: only the critical sink surfaces one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoaderError {
    /// The critical sink failed or timed out; the cycle must be recorded
    /// as failed and VWAP aggregation must not run.
    #[error("critical sink {sink} failed: {reason}")]
    CriticalSink {
        /// Sink name.
        sink: &'static str,
        /// Failure reason.
        reason: String,
        /// Full report, for the cycle record.
        report: LoadReport,
    },
}

/// Snapshot payload cached per (asset, source).
#[derive(Debug, Serialize)]
struct PriceSnapshot<'a> {
    price: &'a rust_decimal::Decimal,
    volume: &'a rust_decimal::Decimal,
    change: Option<&'a rust_decimal::Decimal>,
    change_percent: Option<&'a rust_decimal::Decimal>,
    timestamp_ms: i64,
    source: &'a str,
}

/// Load stage: parallel fan-out to the three sinks.
pub struct Loader {
    timeseries: Arc<dyn TimeseriesStorePort>,
    cache: Arc<dyn CacheStorePort>,
    metadata: Arc<dyn MetadataStorePort>,
    sink_timeout: Duration,
}

impl Loader {
    /// Create a loader over the three sinks.
    #[must_use]
    pub fn new(
        timeseries: Arc<dyn TimeseriesStorePort>,
        cache: Arc<dyn CacheStorePort>,
        metadata: Arc<dyn MetadataStorePort>,
    ) -> Self {
        Self {
            timeseries,
            cache,
            metadata,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    /// Override the per-sink timeout.
    #[must_use]
    pub const fn with_sink_timeout(mut self, sink_timeout: Duration) -> Self {
        self.sink_timeout = sink_timeout;
        self
    }

    /// Persist a batch of observations to all three sinks in parallel.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::CriticalSink` when the time-series write
    /// failed or timed out. Non-critical failures are only reflected in
    /// the report.
    pub async fn load(
        &self,
        observations: &[PriceObservation],
    ) -> Result<LoadReport, LoaderError> {
        if observations.is_empty() {
            tracing::debug!("Load stage skipped: no observations this cycle");
            return Ok(LoadReport {
                observations_written: 0,
                sinks: Vec::new(),
            });
        }

        let (timeseries, cache, metadata) = tokio::join!(
            self.run_sink(SinkKind::Timeseries, self.write_timeseries(observations)),
            self.run_sink(SinkKind::Cache, self.write_cache(observations)),
            self.run_sink(SinkKind::Metadata, self.write_metadata(observations)),
        );

        let report = LoadReport {
            observations_written: observations.len(),
            sinks: vec![timeseries, cache, metadata],
        };

        for (sink, reason) in report.non_critical_failures() {
            tracing::warn!(
                sink = sink.as_str(),
                reason,
                "Non-critical sink failed; cycle continues"
            );
        }

        if report.critical_succeeded() {
            tracing::info!(
                observations = report.observations_written,
                "Load stage complete"
            );
            Ok(report)
        } else {
            let reason = report
                .sinks
                .iter()
                .find(|s| s.sink.is_critical())
                .and_then(|s| s.failure.clone())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::error!(reason, "Critical sink failed; cycle will be recorded as failed");
            Err(LoaderError::CriticalSink {
                sink: SinkKind::Timeseries.as_str(),
                reason,
                report,
            })
        }
    }

    /// Run one sink write under the sink timeout, capturing the outcome.
    async fn run_sink(
        &self,
        sink: SinkKind,
        write: impl Future<Output = Result<(), String>>,
    ) -> SinkOutcome {
        let start = Instant::now();
        let result = timeout(self.sink_timeout, write).await;
        let duration = start.elapsed();

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(reason)) => Some(reason),
            Err(_) => Some(format!(
                "timed out after {}s",
                self.sink_timeout.as_secs()
            )),
        };

        SinkOutcome {
            sink,
            failure,
            duration,
        }
    }

    async fn write_timeseries(&self, observations: &[PriceObservation]) -> Result<(), String> {
        self.timeseries
            .insert_observations(observations)
            .await
            .map_err(|e| e.to_string())
    }

    /// Two TTL'd cache views per observation: a per-(asset, source)
    /// snapshot and a per-asset hash of per-source snapshots.
    async fn write_cache(&self, observations: &[PriceObservation]) -> Result<(), String> {
        for obs in observations {
            let payload = encode_snapshot(obs).map_err(|e| e.to_string())?;

            let snapshot_key = format!("price:{}:{}", obs.symbol, obs.source_id);
            self.cache
                .set_with_ttl(&snapshot_key, &payload, SNAPSHOT_TTL)
                .await
                .map_err(|e| e.to_string())?;

            let market_key = format!("market:{}", obs.symbol);
            self.cache
                .hash_set_field(&market_key, obs.source_id.as_str(), &payload)
                .await
                .map_err(|e| e.to_string())?;
            self.cache
                .expire(&market_key, MARKET_TTL)
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn write_metadata(&self, observations: &[PriceObservation]) -> Result<(), String> {
        let assets: BTreeSet<AssetId> =
            observations.iter().map(|o| o.asset_id.clone()).collect();
        let assets: Vec<AssetId> = assets.into_iter().collect();

        let touched = self
            .metadata
            .touch_assets(&assets)
            .await
            .map_err(|e| e.to_string())?;

        tracing::debug!(assets = assets.len(), touched, "Touched asset metadata");
        Ok(())
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("sink_timeout", &self.sink_timeout)
            .finish_non_exhaustive()
    }
}

fn encode_snapshot(obs: &PriceObservation) -> Result<String, CacheError> {
    let snapshot = PriceSnapshot {
        price: &obs.price,
        volume: &obs.volume,
        change: obs.change.as_ref(),
        change_percent: obs.change_percent.as_ref(),
        timestamp_ms: obs.observed_at.unix_millis(),
        source: obs.source_id.as_str(),
    };
    serde_json::to_string(&snapshot).map_err(|e| CacheError::Encoding {
        message: e.to_string(),
    })
}
