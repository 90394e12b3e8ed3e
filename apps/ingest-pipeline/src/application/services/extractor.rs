//! Extract stage: concurrent quote collection across every registered
//! source.
//!
//! Each source call runs under its own timeout, and a source's failure is
//! captured in its outcome rather than thrown — downstream stages operate
//! on whatever succeeded. No retries happen here; a failed source simply
//! contributes zero records this cycle.

use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::time::timeout;

use crate::application::ports::SourceBinding;
use crate::domain::market::{QuoteRecord, Source};
use crate::domain::shared::{SourceId, Timestamp};

/// Default per-source extraction timeout.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of one source's extraction attempt.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// The source attempted.
    pub source: Source,
    /// Records returned on success (empty on failure).
    pub records: Vec<QuoteRecord>,
    /// Failure reason, if the call errored or timed out.
    pub failure: Option<String>,
    /// When the extraction attempt completed.
    pub fetched_at: Timestamp,
    /// How long the call took (up to the timeout bound).
    pub duration: Duration,
}

impl SourceOutcome {
    /// Whether the source returned records this cycle.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Aggregate result of the extract stage.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// When the stage started.
    pub started_at: Timestamp,
    /// One outcome per attempted source, failures included.
    pub outcomes: Vec<SourceOutcome>,
}

impl ExtractionReport {
    /// Sources attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Sources that returned records.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Sources that failed or timed out.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Total records extracted across all successful sources.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records.len()).sum()
    }

    /// Duration of the slowest successful call.
    #[must_use]
    pub fn slowest_success(&self) -> Option<Duration> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.duration)
            .max()
    }

    /// Failed sources with their reasons.
    #[must_use]
    pub fn failed_sources(&self) -> Vec<(&SourceId, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| {
                o.failure
                    .as_deref()
                    .map(|reason| (&o.source.id, reason))
            })
            .collect()
    }

    /// Whether more than half of the attempted sources failed.
    #[must_use]
    pub fn majority_failed(&self) -> bool {
        self.failed() * 2 > self.attempted()
    }
}

/// Extract stage: fans out to every registered source in parallel.
#[derive(Debug, Clone)]
pub struct Extractor {
    per_source_timeout: Duration,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRACT_TIMEOUT)
    }
}

impl Extractor {
    /// Create an extractor with the given per-source timeout.
    #[must_use]
    pub const fn new(per_source_timeout: Duration) -> Self {
        Self { per_source_timeout }
    }

    /// Fetch quotes from every source concurrently.
    ///
    /// Never fails: per-source errors and timeouts are captured in the
    /// report. Logs a warning when more than half the sources failed.
    pub async fn extract(&self, sources: &[SourceBinding]) -> ExtractionReport {
        let started_at = Timestamp::now();

        let calls: Vec<_> = sources.iter().map(|b| self.extract_one(b)).collect();
        let outcomes = join_all(calls).await;

        let report = ExtractionReport {
            started_at,
            outcomes,
        };

        tracing::info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            records = report.total_records(),
            slowest_ms = report.slowest_success().map(|d| d.as_millis()),
            "Extract stage complete"
        );

        if report.attempted() > 0 && report.majority_failed() {
            tracing::warn!(
                failed = report.failed(),
                attempted = report.attempted(),
                "More than half of the sources failed this cycle"
            );
        }

        report
    }

    async fn extract_one(&self, binding: &SourceBinding) -> SourceOutcome {
        let source = binding.adapter.source().clone();
        let start = Instant::now();

        // The losing branch of this race is dropped, not force-killed; a
        // late response is discarded with the future.
        let result = timeout(
            self.per_source_timeout,
            binding.adapter.fetch_quotes(&binding.request_codes),
        )
        .await;

        let duration = start.elapsed();
        let fetched_at = Timestamp::now();

        match result {
            Ok(Ok(records)) => {
                tracing::debug!(
                    source = %source.id,
                    records = records.len(),
                    elapsed_ms = duration.as_millis(),
                    "Source extraction succeeded"
                );
                SourceOutcome {
                    source,
                    records,
                    failure: None,
                    fetched_at,
                    duration,
                }
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    source = %source.id,
                    error = %error,
                    "Source extraction failed"
                );
                SourceOutcome {
                    source,
                    records: Vec::new(),
                    failure: Some(error.to_string()),
                    fetched_at,
                    duration,
                }
            }
            Err(_) => {
                tracing::warn!(
                    source = %source.id,
                    timeout_secs = self.per_source_timeout.as_secs(),
                    "Source extraction timed out"
                );
                SourceOutcome {
                    source,
                    records: Vec::new(),
                    failure: Some(format!(
                        "timed out after {}s",
                        self.per_source_timeout.as_secs()
                    )),
                    fetched_at,
                    duration,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::{SourceAdapter, SourceError};

    struct StaticAdapter {
        source: Source,
        records: Vec<QuoteRecord>,
    }

    #[async_trait]
    impl SourceAdapter for StaticAdapter {
        fn source(&self) -> &Source {
            &self.source
        }

        async fn fetch_quotes(&self, _codes: &[String]) -> Result<Vec<QuoteRecord>, SourceError> {
            Ok(self.records.clone())
        }
    }

    struct FailingAdapter {
        source: Source,
    }

    #[async_trait]
    impl SourceAdapter for FailingAdapter {
        fn source(&self) -> &Source {
            &self.source
        }

        async fn fetch_quotes(&self, _codes: &[String]) -> Result<Vec<QuoteRecord>, SourceError> {
            Err(SourceError::Network {
                message: "connection refused".to_string(),
            })
        }
    }

    struct HangingAdapter {
        source: Source,
    }

    #[async_trait]
    impl SourceAdapter for HangingAdapter {
        fn source(&self) -> &Source {
            &self.source
        }

        async fn fetch_quotes(&self, _codes: &[String]) -> Result<Vec<QuoteRecord>, SourceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    fn quote(code: &str, price: Decimal) -> QuoteRecord {
        QuoteRecord {
            price: Some(price),
            volume: Some(dec!(1)),
            ..QuoteRecord::new(code)
        }
    }

    fn static_binding(id: &str, records: Vec<QuoteRecord>) -> SourceBinding {
        SourceBinding::all_instruments(Arc::new(StaticAdapter {
            source: Source::new(id, id),
            records,
        }))
    }

    #[tokio::test]
    async fn success_and_failure_counts() {
        let bindings = vec![
            static_binding("a", vec![quote("X", dec!(1)), quote("Y", dec!(2))]),
            SourceBinding::all_instruments(Arc::new(FailingAdapter {
                source: Source::new("b", "b"),
            })),
            static_binding("c", vec![quote("Z", dec!(3))]),
        ];

        let report = Extractor::default().extract(&bindings).await;

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_records(), 3);

        let failed = report.failed_sources();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0.as_str(), "b");
        assert!(failed[0].1.contains("connection refused"));
    }

    #[tokio::test]
    async fn timeout_is_captured_as_failure() {
        let bindings = vec![SourceBinding::all_instruments(Arc::new(HangingAdapter {
            source: Source::new("slow", "slow"),
        }))];

        let extractor = Extractor::new(Duration::from_millis(50));
        let report = extractor.extract(&bindings).await;

        assert_eq!(report.failed(), 1);
        assert!(report.outcomes[0]
            .failure
            .as_deref()
            .is_some_and(|r| r.contains("timed out")));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_others() {
        let bindings = vec![
            SourceBinding::all_instruments(Arc::new(HangingAdapter {
                source: Source::new("slow", "slow"),
            })),
            static_binding("fast", vec![quote("X", dec!(1))]),
        ];

        let extractor = Extractor::new(Duration::from_millis(50));
        let report = extractor.extract(&bindings).await;

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_records(), 1);
    }

    #[tokio::test]
    async fn majority_failed_flag() {
        let bindings = vec![
            SourceBinding::all_instruments(Arc::new(FailingAdapter {
                source: Source::new("b1", "b1"),
            })),
            SourceBinding::all_instruments(Arc::new(FailingAdapter {
                source: Source::new("b2", "b2"),
            })),
            static_binding("ok", vec![quote("X", dec!(1))]),
        ];

        let report = Extractor::default().extract(&bindings).await;
        assert!(report.majority_failed());
    }

    #[tokio::test]
    async fn half_failed_is_not_majority() {
        let bindings = vec![
            SourceBinding::all_instruments(Arc::new(FailingAdapter {
                source: Source::new("b", "b"),
            })),
            static_binding("ok", vec![quote("X", dec!(1))]),
        ];

        let report = Extractor::default().extract(&bindings).await;
        assert!(!report.majority_failed());
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_report() {
        let report = Extractor::default().extract(&[]).await;
        assert_eq!(report.attempted(), 0);
        assert_eq!(report.total_records(), 0);
        assert!(report.slowest_success().is_none());
    }
}
