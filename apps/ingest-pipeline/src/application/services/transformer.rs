//! Transform stage: resolve identities and normalize raw records into
//! `PriceObservation`s.
//!
//! Sources are transformed in parallel, and within a source records are
//! processed in fixed-size parallel batches. A resolver failure is isolated
//! to its source; unresolved records are skipped and counted, never failed.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use super::extractor::{ExtractionReport, SourceOutcome};
use super::resolver::IdentityResolver;
use crate::domain::observation::PriceObservation;
use crate::domain::shared::SourceId;

/// Default number of records per parallel batch within one source.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Warn when the aggregate resolution rate drops below this.
pub const DEFAULT_RESOLUTION_WARN_THRESHOLD: f64 = 0.5;

/// Per-source transformation statistics.
#[derive(Debug, Clone)]
pub struct SourceTransformStats {
    /// Source these stats belong to.
    pub source_id: SourceId,
    /// Records inspected.
    pub processed: usize,
    /// Records that resolved to an asset and became observations.
    pub resolved: usize,
    /// Records skipped because no mapping resolved.
    pub unresolved: usize,
    /// Failure reason if the whole source pass failed (resolver error).
    pub failure: Option<String>,
}

/// Aggregate result of the transform stage.
#[derive(Debug, Clone, Default)]
pub struct TransformReport {
    /// All observations produced this cycle, across sources.
    pub observations: Vec<PriceObservation>,
    /// One stats entry per transformed source.
    pub per_source: Vec<SourceTransformStats>,
}

impl TransformReport {
    /// Total records inspected.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.per_source.iter().map(|s| s.processed).sum()
    }

    /// Total records resolved into observations.
    #[must_use]
    pub fn resolved(&self) -> usize {
        self.per_source.iter().map(|s| s.resolved).sum()
    }

    /// Total records skipped as unresolved.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.per_source.iter().map(|s| s.unresolved).sum()
    }

    /// Fraction of processed records that resolved; 1.0 when nothing was
    /// processed (an idle cycle is not a resolution problem).
    #[must_use]
    pub fn resolution_rate(&self) -> f64 {
        let processed = self.processed();
        if processed == 0 {
            return 1.0;
        }
        self.resolved() as f64 / processed as f64
    }
}

/// Transform stage: one resolution-and-normalization pass per source.
pub struct Transformer {
    resolver: Arc<IdentityResolver>,
    batch_size: usize,
    warn_threshold: f64,
}

impl Transformer {
    /// Create a transformer over the given resolver.
    #[must_use]
    pub fn new(resolver: Arc<IdentityResolver>) -> Self {
        Self {
            resolver,
            batch_size: DEFAULT_BATCH_SIZE,
            warn_threshold: DEFAULT_RESOLUTION_WARN_THRESHOLD,
        }
    }

    /// Override the per-source batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Transform every successful source's records, sources in parallel.
    pub async fn transform(&self, extraction: &ExtractionReport) -> TransformReport {
        let passes: Vec<_> = extraction
            .outcomes
            .iter()
            .filter(|o| o.is_success() && !o.records.is_empty())
            .map(|o| self.transform_source(o))
            .collect();

        let results = join_all(passes).await;

        let mut report = TransformReport::default();
        for (observations, stats) in results {
            report.observations.extend(observations);
            report.per_source.push(stats);
        }

        let rate = report.resolution_rate();
        tracing::info!(
            processed = report.processed(),
            resolved = report.resolved(),
            unresolved = report.unresolved(),
            resolution_rate = rate,
            "Transform stage complete"
        );

        if report.processed() > 0 && rate < self.warn_threshold {
            tracing::warn!(
                resolution_rate = rate,
                threshold = self.warn_threshold,
                "Aggregate resolution rate below threshold"
            );
        }

        report
    }

    /// Resolve and normalize one source's records.
    ///
    /// Issues a single batched resolution for the source's distinct codes,
    /// then processes records in parallel fixed-size batches.
    async fn transform_source(
        &self,
        outcome: &SourceOutcome,
    ) -> (Vec<PriceObservation>, SourceTransformStats) {
        let source_id = outcome.source.id.clone();

        let mut seen = HashSet::new();
        let codes: Vec<String> = outcome
            .records
            .iter()
            .filter(|r| seen.insert(r.code.as_str()))
            .map(|r| r.code.clone())
            .collect();

        let resolution = match self.resolver.resolve_batch(&source_id, &codes).await {
            Ok(resolution) => resolution,
            Err(error) => {
                tracing::error!(
                    source = %source_id,
                    error = %error,
                    "Source transformation failed; contributing zero observations"
                );
                return (
                    Vec::new(),
                    SourceTransformStats {
                        source_id,
                        processed: outcome.records.len(),
                        resolved: 0,
                        unresolved: 0,
                        failure: Some(error.to_string()),
                    },
                );
            }
        };

        let assets = &resolution.assets;
        let resolver = &self.resolver;
        let resolved_source = &source_id;

        let batches: Vec<_> = outcome
            .records
            .chunks(self.batch_size)
            .map(|chunk| async move {
                let mut observations = Vec::new();
                let mut unresolved = 0usize;

                for record in chunk {
                    match assets.get(&record.code) {
                        Some(asset) => observations.push(PriceObservation::from_record(
                            resolved_source.clone(),
                            asset,
                            record,
                            outcome.fetched_at,
                        )),
                        None => {
                            unresolved += 1;
                            resolver.note_unmapped(resolved_source, &record.code).await;
                        }
                    }
                }

                (observations, unresolved)
            })
            .collect();

        let mut observations = Vec::with_capacity(outcome.records.len());
        let mut unresolved = 0usize;
        for (batch_observations, batch_unresolved) in join_all(batches).await {
            observations.extend(batch_observations);
            unresolved += batch_unresolved;
        }

        let stats = SourceTransformStats {
            source_id: source_id.clone(),
            processed: outcome.records.len(),
            resolved: observations.len(),
            unresolved,
            failure: None,
        };

        tracing::debug!(
            source = %source_id,
            processed = stats.processed,
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            "Source transformation complete"
        );

        (observations, stats)
    }
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("batch_size", &self.batch_size)
            .field("warn_threshold", &self.warn_threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::RwLock;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::ports::{MetadataError, MetadataStorePort};
    use crate::domain::market::{CanonicalAsset, QuoteRecord, Source, SymbolMapping};
    use crate::domain::shared::{AssetId, Timestamp};

    #[derive(Default)]
    struct FakeMetadataStore {
        mappings: Vec<SymbolMapping>,
        fail_for: Option<SourceId>,
        queries: RwLock<usize>,
    }

    #[async_trait]
    impl MetadataStorePort for FakeMetadataStore {
        async fn active_mappings(
            &self,
            source_id: &SourceId,
            codes: &[String],
        ) -> Result<Vec<SymbolMapping>, MetadataError> {
            *self.queries.write() += 1;
            if self.fail_for.as_ref() == Some(source_id) {
                return Err(MetadataError::Unavailable {
                    message: "connection reset".to_string(),
                });
            }
            Ok(self
                .mappings
                .iter()
                .filter(|m| &m.source_id == source_id && codes.contains(&m.code))
                .cloned()
                .collect())
        }

        async fn touch_assets(&self, asset_ids: &[AssetId]) -> Result<usize, MetadataError> {
            Ok(asset_ids.len())
        }

        async fn record_unmapped_audit(
            &self,
            _source_id: &SourceId,
            _code: &str,
            _occurrences: u64,
        ) -> Result<(), MetadataError> {
            Ok(())
        }
    }

    fn mapping(source: &str, code: &str, asset: &str) -> SymbolMapping {
        SymbolMapping {
            source_id: SourceId::new(source),
            code: code.to_string(),
            asset: CanonicalAsset::new(format!("asset-{asset}"), asset, asset),
            confidence: 1.0,
            last_verified: Timestamp::now(),
        }
    }

    fn outcome(source: &str, records: Vec<QuoteRecord>) -> SourceOutcome {
        SourceOutcome {
            source: Source::new(source, source),
            records,
            failure: None,
            fetched_at: Timestamp::now(),
            duration: Duration::from_millis(10),
        }
    }

    fn quote(code: &str) -> QuoteRecord {
        QuoteRecord {
            price: Some(dec!(100)),
            volume: Some(dec!(1)),
            observed_at: Some(Timestamp::now()),
            ..QuoteRecord::new(code)
        }
    }

    fn transformer(store: FakeMetadataStore) -> Transformer {
        Transformer::new(Arc::new(IdentityResolver::new(Arc::new(store))))
    }

    #[tokio::test]
    async fn resolved_records_become_observations() {
        let store = FakeMetadataStore {
            mappings: vec![
                mapping("binance", "BTCUSDT", "BTC"),
                mapping("binance", "ETHUSDT", "ETH"),
            ],
            ..FakeMetadataStore::default()
        };

        let extraction = ExtractionReport {
            started_at: Timestamp::now(),
            outcomes: vec![outcome("binance", vec![quote("BTCUSDT"), quote("ETHUSDT")])],
        };

        let report = transformer(store).transform(&extraction).await;

        assert_eq!(report.observations.len(), 2);
        assert_eq!(report.resolved(), 2);
        assert_eq!(report.unresolved(), 0);
        assert!((report.resolution_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unresolved_records_are_skipped_and_counted() {
        let store = FakeMetadataStore {
            mappings: vec![mapping("binance", "BTCUSDT", "BTC")],
            ..FakeMetadataStore::default()
        };

        let extraction = ExtractionReport {
            started_at: Timestamp::now(),
            outcomes: vec![outcome(
                "binance",
                vec![quote("BTCUSDT"), quote("MYSTERY1"), quote("MYSTERY2")],
            )],
        };

        let report = transformer(store).transform(&extraction).await;

        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.unresolved(), 2);
        assert!((report.resolution_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unmapped_counter_increments_once_per_occurrence() {
        let store = FakeMetadataStore::default();
        let resolver = Arc::new(IdentityResolver::new(Arc::new(store)));
        let transformer = Transformer::new(Arc::clone(&resolver));

        let extraction = ExtractionReport {
            started_at: Timestamp::now(),
            outcomes: vec![outcome(
                "binance",
                vec![quote("MYSTERY"), quote("MYSTERY"), quote("MYSTERY")],
            )],
        };

        let report = transformer.transform(&extraction).await;

        assert_eq!(report.observations.len(), 0);
        assert_eq!(report.unresolved(), 3);
        assert_eq!(resolver.miss_count(&SourceId::new("binance"), "MYSTERY"), 3);
    }

    #[tokio::test]
    async fn one_query_per_source_not_per_record() {
        let store = Arc::new(FakeMetadataStore {
            mappings: vec![mapping("binance", "BTCUSDT", "BTC")],
            ..FakeMetadataStore::default()
        });
        let resolver = Arc::new(IdentityResolver::new(
            Arc::clone(&store) as Arc<dyn MetadataStorePort>
        ));
        let transformer = Transformer::new(resolver).with_batch_size(2);

        let records: Vec<QuoteRecord> = (0..10).map(|_| quote("BTCUSDT")).collect();
        let extraction = ExtractionReport {
            started_at: Timestamp::now(),
            outcomes: vec![outcome("binance", records)],
        };

        let report = transformer.transform(&extraction).await;

        assert_eq!(report.observations.len(), 10);
        assert_eq!(*store.queries.read(), 1);
    }

    #[tokio::test]
    async fn resolver_failure_is_isolated_per_source() {
        let store = FakeMetadataStore {
            mappings: vec![mapping("kraken", "XBTUSD", "BTC")],
            fail_for: Some(SourceId::new("binance")),
            ..FakeMetadataStore::default()
        };

        let extraction = ExtractionReport {
            started_at: Timestamp::now(),
            outcomes: vec![
                outcome("binance", vec![quote("BTCUSDT")]),
                outcome("kraken", vec![quote("XBTUSD")]),
            ],
        };

        let report = transformer(store).transform(&extraction).await;

        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.observations[0].source_id.as_str(), "kraken");

        let failed: Vec<_> = report
            .per_source
            .iter()
            .filter(|s| s.failure.is_some())
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source_id.as_str(), "binance");
    }

    #[tokio::test]
    async fn failed_extraction_outcomes_are_ignored() {
        let extraction = ExtractionReport {
            started_at: Timestamp::now(),
            outcomes: vec![SourceOutcome {
                source: Source::new("down", "down"),
                records: Vec::new(),
                failure: Some("timed out".to_string()),
                fetched_at: Timestamp::now(),
                duration: Duration::from_secs(15),
            }],
        };

        let report = transformer(FakeMetadataStore::default())
            .transform(&extraction)
            .await;

        assert!(report.observations.is_empty());
        assert!(report.per_source.is_empty());
        assert!((report.resolution_rate() - 1.0).abs() < f64::EPSILON);
    }
}
