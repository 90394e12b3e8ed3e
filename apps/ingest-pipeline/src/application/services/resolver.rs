//! Identity resolution: source-local instrument codes to canonical assets.
//!
//! One batched mapping lookup per source per cycle keeps query cost
//! O(sources) instead of O(records). Codes with no active mapping are not
//! errors; they are omitted from the result, reported to the caller, and
//! tracked so recurring misses surface as curation signals.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::application::ports::{MetadataError, MetadataStorePort};
use crate::domain::market::CanonicalAsset;
use crate::domain::shared::{SourceId, Timestamp};

/// Default TTL of one unmapped-code tracking window.
pub const DEFAULT_UNMAPPED_TTL: Duration = Duration::from_secs(3600);

/// Every Nth occurrence of an unmapped code writes a durable audit entry.
const AUDIT_EVERY: u64 = 100;

/// Default staleness horizon for mappings.
pub const DEFAULT_STALE_HORIZON_DAYS: i64 = 7;

/// Result of one batched resolution pass for a single source.
#[derive(Debug, Clone, Default)]
pub struct ResolutionOutcome {
    /// Resolved assets keyed by the source's raw instrument code.
    pub assets: HashMap<String, CanonicalAsset>,
    /// Codes with no active mapping, in request order.
    pub missed: Vec<String>,
    /// How many resolved mappings were past the staleness horizon.
    pub stale: usize,
}

/// Per-(source, code) miss counter inside one TTL window.
#[derive(Debug)]
struct MissEntry {
    count: u64,
    window_start: Instant,
}

/// Batched identity resolver with unmapped-code tracking.
pub struct IdentityResolver {
    metadata: Arc<dyn MetadataStorePort>,
    stale_horizon: chrono::Duration,
    unmapped_ttl: Duration,
    misses: Mutex<HashMap<(SourceId, String), MissEntry>>,
}

impl IdentityResolver {
    /// Create a resolver over the given metadata store.
    #[must_use]
    pub fn new(metadata: Arc<dyn MetadataStorePort>) -> Self {
        Self {
            metadata,
            stale_horizon: chrono::Duration::days(DEFAULT_STALE_HORIZON_DAYS),
            unmapped_ttl: DEFAULT_UNMAPPED_TTL,
            misses: Mutex::new(HashMap::new()),
        }
    }

    /// Override the staleness horizon.
    #[must_use]
    pub fn with_stale_horizon(mut self, horizon: chrono::Duration) -> Self {
        self.stale_horizon = horizon;
        self
    }

    /// Override the unmapped-tracking window TTL.
    #[must_use]
    pub const fn with_unmapped_ttl(mut self, ttl: Duration) -> Self {
        self.unmapped_ttl = ttl;
        self
    }

    /// Resolve a batch of raw codes for one source.
    ///
    /// Issues exactly one metadata query. Unresolvable codes land in
    /// `missed`; resolved-but-stale mappings are counted and logged at
    /// debug level but still resolve.
    pub async fn resolve_batch(
        &self,
        source_id: &SourceId,
        codes: &[String],
    ) -> Result<ResolutionOutcome, MetadataError> {
        if codes.is_empty() {
            return Ok(ResolutionOutcome::default());
        }

        let mappings = self.metadata.active_mappings(source_id, codes).await?;
        let now = Timestamp::now();

        let mut assets = HashMap::with_capacity(mappings.len());
        let mut stale = 0;
        for mapping in mappings {
            if mapping.is_stale(now, self.stale_horizon) {
                stale += 1;
                tracing::debug!(
                    source = %source_id,
                    code = %mapping.code,
                    last_verified = %mapping.last_verified,
                    "Resolved through a stale mapping"
                );
            }
            assets.insert(mapping.code, mapping.asset);
        }

        let missed: Vec<String> = codes
            .iter()
            .filter(|c| !assets.contains_key(*c))
            .cloned()
            .collect();

        tracing::debug!(
            source = %source_id,
            requested = codes.len(),
            resolved = assets.len(),
            missed = missed.len(),
            stale,
            "Resolved symbol batch"
        );

        Ok(ResolutionOutcome {
            assets,
            missed,
            stale,
        })
    }

    /// Record one occurrence of an unmapped code.
    ///
    /// The first occurrence inside a TTL window logs a warning; every
    /// 100th occurrence writes a durable audit entry through the metadata
    /// store. Audit failures are logged and swallowed — miss tracking is a
    /// curation signal, never a pipeline failure.
    pub async fn note_unmapped(&self, source_id: &SourceId, code: &str) {
        let occurrences = {
            let mut misses = self.misses.lock();
            let entry = misses
                .entry((source_id.clone(), code.to_string()))
                .or_insert(MissEntry {
                    count: 0,
                    window_start: Instant::now(),
                });

            if entry.window_start.elapsed() > self.unmapped_ttl {
                entry.count = 0;
                entry.window_start = Instant::now();
            }
            entry.count += 1;
            entry.count
        };

        if occurrences == 1 {
            tracing::warn!(source = %source_id, code, "New unmapped instrument code");
        }

        if occurrences % AUDIT_EVERY == 0 {
            if let Err(error) = self
                .metadata
                .record_unmapped_audit(source_id, code, occurrences)
                .await
            {
                tracing::error!(
                    source = %source_id,
                    code,
                    error = %error,
                    "Failed to write unmapped-code audit entry"
                );
            }
        }
    }

    /// Current miss count for a (source, code) pair, for observability.
    #[must_use]
    pub fn miss_count(&self, source_id: &SourceId, code: &str) -> u64 {
        self.misses
            .lock()
            .get(&(source_id.clone(), code.to_string()))
            .map_or(0, |e| e.count)
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("stale_horizon", &self.stale_horizon)
            .field("unmapped_ttl", &self.unmapped_ttl)
            .field("tracked_misses", &self.misses.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::RwLock;

    use super::*;
    use crate::domain::market::SymbolMapping;
    use crate::domain::shared::AssetId;

    #[derive(Default)]
    struct FakeMetadataStore {
        mappings: Vec<SymbolMapping>,
        audits: RwLock<Vec<(SourceId, String, u64)>>,
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
            source_id: &SourceId,
            code: &str,
            occurrences: u64,
        ) -> Result<(), MetadataError> {
            self.audits
                .write()
                .push((source_id.clone(), code.to_string(), occurrences));
            Ok(())
        }
    }

    fn mapping(source: &str, code: &str, asset: &str, verified: &str) -> SymbolMapping {
        SymbolMapping {
            source_id: SourceId::new(source),
            code: code.to_string(),
            asset: CanonicalAsset::new(asset, asset.to_uppercase(), asset),
            confidence: 0.95,
            last_verified: Timestamp::parse(verified).unwrap(),
        }
    }

    fn recent() -> String {
        Timestamp::now().to_rfc3339()
    }

    #[tokio::test]
    async fn resolves_known_codes_and_reports_misses() {
        let store = Arc::new(FakeMetadataStore {
            mappings: vec![mapping("binance", "BTCUSDT", "asset-btc", &recent())],
            ..FakeMetadataStore::default()
        });
        let resolver = IdentityResolver::new(store.clone());

        let outcome = resolver
            .resolve_batch(
                &SourceId::new("binance"),
                &["BTCUSDT".to_string(), "DOGEUSDT".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(outcome.assets.len(), 1);
        assert_eq!(outcome.assets["BTCUSDT"].symbol, "ASSET-BTC");
        assert_eq!(outcome.missed, vec!["DOGEUSDT".to_string()]);
        assert_eq!(*store.queries.read(), 1);
    }

    #[tokio::test]
    async fn empty_batch_issues_no_query() {
        let store = Arc::new(FakeMetadataStore::default());
        let resolver = IdentityResolver::new(store.clone());

        let outcome = resolver
            .resolve_batch(&SourceId::new("binance"), &[])
            .await
            .unwrap();

        assert!(outcome.assets.is_empty());
        assert_eq!(*store.queries.read(), 0);
    }

    #[tokio::test]
    async fn stale_mappings_still_resolve_but_are_counted() {
        let store = Arc::new(FakeMetadataStore {
            mappings: vec![mapping(
                "binance",
                "BTCUSDT",
                "asset-btc",
                "2020-01-01T00:00:00Z",
            )],
            ..FakeMetadataStore::default()
        });
        let resolver = IdentityResolver::new(store);

        let outcome = resolver
            .resolve_batch(&SourceId::new("binance"), &["BTCUSDT".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome.assets.len(), 1);
        assert_eq!(outcome.stale, 1);
    }

    #[tokio::test]
    async fn miss_counter_increments_per_occurrence() {
        let resolver = IdentityResolver::new(Arc::new(FakeMetadataStore::default()));
        let source = SourceId::new("binance");

        resolver.note_unmapped(&source, "MYSTERY").await;
        resolver.note_unmapped(&source, "MYSTERY").await;
        resolver.note_unmapped(&source, "MYSTERY").await;

        assert_eq!(resolver.miss_count(&source, "MYSTERY"), 3);
        assert_eq!(resolver.miss_count(&source, "OTHER"), 0);
    }

    #[tokio::test]
    async fn hundredth_occurrence_writes_audit_entry() {
        let store = Arc::new(FakeMetadataStore::default());
        let resolver = IdentityResolver::new(store.clone());
        let source = SourceId::new("binance");

        for _ in 0..200 {
            resolver.note_unmapped(&source, "MYSTERY").await;
        }

        let audits = store.audits.read();
        assert_eq!(audits.len(), 2);
        assert_eq!(audits[0].2, 100);
        assert_eq!(audits[1].2, 200);
    }

    #[tokio::test]
    async fn ttl_expiry_resets_the_window() {
        let resolver = IdentityResolver::new(Arc::new(FakeMetadataStore::default()))
            .with_unmapped_ttl(Duration::from_millis(10));
        let source = SourceId::new("binance");

        resolver.note_unmapped(&source, "MYSTERY").await;
        resolver.note_unmapped(&source, "MYSTERY").await;
        assert_eq!(resolver.miss_count(&source, "MYSTERY"), 2);

        std::thread::sleep(Duration::from_millis(20));

        resolver.note_unmapped(&source, "MYSTERY").await;
        assert_eq!(resolver.miss_count(&source, "MYSTERY"), 1);
    }
}
