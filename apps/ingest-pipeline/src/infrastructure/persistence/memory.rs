//! In-memory store implementations for testing and development.
//!
//! Each adapter supports failure and delay injection so tests can exercise
//! the loader's critical/non-critical semantics and timeout handling
//! without a real backend. Not for production use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use crate::application::ports::{
    CacheError, CacheStorePort, MetadataError, MetadataStorePort, TimeseriesError,
    TimeseriesStorePort,
};
use crate::domain::aggregate::{OhlcvCandle, VwapRecord};
use crate::domain::market::SymbolMapping;
use crate::domain::observation::PriceObservation;
use crate::domain::shared::{AssetId, SourceId, Timestamp};

/// In-memory implementation of `TimeseriesStorePort`.
#[derive(Debug, Default)]
pub struct InMemoryTimeseriesStore {
    observations: RwLock<Vec<PriceObservation>>,
    vwap: RwLock<Vec<VwapRecord>>,
    candles: RwLock<Vec<OhlcvCandle>>,
    fail_inserts: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl InMemoryTimeseriesStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert fail (or succeed again).
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Delay every write by `delay` (for timeout tests).
    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// Stored observations.
    #[must_use]
    pub fn observations(&self) -> Vec<PriceObservation> {
        self.observations.read().clone()
    }

    /// Stored VWAP records.
    #[must_use]
    pub fn vwap_records(&self) -> Vec<VwapRecord> {
        self.vwap.read().clone()
    }

    /// Stored candles.
    #[must_use]
    pub fn candles(&self) -> Vec<OhlcvCandle> {
        self.candles.read().clone()
    }

    async fn before_write(&self) -> Result<(), TimeseriesError> {
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(TimeseriesError::WriteRejected {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TimeseriesStorePort for InMemoryTimeseriesStore {
    async fn insert_observations(
        &self,
        rows: &[PriceObservation],
    ) -> Result<(), TimeseriesError> {
        self.before_write().await?;
        // Row-at-a-time appends: concurrent readers may observe a partial
        // batch, matching the real store's per-record insert visibility.
        for row in rows {
            self.observations.write().push(row.clone());
        }
        Ok(())
    }

    async fn insert_vwap_records(&self, rows: &[VwapRecord]) -> Result<(), TimeseriesError> {
        self.before_write().await?;
        for row in rows {
            self.vwap.write().push(row.clone());
        }
        Ok(())
    }

    async fn insert_candles(&self, rows: &[OhlcvCandle]) -> Result<(), TimeseriesError> {
        self.before_write().await?;
        for row in rows {
            self.candles.write().push(row.clone());
        }
        Ok(())
    }

    async fn vwap_in_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<VwapRecord>, TimeseriesError> {
        Ok(self
            .vwap
            .read()
            .iter()
            .filter(|r| r.window_start >= start && r.window_start < end)
            .cloned()
            .collect())
    }
}

/// One cache value with its expiry deadline.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory implementation of `CacheStorePort` with real TTL semantics.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
    hash_expiry: RwLock<HashMap<String, Instant>>,
    fail_writes: AtomicBool,
}

impl InMemoryCacheStore {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Read a key, honoring its TTL.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        (entry.expires_at > Instant::now()).then(|| entry.value.clone())
    }

    /// Read all fields of a hash, honoring its TTL.
    #[must_use]
    pub fn hash_fields(&self, key: &str) -> HashMap<String, String> {
        if self
            .hash_expiry
            .read()
            .get(key)
            .is_some_and(|deadline| *deadline <= Instant::now())
        {
            return HashMap::new();
        }
        self.hashes.read().get(key).cloned().unwrap_or_default()
    }

    fn check_writable(&self) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStorePort for InMemoryCacheStore {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.check_writable()?;
        self.entries.write().insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn hash_set_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), CacheError> {
        self.check_writable()?;
        self.hashes
            .write()
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        self.check_writable()?;
        self.hash_expiry
            .write()
            .insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }
}

/// In-memory implementation of `MetadataStorePort`.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    mappings: RwLock<Vec<SymbolMapping>>,
    touched: RwLock<Vec<AssetId>>,
    audits: RwLock<Vec<(SourceId, String, u64)>>,
    fail_mappings: AtomicBool,
    fail_touch: AtomicBool,
}

impl InMemoryMetadataStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active mapping (test setup). Replaces any existing
    /// mapping for the same (source, code) pair, preserving the
    /// one-active-mapping invariant.
    pub fn insert_mapping(&self, mapping: SymbolMapping) {
        let mut mappings = self.mappings.write();
        mappings.retain(|m| !(m.source_id == mapping.source_id && m.code == mapping.code));
        mappings.push(mapping);
    }

    /// Make mapping lookups fail (or succeed again).
    pub fn fail_mappings(&self, fail: bool) {
        self.fail_mappings.store(fail, Ordering::SeqCst);
    }

    /// Make asset touches fail (or succeed again).
    pub fn fail_touch(&self, fail: bool) {
        self.fail_touch.store(fail, Ordering::SeqCst);
    }

    /// Distinct assets touched so far, in touch order.
    #[must_use]
    pub fn touched_assets(&self) -> Vec<AssetId> {
        let mut seen = Vec::new();
        for id in self.touched.read().iter() {
            if !seen.contains(id) {
                seen.push(id.clone());
            }
        }
        seen
    }

    /// Recorded unmapped-code audit entries.
    #[must_use]
    pub fn audit_entries(&self) -> Vec<(SourceId, String, u64)> {
        self.audits.read().clone()
    }
}

#[async_trait]
impl MetadataStorePort for InMemoryMetadataStore {
    async fn active_mappings(
        &self,
        source_id: &SourceId,
        codes: &[String],
    ) -> Result<Vec<SymbolMapping>, MetadataError> {
        if self.fail_mappings.load(Ordering::SeqCst) {
            return Err(MetadataError::Unavailable {
                message: "injected failure".to_string(),
            });
        }
        Ok(self
            .mappings
            .read()
            .iter()
            .filter(|m| &m.source_id == source_id && codes.contains(&m.code))
            .cloned()
            .collect())
    }

    async fn touch_assets(&self, asset_ids: &[AssetId]) -> Result<usize, MetadataError> {
        if self.fail_touch.load(Ordering::SeqCst) {
            return Err(MetadataError::UpdateRejected {
                message: "injected failure".to_string(),
            });
        }
        self.touched.write().extend_from_slice(asset_ids);
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
