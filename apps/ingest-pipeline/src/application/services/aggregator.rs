//! Aggregate stage: VWAP per cycle, OHLCV candles on their own cadences.
//!
//! VWAP runs once per ingestion cycle over the freshly loaded observations
//! and is only invoked after the critical sink confirmed the write — it
//! never aggregates partially persisted data. Candle passes run per
//! interval, read the stored VWAP series, and are isolated from each other.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::application::ports::{TimeseriesError, TimeseriesStorePort};
use crate::domain::aggregate::{
    CandleInterval, OhlcvCandle, VwapRecord, candle_from_vwap, compute_vwap,
};
use crate::domain::observation::PriceObservation;
use crate::domain::shared::{AssetId, Timestamp};

/// Default VWAP window width in seconds.
pub const DEFAULT_VWAP_WINDOW_SECS: u64 = 5;

/// Aggregation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AggregateError {
    /// Reading or writing the time-series store failed.
    #[error("aggregation store access failed: {0}")]
    Store(#[from] TimeseriesError),
}

/// Result of one candle pass for one interval.
#[derive(Debug, Clone, Default)]
pub struct CandlePassReport {
    /// Candles written.
    pub candles_written: usize,
    /// Assets whose bucket was empty or already emitted.
    pub assets_skipped: usize,
    /// VWAP points read from the store.
    pub points_read: usize,
}

/// VWAP and candle aggregation over the time-series store.
pub struct Aggregator {
    timeseries: Arc<dyn TimeseriesStorePort>,
    vwap_window_secs: u64,
    /// Last emitted bucket start per (asset, interval); enforces the
    /// monotonic, no-backfill ordering guarantee across scheduled runs.
    last_bucket: RwLock<BTreeMap<(AssetId, CandleInterval), Timestamp>>,
}

impl Aggregator {
    /// Create an aggregator over the time-series store.
    #[must_use]
    pub fn new(timeseries: Arc<dyn TimeseriesStorePort>) -> Self {
        Self {
            timeseries,
            vwap_window_secs: DEFAULT_VWAP_WINDOW_SECS,
            last_bucket: RwLock::new(BTreeMap::new()),
        }
    }

    /// Override the VWAP window width.
    #[must_use]
    pub const fn with_vwap_window_secs(mut self, secs: u64) -> Self {
        self.vwap_window_secs = secs;
        self
    }

    /// Compute and persist VWAP records for one cycle's observations.
    ///
    /// `cycle_start` anchors the window: the window start is `cycle_start`
    /// floored to the configured width.
    ///
    /// # Errors
    ///
    /// Returns an error when the VWAP batch cannot be persisted; the
    /// coordinator records the cycle as failed in that case.
    pub async fn aggregate_cycle(
        &self,
        observations: &[PriceObservation],
        cycle_start: Timestamp,
    ) -> Result<Vec<VwapRecord>, AggregateError> {
        let window_start = cycle_start.floor_to_secs(self.vwap_window_secs);
        let records = compute_vwap(observations, window_start, self.vwap_window_secs);

        if records.is_empty() {
            tracing::debug!("No VWAP records this cycle (no positive-volume observations)");
            return Ok(records);
        }

        self.timeseries.insert_vwap_records(&records).await?;

        tracing::info!(
            records = records.len(),
            window_start = %window_start,
            window_secs = self.vwap_window_secs,
            "VWAP aggregation complete"
        );

        Ok(records)
    }

    /// Build and persist candles for the most recently closed bucket of
    /// one interval.
    ///
    /// Reads the stored VWAP series for the bucket, builds at most one
    /// candle per asset, skips buckets at or before an asset's last
    /// emitted bucket, and appends the rest. Intervals are independent;
    /// the caller isolates failures per interval.
    pub async fn run_candle_pass(
        &self,
        interval: CandleInterval,
        now: Timestamp,
    ) -> Result<CandlePassReport, AggregateError> {
        let bucket_end = interval.bucket_start(now);
        let bucket_start = bucket_end.plus_secs(-i64::try_from(interval.width_secs()).unwrap_or(0));

        let points = self
            .timeseries
            .vwap_in_range(bucket_start, bucket_end)
            .await?;

        // Only consume points produced by the configured ingest window, so
        // one pass never mixes window widths.
        let mut by_asset: BTreeMap<&AssetId, Vec<&VwapRecord>> = BTreeMap::new();
        for point in points
            .iter()
            .filter(|p| p.window_secs == self.vwap_window_secs)
        {
            by_asset.entry(&point.asset_id).or_default().push(point);
        }

        let mut report = CandlePassReport {
            points_read: points.len(),
            ..CandlePassReport::default()
        };

        let mut candles: Vec<OhlcvCandle> = Vec::new();
        for (asset_id, asset_points) in by_asset {
            if self.already_emitted(asset_id, interval, bucket_start) {
                report.assets_skipped += 1;
                continue;
            }

            match candle_from_vwap(asset_id, interval, bucket_start, &asset_points) {
                Some(candle) => candles.push(candle),
                None => report.assets_skipped += 1,
            }
        }

        if candles.is_empty() {
            tracing::debug!(
                interval = %interval,
                bucket_start = %bucket_start,
                "No candles for this bucket"
            );
            return Ok(report);
        }

        self.timeseries.insert_candles(&candles).await?;

        {
            let mut last = self.last_bucket.write();
            for candle in &candles {
                last.insert((candle.asset_id.clone(), interval), candle.bucket_start);
            }
        }

        report.candles_written = candles.len();
        tracing::info!(
            interval = %interval,
            bucket_start = %bucket_start,
            candles = report.candles_written,
            "Candle pass complete"
        );

        Ok(report)
    }

    /// Whether a candle at or after `bucket_start` was already emitted for
    /// this (asset, interval).
    fn already_emitted(
        &self,
        asset_id: &AssetId,
        interval: CandleInterval,
        bucket_start: Timestamp,
    ) -> bool {
        self.last_bucket
            .read()
            .get(&(asset_id.clone(), interval))
            .is_some_and(|last| *last >= bucket_start)
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("vwap_window_secs", &self.vwap_window_secs)
            .field("tracked_buckets", &self.last_bucket.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::market::CanonicalAsset;
    use crate::domain::shared::SourceId;
    use crate::infrastructure::persistence::InMemoryTimeseriesStore;

    fn observation(source: &str, asset: &str, price: Decimal, volume: Decimal) -> PriceObservation {
        let asset = CanonicalAsset::new(format!("asset-{asset}"), asset, asset);
        PriceObservation {
            source_id: SourceId::new(source),
            asset_id: asset.id,
            symbol: asset.symbol,
            observed_at: Timestamp::now(),
            price,
            volume,
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            spread: Decimal::ZERO,
            change: None,
            change_percent: None,
            quality: 1.0,
            active: true,
        }
    }

    fn vwap_point(asset: &str, at: &str, price: Decimal, volume: Decimal) -> VwapRecord {
        VwapRecord {
            asset_id: AssetId::new(format!("asset-{asset}")),
            window_start: Timestamp::parse(at).unwrap(),
            window_secs: DEFAULT_VWAP_WINDOW_SECS,
            vwap_price: price,
            total_volume: volume,
            total_value: price * volume,
            source_count: 1,
            sources: vec![SourceId::new("a")],
        }
    }

    fn aggregator(store: &Arc<InMemoryTimeseriesStore>) -> Aggregator {
        Aggregator::new(Arc::clone(store) as Arc<dyn TimeseriesStorePort>)
    }

    #[tokio::test]
    async fn cycle_vwap_is_persisted() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        let agg = aggregator(&store);

        let cycle_start = Timestamp::parse("2026-03-02T10:00:03Z").unwrap();
        let records = agg
            .aggregate_cycle(
                &[
                    observation("binance", "BTC", dec!(100), dec!(2)),
                    observation("kraken", "BTC", dec!(200), dec!(1)),
                ],
                cycle_start,
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vwap_price, dec!(400) / dec!(3));
        // Window anchored to the floored cycle start.
        assert_eq!(
            records[0].window_start.to_rfc3339(),
            "2026-03-02T10:00:00+00:00"
        );
        assert_eq!(store.vwap_records().len(), 1);
    }

    #[tokio::test]
    async fn zero_volume_cycle_writes_nothing() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        let agg = aggregator(&store);

        let records = agg
            .aggregate_cycle(
                &[observation("binance", "BTC", dec!(100), dec!(0))],
                Timestamp::now(),
            )
            .await
            .unwrap();

        assert!(records.is_empty());
        assert!(store.vwap_records().is_empty());
    }

    #[tokio::test]
    async fn candle_pass_builds_one_candle_per_asset() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        store
            .insert_vwap_records(&[
                vwap_point("BTC", "2026-03-02T10:00:00Z", dec!(100), dec!(1)),
                vwap_point("BTC", "2026-03-02T10:01:00Z", dec!(110), dec!(2)),
                vwap_point("BTC", "2026-03-02T10:02:00Z", dec!(90), dec!(3)),
                vwap_point("BTC", "2026-03-02T10:03:00Z", dec!(105), dec!(4)),
                vwap_point("ETH", "2026-03-02T10:01:00Z", dec!(10), dec!(5)),
            ])
            .await
            .unwrap();

        let agg = aggregator(&store);
        let now = Timestamp::parse("2026-03-02T10:05:01Z").unwrap();
        let report = agg.run_candle_pass(CandleInterval::M5, now).await.unwrap();

        assert_eq!(report.candles_written, 2);
        assert_eq!(report.points_read, 5);

        let candles = store.candles();
        let btc = candles
            .iter()
            .find(|c| c.asset_id.as_str() == "asset-BTC")
            .unwrap();
        assert_eq!(btc.open, dec!(100));
        assert_eq!(btc.close, dec!(105));
        assert_eq!(btc.high, dec!(110));
        assert_eq!(btc.low, dec!(90));
        assert_eq!(btc.volume, dec!(10));
        assert_eq!(btc.point_count, 4);
    }

    #[tokio::test]
    async fn empty_bucket_yields_no_candles() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        let agg = aggregator(&store);

        let now = Timestamp::parse("2026-03-02T10:05:01Z").unwrap();
        let report = agg.run_candle_pass(CandleInterval::M5, now).await.unwrap();

        assert_eq!(report.candles_written, 0);
        assert!(store.candles().is_empty());
    }

    #[tokio::test]
    async fn repeated_pass_does_not_duplicate_buckets() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        store
            .insert_vwap_records(&[vwap_point(
                "BTC",
                "2026-03-02T10:00:00Z",
                dec!(100),
                dec!(1),
            )])
            .await
            .unwrap();

        let agg = aggregator(&store);
        let now = Timestamp::parse("2026-03-02T10:05:01Z").unwrap();

        let first = agg.run_candle_pass(CandleInterval::M5, now).await.unwrap();
        assert_eq!(first.candles_written, 1);

        let second = agg.run_candle_pass(CandleInterval::M5, now).await.unwrap();
        assert_eq!(second.candles_written, 0);
        assert_eq!(second.assets_skipped, 1);
        assert_eq!(store.candles().len(), 1);
    }

    #[tokio::test]
    async fn successive_buckets_are_monotonic() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        store
            .insert_vwap_records(&[
                vwap_point("BTC", "2026-03-02T10:00:00Z", dec!(100), dec!(1)),
                vwap_point("BTC", "2026-03-02T10:05:00Z", dec!(101), dec!(1)),
            ])
            .await
            .unwrap();

        let agg = aggregator(&store);

        agg.run_candle_pass(
            CandleInterval::M5,
            Timestamp::parse("2026-03-02T10:05:01Z").unwrap(),
        )
        .await
        .unwrap();
        agg.run_candle_pass(
            CandleInterval::M5,
            Timestamp::parse("2026-03-02T10:10:01Z").unwrap(),
        )
        .await
        .unwrap();

        let candles = store.candles();
        assert_eq!(candles.len(), 2);
        assert!(candles[0].bucket_start < candles[1].bucket_start);
    }

    #[tokio::test]
    async fn foreign_window_widths_are_ignored() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        let mut foreign = vwap_point("BTC", "2026-03-02T10:00:00Z", dec!(100), dec!(1));
        foreign.window_secs = 60;
        store.insert_vwap_records(&[foreign]).await.unwrap();

        let agg = aggregator(&store);
        let now = Timestamp::parse("2026-03-02T10:05:01Z").unwrap();
        let report = agg.run_candle_pass(CandleInterval::M5, now).await.unwrap();

        assert_eq!(report.candles_written, 0);
        assert_eq!(report.points_read, 1);
    }

    #[tokio::test]
    async fn intervals_track_buckets_independently() {
        let store = Arc::new(InMemoryTimeseriesStore::new());
        store
            .insert_vwap_records(&[vwap_point(
                "BTC",
                "2026-03-02T10:04:00Z",
                dec!(100),
                dec!(1),
            )])
            .await
            .unwrap();

        let agg = aggregator(&store);
        let now = Timestamp::parse("2026-03-02T10:05:01Z").unwrap();

        let m5 = agg.run_candle_pass(CandleInterval::M5, now).await.unwrap();
        let m1 = agg.run_candle_pass(CandleInterval::M1, now).await.unwrap();

        assert_eq!(m5.candles_written, 1);
        assert_eq!(m1.candles_written, 1);
    }
}
