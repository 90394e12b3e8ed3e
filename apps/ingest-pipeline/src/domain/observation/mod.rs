//! Canonical price observations and data-quality scoring.
//!
//! A `PriceObservation` is the resolved unit of work: one source's quote for
//! one canonical asset, normalized and scored. Observations are immutable
//! and live for a single cycle; the loader writes them to all three sinks.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::{CanonicalAsset, QuoteRecord};
use crate::domain::shared::{AssetId, SourceId, Timestamp};

/// Quality-score penalty for a missing or non-positive price.
const PENALTY_BAD_PRICE: f64 = 0.5;
/// Penalty for missing or negative volume.
const PENALTY_BAD_VOLUME: f64 = 0.2;
/// Penalty for a missing observation time.
const PENALTY_NO_TIMESTAMP: f64 = 0.1;
/// Penalty for an inconsistent high/low pair.
const PENALTY_HIGH_BELOW_LOW: f64 = 0.3;
/// Penalty for a crossed book (bid above ask).
const PENALTY_CROSSED_BOOK: f64 = 0.2;

/// A resolved, normalized price point from one source for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Source that reported the quote.
    pub source_id: SourceId,
    /// Resolved canonical asset.
    pub asset_id: AssetId,
    /// Canonical symbol, denormalized for cache keys and logs.
    pub symbol: String,
    /// Observation time (the source's if given, else the extraction time).
    pub observed_at: Timestamp,
    /// Last traded price; zero when the source omitted it.
    pub price: Decimal,
    /// Traded volume; zero when the source omitted it.
    pub volume: Decimal,
    /// Best bid; zero when the source omitted it.
    pub bid: Decimal,
    /// Best ask; zero when the source omitted it.
    pub ask: Decimal,
    /// Relative spread in percent, derived from bid/ask.
    pub spread: Decimal,
    /// Absolute price change, passed through from the source.
    pub change: Option<Decimal>,
    /// Percentage price change, passed through from the source.
    pub change_percent: Option<Decimal>,
    /// Data-quality score in [0, 1].
    pub quality: f64,
    /// Whether the observation participates in downstream aggregation.
    pub active: bool,
}

impl PriceObservation {
    /// Build an observation from a raw record and its resolved asset.
    ///
    /// `fallback_time` is used when the record carries no observation time
    /// (the per-source extraction timestamp, as the original pipeline did).
    #[must_use]
    pub fn from_record(
        source_id: SourceId,
        asset: &CanonicalAsset,
        record: &QuoteRecord,
        fallback_time: Timestamp,
    ) -> Self {
        let bid = record.bid.unwrap_or(Decimal::ZERO);
        let ask = record.ask.unwrap_or(Decimal::ZERO);

        Self {
            source_id,
            asset_id: asset.id.clone(),
            symbol: asset.symbol.clone(),
            observed_at: record.observed_at.unwrap_or(fallback_time),
            price: record.price.unwrap_or(Decimal::ZERO),
            volume: record.volume.unwrap_or(Decimal::ZERO),
            bid,
            ask,
            spread: relative_spread(bid, ask),
            change: record.change,
            change_percent: record.change_percent,
            quality: quality_score(record),
            active: true,
        }
    }
}

/// Compute the data-quality score for a raw record.
///
/// Deterministic and pure: starts at 1.0, subtracts a fixed penalty per
/// defect, clamps to [0, 1]. A record with price ≤ 0 can never score above
/// 0.5.
#[must_use]
pub fn quality_score(record: &QuoteRecord) -> f64 {
    let mut score = 1.0;

    if !record.price.is_some_and(|p| p > Decimal::ZERO) {
        score -= PENALTY_BAD_PRICE;
    }
    if !record.volume.is_some_and(|v| v >= Decimal::ZERO) {
        score -= PENALTY_BAD_VOLUME;
    }
    if record.observed_at.is_none() {
        score -= PENALTY_NO_TIMESTAMP;
    }
    if let (Some(high), Some(low)) = (record.high, record.low)
        && high < low
    {
        score -= PENALTY_HIGH_BELOW_LOW;
    }
    if let (Some(bid), Some(ask)) = (record.bid, record.ask)
        && bid > ask
    {
        score -= PENALTY_CROSSED_BOOK;
    }

    score.clamp(0.0, 1.0)
}

/// Relative spread in percent: `(ask - bid) / ask * 100` when both sides
/// are positive, else zero.
#[must_use]
pub fn relative_spread(bid: Decimal, ask: Decimal) -> Decimal {
    if bid > Decimal::ZERO && ask > Decimal::ZERO {
        (ask - bid) / ask * Decimal::from(100)
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;
    use crate::domain::market::CanonicalAsset;

    fn full_record() -> QuoteRecord {
        QuoteRecord {
            code: "BTCUSDT".to_string(),
            price: Some(dec!(50000)),
            volume: Some(dec!(12.5)),
            high: Some(dec!(51000)),
            low: Some(dec!(49000)),
            open: Some(dec!(49500)),
            bid: Some(dec!(49990)),
            ask: Some(dec!(50010)),
            change: Some(dec!(500)),
            change_percent: Some(dec!(1.01)),
            quote_volume: Some(dec!(625000)),
            observed_at: Some(Timestamp::parse("2026-03-02T12:00:00Z").unwrap()),
        }
    }

    #[test]
    fn clean_record_scores_one() {
        assert!((quality_score(&full_record()) - 1.0).abs() < f64::EPSILON);
    }

    #[test_case(|r: &mut QuoteRecord| r.price = None, 0.5; "missing price")]
    #[test_case(|r: &mut QuoteRecord| r.price = Some(dec!(0)), 0.5; "zero price")]
    #[test_case(|r: &mut QuoteRecord| r.price = Some(dec!(-1)), 0.5; "negative price")]
    #[test_case(|r: &mut QuoteRecord| r.volume = None, 0.8; "missing volume")]
    #[test_case(|r: &mut QuoteRecord| r.volume = Some(dec!(-2)), 0.8; "negative volume")]
    #[test_case(|r: &mut QuoteRecord| r.observed_at = None, 0.9; "missing time")]
    #[test_case(|r: &mut QuoteRecord| { r.high = Some(dec!(1)); r.low = Some(dec!(2)); }, 0.7; "high below low")]
    #[test_case(|r: &mut QuoteRecord| { r.bid = Some(dec!(3)); r.ask = Some(dec!(2)); }, 0.8; "crossed book")]
    fn single_defect_penalties(mutate: impl Fn(&mut QuoteRecord), expected: f64) {
        let mut record = full_record();
        mutate(&mut record);
        assert!((quality_score(&record) - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_volume_is_not_penalized() {
        let mut record = full_record();
        record.volume = Some(dec!(0));
        assert!((quality_score(&record) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_defects_clamp_to_zero() {
        let record = QuoteRecord {
            code: "X".to_string(),
            price: Some(dec!(-1)),
            volume: Some(dec!(-1)),
            high: Some(dec!(1)),
            low: Some(dec!(2)),
            bid: Some(dec!(3)),
            ask: Some(dec!(2)),
            ..QuoteRecord::default()
        };
        assert!(quality_score(&record) >= 0.0);
        assert!(quality_score(&record) < 1e-9);
    }

    #[test]
    fn spread_formula() {
        // (100 - 99) / 100 * 100 = 1%
        assert_eq!(relative_spread(dec!(99), dec!(100)), dec!(1));
    }

    #[test]
    fn spread_zero_when_one_side_missing() {
        assert_eq!(relative_spread(dec!(0), dec!(100)), Decimal::ZERO);
        assert_eq!(relative_spread(dec!(99), dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn observation_uses_fallback_time() {
        let mut record = full_record();
        record.observed_at = None;
        let fallback = Timestamp::parse("2026-03-02T12:00:05Z").unwrap();
        let asset = CanonicalAsset::new("asset-btc", "BTC", "Bitcoin");

        let obs =
            PriceObservation::from_record(SourceId::new("binance"), &asset, &record, fallback);
        assert_eq!(obs.observed_at, fallback);
        assert_eq!(obs.symbol, "BTC");
        assert!(obs.active);
    }

    #[test]
    fn observation_missing_price_defaults_to_zero() {
        let mut record = full_record();
        record.price = None;
        let asset = CanonicalAsset::new("asset-btc", "BTC", "Bitcoin");

        let obs = PriceObservation::from_record(
            SourceId::new("binance"),
            &asset,
            &record,
            Timestamp::now(),
        );
        assert_eq!(obs.price, Decimal::ZERO);
        assert!(obs.quality <= 0.5);
    }

    proptest! {
        #[test]
        fn quality_is_always_bounded(
            price in proptest::option::of(-1000.0..100_000.0f64),
            volume in proptest::option::of(-1000.0..100_000.0f64),
            high in proptest::option::of(0.0..100_000.0f64),
            low in proptest::option::of(0.0..100_000.0f64),
            bid in proptest::option::of(0.0..100_000.0f64),
            ask in proptest::option::of(0.0..100_000.0f64),
            has_time in proptest::bool::ANY,
        ) {
            let to_dec = |v: Option<f64>| v.and_then(|f| Decimal::try_from(f).ok());
            let record = QuoteRecord {
                code: "X".to_string(),
                price: to_dec(price),
                volume: to_dec(volume),
                high: to_dec(high),
                low: to_dec(low),
                bid: to_dec(bid),
                ask: to_dec(ask),
                observed_at: has_time.then(Timestamp::now),
                ..QuoteRecord::default()
            };

            let score = quality_score(&record);
            prop_assert!((0.0..=1.0).contains(&score));

            if !record.price.is_some_and(|p| p > Decimal::ZERO) {
                prop_assert!(score <= 0.5 + 1e-9);
            }
        }
    }
}
