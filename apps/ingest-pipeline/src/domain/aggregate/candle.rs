//! OHLCV candle construction over the VWAP series.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::vwap::VwapRecord;
use crate::domain::shared::{AssetId, Timestamp};

/// Supported candle intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleInterval {
    /// One minute.
    M1,
    /// Five minutes.
    M5,
    /// Fifteen minutes.
    M15,
    /// One hour.
    H1,
    /// Four hours.
    H4,
    /// One day.
    D1,
}

impl CandleInterval {
    /// All intervals the pipeline builds by default.
    pub const ALL: [Self; 6] = [Self::M1, Self::M5, Self::M15, Self::H1, Self::H4, Self::D1];

    /// Interval label as stored with each candle.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }

    /// Bucket width in seconds.
    #[must_use]
    pub const fn width_secs(self) -> u64 {
        match self {
            Self::M1 => 60,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::H1 => 3_600,
            Self::H4 => 14_400,
            Self::D1 => 86_400,
        }
    }

    /// Start of the bucket containing `ts`.
    #[must_use]
    pub fn bucket_start(self, ts: Timestamp) -> Timestamp {
        ts.floor_to_secs(self.width_secs())
    }

    /// Parse an interval label ("1m", "5m", "15m", "1h", "4h", "1d").
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == label)
    }
}

impl std::fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a candle's input data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleProvenance {
    /// Built directly from per-source quote observations.
    RawQuotes,
    /// Built from the cross-source VWAP series.
    VwapSeries,
}

/// An open/high/low/close/volume summary for one asset and bucket.
///
/// Append-only: candles are never revised once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvCandle {
    /// Asset this candle summarizes.
    pub asset_id: AssetId,
    /// Bucket interval.
    pub interval: CandleInterval,
    /// Start of the bucket.
    pub bucket_start: Timestamp,
    /// Price at the earliest contributing point.
    pub open: Decimal,
    /// Maximum price in the bucket.
    pub high: Decimal,
    /// Minimum price in the bucket.
    pub low: Decimal,
    /// Price at the latest contributing point.
    pub close: Decimal,
    /// Total volume across contributing points.
    pub volume: Decimal,
    /// Number of contributing points.
    pub point_count: u32,
    /// Input-data provenance tag.
    pub provenance: CandleProvenance,
}

/// Build one candle for `asset_id` from the VWAP points inside a bucket.
///
/// Open and close follow window-start time order; high and low are the
/// extremes of the VWAP prices; volume sums each point's total volume.
/// An empty bucket yields `None` — absence, not a synthetic flat candle.
#[must_use]
pub fn candle_from_vwap(
    asset_id: &AssetId,
    interval: CandleInterval,
    bucket_start: Timestamp,
    points: &[&VwapRecord],
) -> Option<OhlcvCandle> {
    let first = points.iter().min_by_key(|p| p.window_start)?;
    let last = points.iter().max_by_key(|p| p.window_start)?;

    let mut high = first.vwap_price;
    let mut low = first.vwap_price;
    let mut volume = Decimal::ZERO;
    for point in points {
        high = high.max(point.vwap_price);
        low = low.min(point.vwap_price);
        volume += point.total_volume;
    }

    Some(OhlcvCandle {
        asset_id: asset_id.clone(),
        interval,
        bucket_start,
        open: first.vwap_price,
        high,
        low,
        close: last.vwap_price,
        volume,
        point_count: u32::try_from(points.len()).unwrap_or(u32::MAX),
        provenance: CandleProvenance::VwapSeries,
    })
}
