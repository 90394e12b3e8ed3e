//! Time-Series Store Port (Driven Port)
//!
//! The system of record for observations, VWAP records and candles. This is
//! the pipeline's one critical sink: a failed write here fails the cycle.

use async_trait::async_trait;

use crate::domain::aggregate::{OhlcvCandle, VwapRecord};
use crate::domain::observation::PriceObservation;
use crate::domain::shared::Timestamp;

/// Time-series store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TimeseriesError {
    /// The store could not be reached.
    #[error("timeseries store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// The store rejected the batch.
    #[error("timeseries write rejected: {message}")]
    WriteRejected {
        /// Error details.
        message: String,
    },

    /// A range query failed.
    #[error("timeseries query failed: {message}")]
    QueryFailed {
        /// Error details.
        message: String,
    },
}

/// Port for the row-oriented time-series store.
///
/// Each insert is a single batched call per cycle per table; rows become
/// visible to concurrent readers one at a time, never as one giant
/// transaction.
#[async_trait]
pub trait TimeseriesStorePort: Send + Sync {
    /// Append a batch of price observations.
    async fn insert_observations(
        &self,
        rows: &[PriceObservation],
    ) -> Result<(), TimeseriesError>;

    /// Append a batch of VWAP records.
    async fn insert_vwap_records(&self, rows: &[VwapRecord]) -> Result<(), TimeseriesError>;

    /// Append a batch of OHLCV candles.
    async fn insert_candles(&self, rows: &[OhlcvCandle]) -> Result<(), TimeseriesError>;

    /// VWAP records with `start <= window_start < end`, across all assets.
    async fn vwap_in_range(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<VwapRecord>, TimeseriesError>;
}
