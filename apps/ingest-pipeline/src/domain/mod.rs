//! Domain layer - data model and aggregation math, no I/O.

/// Derived artifacts: VWAP records and OHLCV candles.
pub mod aggregate;

/// Pipeline cycle metadata.
pub mod cycle;

/// Raw market records and identity entities.
pub mod market;

/// Canonical price observations and quality scoring.
pub mod observation;

/// Shared value objects (ids, timestamps).
pub mod shared;
