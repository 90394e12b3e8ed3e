//! Derived time-series artifacts: VWAP records and OHLCV candles.

mod candle;
mod vwap;

pub use candle::{CandleInterval, CandleProvenance, OhlcvCandle, candle_from_vwap};
pub use vwap::{VwapRecord, compute_vwap};
