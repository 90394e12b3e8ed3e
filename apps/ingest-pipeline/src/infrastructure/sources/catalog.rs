//! Built-in source catalog.
//!
//! Ships the field mappers for a couple of well-known public ticker
//! endpoints. Everything here is configuration plus a mapping function;
//! the shared REST adapter owns the request path.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::Value;

use super::rest::{QuoteMapper, RestSourceAdapter, RestSourceConfig};
use crate::application::ports::{SourceBinding, SourceError};
use crate::domain::market::{QuoteRecord, Source};
use crate::domain::shared::Timestamp;

/// All built-in sources. Adapters that fail to construct are skipped with
/// a warning rather than aborting startup.
#[must_use]
pub fn builtin_sources() -> Vec<SourceBinding> {
    [binance(), kraken()]
        .into_iter()
        .filter_map(|result| match result {
            Ok(binding) => Some(binding),
            Err(error) => {
                tracing::warn!(error = %error, "Skipping unavailable built-in source");
                None
            }
        })
        .collect()
}

/// Binance 24-hour ticker endpoint.
pub fn binance() -> Result<SourceBinding, SourceError> {
    let config = RestSourceConfig {
        codes_param: Some("symbols".to_string()),
        ..RestSourceConfig::new(
            Source::new("binance", "Binance").with_rate_limit(Duration::from_millis(50)),
            "https://api.binance.com",
            "/api/v3/ticker/24hr",
        )
    };

    let adapter = RestSourceAdapter::new(config, binance_mapper())?;
    Ok(SourceBinding::all_instruments(Arc::new(adapter)))
}

/// Kraken public ticker endpoint.
pub fn kraken() -> Result<SourceBinding, SourceError> {
    let config = RestSourceConfig::new(
        Source::new("kraken", "Kraken").with_rate_limit(Duration::from_secs(1)),
        "https://api.kraken.com",
        "/0/public/Ticker",
    );

    let adapter = RestSourceAdapter::new(config, kraken_mapper())?;
    Ok(SourceBinding::all_instruments(Arc::new(adapter)))
}

/// Maps the Binance `/api/v3/ticker/24hr` payload: an array of objects
/// with string-encoded decimal fields (a single object when one symbol
/// was requested).
fn binance_mapper() -> QuoteMapper {
    Arc::new(|payload: &Value| {
        let entries: Vec<&Value> = match payload {
            Value::Array(items) => items.iter().collect(),
            single @ Value::Object(_) => vec![single],
            _ => {
                return Err(SourceError::MalformedResponse {
                    message: "expected a ticker object or array".to_string(),
                });
            }
        };

        entries
            .into_iter()
            .map(|entry| {
                let code = string_field(entry, "symbol")?;
                Ok(QuoteRecord {
                    price: decimal_string(entry, "lastPrice"),
                    volume: decimal_string(entry, "volume"),
                    high: decimal_string(entry, "highPrice"),
                    low: decimal_string(entry, "lowPrice"),
                    open: decimal_string(entry, "openPrice"),
                    bid: decimal_string(entry, "bidPrice"),
                    ask: decimal_string(entry, "askPrice"),
                    change: decimal_string(entry, "priceChange"),
                    change_percent: decimal_string(entry, "priceChangePercent"),
                    quote_volume: decimal_string(entry, "quoteVolume"),
                    observed_at: entry
                        .get("closeTime")
                        .and_then(Value::as_i64)
                        .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
                        .map(Timestamp::new),
                    ..QuoteRecord::new(code)
                })
            })
            .collect()
    })
}

/// Maps the Kraken `/0/public/Ticker` payload: `result` is an object keyed
/// by pair code, each entry holding positional arrays (`c` last trade,
/// `v` volume, `h`/`l` day high/low, `b`/`a` best bid/ask, `o` open).
fn kraken_mapper() -> QuoteMapper {
    Arc::new(|payload: &Value| {
        if let Some(errors) = payload.get("error").and_then(Value::as_array)
            && !errors.is_empty()
        {
            return Err(SourceError::Protocol {
                status: 200,
                message: errors
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let result = payload
            .get("result")
            .and_then(Value::as_object)
            .ok_or_else(|| SourceError::MalformedResponse {
                message: "missing result object".to_string(),
            })?;

        Ok(result
            .iter()
            .map(|(code, data)| QuoteRecord {
                price: nested_decimal(data, "c", 0),
                volume: nested_decimal(data, "v", 1),
                high: nested_decimal(data, "h", 1),
                low: nested_decimal(data, "l", 1),
                open: data
                    .get("o")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok()),
                bid: nested_decimal(data, "b", 0),
                ask: nested_decimal(data, "a", 0),
                ..QuoteRecord::new(code.clone())
            })
            .collect())
    })
}

fn string_field(entry: &Value, key: &str) -> Result<String, SourceError> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SourceError::MalformedResponse {
            message: format!("entry without {key}"),
        })
}

fn decimal_string(entry: &Value, key: &str) -> Option<Decimal> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn nested_decimal(entry: &Value, key: &str, index: usize) -> Option<Decimal> {
    entry
        .get(key)
        .and_then(|v| v.get(index))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}
