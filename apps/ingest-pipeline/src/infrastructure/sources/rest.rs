//! Generic REST source adapter.
//!
//! Every HTTP source shares one request path: rate-limit gate, GET, status
//! check, JSON decode, then a source-specific field-mapping hook that turns
//! the payload into `QuoteRecord`s. Per-source diversity lives entirely in
//! the configuration record and the mapper, not in an adapter hierarchy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::rate_limit::RateLimiter;
use crate::application::ports::{SourceAdapter, SourceError};
use crate::domain::market::{QuoteRecord, Source};

/// Source-specific payload mapping: JSON body in, quote records out.
pub type QuoteMapper =
    Arc<dyn Fn(&serde_json::Value) -> Result<Vec<QuoteRecord>, SourceError> + Send + Sync>;

/// Instrument-code formatting rules for one source.
///
/// Sources disagree on pair notation ("BTCUSDT", "BTC-USDT", "btc_usdt");
/// these rules build a source-local code from a base/quote pair.
#[derive(Debug, Clone)]
pub struct SymbolFormat {
    /// Separator between base and quote, if any.
    pub separator: Option<char>,
    /// Whether codes are upper-cased.
    pub uppercase: bool,
    /// Whether quote currency comes first (e.g. Upbit's "KRW-BTC").
    pub quote_first: bool,
}

impl Default for SymbolFormat {
    fn default() -> Self {
        Self {
            separator: None,
            uppercase: true,
            quote_first: false,
        }
    }
}

impl SymbolFormat {
    /// Build the source-local code for a base/quote pair.
    #[must_use]
    pub fn format_pair(&self, base: &str, quote: &str) -> String {
        let (first, second) = if self.quote_first {
            (quote, base)
        } else {
            (base, quote)
        };
        let joined = match self.separator {
            Some(sep) => format!("{first}{sep}{second}"),
            None => format!("{first}{second}"),
        };
        if self.uppercase {
            joined.to_uppercase()
        } else {
            joined.to_lowercase()
        }
    }
}

/// Configuration record for one REST source.
#[derive(Debug, Clone)]
pub struct RestSourceConfig {
    /// Source descriptor (id, name, rate hint).
    pub source: Source,
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Path of the bulk-ticker endpoint.
    pub tickers_path: String,
    /// Query parameter carrying the requested codes, when the source
    /// supports filtering (codes are joined with commas). `None` requests
    /// the full ticker set.
    pub codes_param: Option<String>,
    /// Code formatting rules.
    pub symbol_format: SymbolFormat,
    /// The adapter's own HTTP timeout (the extractor imposes an outer one).
    pub request_timeout: Duration,
}

impl RestSourceConfig {
    /// Create a config with default formatting and a 10 s request timeout.
    #[must_use]
    pub fn new(source: Source, base_url: impl Into<String>, tickers_path: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
            tickers_path: tickers_path.into(),
            codes_param: None,
            symbol_format: SymbolFormat::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// REST implementation of `SourceAdapter`.
pub struct RestSourceAdapter {
    config: RestSourceConfig,
    client: reqwest::Client,
    limiter: RateLimiter,
    mapper: QuoteMapper,
}

impl RestSourceAdapter {
    /// Build an adapter from its config and payload mapper.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: RestSourceConfig, mapper: QuoteMapper) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SourceError::Network {
                message: e.to_string(),
            })?;

        let limiter = RateLimiter::per_interval(config.source.rate_limit_hint);

        Ok(Self {
            config,
            client,
            limiter,
            mapper,
        })
    }

    fn tickers_url(&self) -> String {
        format!("{}{}", self.config.base_url, self.config.tickers_path)
    }
}

impl std::fmt::Debug for RestSourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSourceAdapter")
            .field("source", &self.config.source.id)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SourceAdapter for RestSourceAdapter {
    fn source(&self) -> &Source {
        &self.config.source
    }

    async fn fetch_quotes(&self, codes: &[String]) -> Result<Vec<QuoteRecord>, SourceError> {
        self.limiter.acquire().await;

        let mut request = self.client.get(self.tickers_url());
        if let (Some(param), false) = (&self.config.codes_param, codes.is_empty()) {
            request = request.query(&[(param.as_str(), codes.join(","))]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Network {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Protocol {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let payload: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| SourceError::MalformedResponse {
                    message: e.to_string(),
                })?;

        let records = (self.mapper)(&payload)?;
        tracing::debug!(
            source = %self.config.source.id,
            records = records.len(),
            "Fetched quotes"
        );
        Ok(records)
    }
}
