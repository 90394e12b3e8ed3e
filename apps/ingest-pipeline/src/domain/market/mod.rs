//! Market data records as they arrive from sources, and the identity
//! entities they resolve against.
//!
//! `QuoteRecord` is ephemeral — produced by a source adapter, consumed by
//! the transformer within the same cycle. `CanonicalAsset` and
//! `SymbolMapping` are long-lived and read-only from this pipeline's
//! perspective; an external maintenance job owns their write path.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{AssetId, SourceId, Timestamp};

/// Identity of a registered market-data source.
///
/// Immutable after registration; owned by the process-wide source registry
/// built at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Source identifier.
    pub id: SourceId,
    /// Human-readable name.
    pub display_name: String,
    /// Minimum interval between requests to this source.
    pub rate_limit_hint: Duration,
}

impl Source {
    /// Create a new source descriptor.
    #[must_use]
    pub fn new(id: impl Into<SourceId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            rate_limit_hint: Duration::from_millis(1000),
        }
    }

    /// Override the request-rate hint.
    #[must_use]
    pub const fn with_rate_limit(mut self, interval: Duration) -> Self {
        self.rate_limit_hint = interval;
        self
    }
}

/// A raw quote as reported by one source for one instrument.
///
/// Every numeric field is optional: sources routinely omit fields, and the
/// quality score charges for what is missing instead of rejecting the
/// record outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    /// Instrument code as known to the source (e.g. "BTCUSDT", "KRW-BTC").
    pub code: String,
    /// Last traded price.
    pub price: Option<Decimal>,
    /// Traded volume.
    pub volume: Option<Decimal>,
    /// Session high.
    pub high: Option<Decimal>,
    /// Session low.
    pub low: Option<Decimal>,
    /// Session open.
    pub open: Option<Decimal>,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Absolute price change over the source's reference period.
    pub change: Option<Decimal>,
    /// Percentage price change over the source's reference period.
    pub change_percent: Option<Decimal>,
    /// Volume denominated in the quote currency.
    pub quote_volume: Option<Decimal>,
    /// When the source observed this quote.
    pub observed_at: Option<Timestamp>,
}

impl QuoteRecord {
    /// Create an empty record for the given instrument code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }
}

/// The resolved, deduplicated identity of a tradable asset.
///
/// Read-only here; created and updated by the external identity-maintenance
/// job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalAsset {
    /// Asset identifier.
    pub id: AssetId,
    /// Canonical symbol (e.g. "BTC").
    pub symbol: String,
    /// Display name (e.g. "Bitcoin").
    pub name: String,
    /// External reference ids as (provider, id) pairs.
    pub external_refs: Vec<(String, String)>,
}

impl CanonicalAsset {
    /// Create a new canonical asset.
    #[must_use]
    pub fn new(
        id: impl Into<AssetId>,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            external_refs: Vec::new(),
        }
    }

    /// Attach an external reference id.
    #[must_use]
    pub fn with_external_ref(
        mut self,
        provider: impl Into<String>,
        external_id: impl Into<String>,
    ) -> Self {
        self.external_refs
            .push((provider.into(), external_id.into()));
        self
    }
}

/// An active association between a source-local instrument code and a
/// canonical asset.
///
/// The metadata store guarantees at most one active mapping per
/// (source, code) pair; the resolver relies on that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolMapping {
    /// Source the code belongs to.
    pub source_id: SourceId,
    /// Instrument code as known to the source.
    pub code: String,
    /// The resolved asset.
    pub asset: CanonicalAsset,
    /// Mapping confidence in [0, 1].
    pub confidence: f64,
    /// When this mapping was last verified by the maintenance job.
    pub last_verified: Timestamp,
}

impl SymbolMapping {
    /// Whether the mapping has not been re-verified within `horizon`.
    #[must_use]
    pub fn is_stale(&self, now: Timestamp, horizon: chrono::Duration) -> bool {
        now.duration_since(self.last_verified) > horizon
    }
}
