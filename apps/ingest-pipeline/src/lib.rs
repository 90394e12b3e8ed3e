#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Conflux Ingest Pipeline - Multi-Source Price Consolidation
//!
//! Pulls price quotes from many independent market-data sources, resolves
//! each source's local instrument code to a canonical asset identity, and
//! produces derived time-series artifacts (VWAP, multi-resolution OHLCV
//! candles) for downstream storage and querying.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Data model and aggregation math
//!   - `market`: Sources, raw quotes, canonical assets, symbol mappings
//!   - `observation`: Price observations and quality scoring
//!   - `aggregate`: VWAP and candle construction
//!   - `cycle`: Cycle-run records
//!
//! - **Application**: Pipeline stages and port definitions
//!   - `ports`: Interfaces for sources and the three stores
//!   - `services`: Extractor, IdentityResolver, Transformer, Loader,
//!     Aggregator, PipelineCoordinator
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `sources`: REST adapter, rate limiting, health probe
//!   - `persistence`: In-memory store adapters
//!   - `scheduler`: Periodic trigger facility
//!   - `config`: Environment configuration
//!   - `telemetry` / `metrics`: Tracing and Prometheus
//!
//! # Data Flow
//!
//! ```text
//! Source A ──┐
//!            │    ┌───────────┐   ┌─────────────┐   ┌────────┐
//! Source B ──┼───►│ Extractor │──►│ Transformer │──►│ Loader │──► stores
//!            │    └───────────┘   └─────────────┘   └───┬────┘
//! Source N ──┘                                          │ critical ok
//!                                                 ┌─────▼──────┐
//!                                 candle cadences │ Aggregator │
//!                                ────────────────►│ VWAP/OHLCV │
//!                                                 └────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Data model and aggregation math with no I/O.
pub mod domain;

/// Application layer - Pipeline stages and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::aggregate::{
    CandleInterval, CandleProvenance, OhlcvCandle, VwapRecord, candle_from_vwap, compute_vwap,
};
pub use domain::cycle::{CycleRun, CycleStatus, StageCounts};
pub use domain::market::{CanonicalAsset, QuoteRecord, Source, SymbolMapping};
pub use domain::observation::{PriceObservation, quality_score, relative_spread};
pub use domain::shared::{AssetId, CycleId, SourceId, Timestamp};

// Ports
pub use application::ports::{
    CacheError, CacheStorePort, MetadataError, MetadataStorePort, SourceAdapter, SourceBinding,
    SourceError, TimeseriesError, TimeseriesStorePort,
};

// Pipeline services
pub use application::services::{
    AggregateError, Aggregator, CandlePassReport, CycleOutcome, ExtractionReport, Extractor,
    IdentityResolver, LoadReport, Loader, LoaderError, PipelineCoordinator, TransformReport,
    Transformer,
};

// Infrastructure (for integration tests and the binary)
pub use infrastructure::config::{ConfigError, PipelineSettings};
pub use infrastructure::persistence::{
    InMemoryCacheStore, InMemoryMetadataStore, InMemoryTimeseriesStore,
};
pub use infrastructure::scheduler::PeriodicTrigger;
pub use infrastructure::sources::{
    RateLimiter, RestSourceAdapter, RestSourceConfig, SourceHealth, SymbolFormat, check_sources,
};
