//! Application services: the pipeline stages and their coordinator.

mod aggregator;
mod coordinator;
mod extractor;
mod loader;
mod resolver;
mod transformer;

pub use aggregator::{
    Aggregator, AggregateError, CandlePassReport, DEFAULT_VWAP_WINDOW_SECS,
};
pub use coordinator::{CycleOutcome, PipelineCoordinator};
pub use extractor::{
    DEFAULT_EXTRACT_TIMEOUT, ExtractionReport, Extractor, SourceOutcome,
};
pub use loader::{
    DEFAULT_SINK_TIMEOUT, LoadReport, Loader, LoaderError, SinkKind, SinkOutcome,
};
pub use resolver::{
    DEFAULT_STALE_HORIZON_DAYS, DEFAULT_UNMAPPED_TTL, IdentityResolver, ResolutionOutcome,
};
pub use transformer::{
    DEFAULT_BATCH_SIZE, DEFAULT_RESOLUTION_WARN_THRESHOLD, SourceTransformStats,
    TransformReport, Transformer,
};
