//! Store adapters.

mod memory;

pub use memory::{InMemoryCacheStore, InMemoryMetadataStore, InMemoryTimeseriesStore};
