//! Port Interfaces
//!
//! Interfaces (ports) for external systems following the Hexagonal
//! Architecture pattern. These are the contracts that infrastructure
//! adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SourceAdapter`: one market-data source's quote capability
//! - `TimeseriesStorePort`: the critical system of record
//! - `CacheStorePort`: TTL'd low-latency read views
//! - `MetadataStorePort`: symbol mappings and canonical assets

mod cache_store;
mod metadata_store;
mod source_adapter;
mod timeseries_store;

pub use cache_store::{CacheError, CacheStorePort};
pub use metadata_store::{MetadataError, MetadataStorePort};
pub use source_adapter::{SourceAdapter, SourceBinding, SourceError};
pub use timeseries_store::{TimeseriesError, TimeseriesStorePort};
