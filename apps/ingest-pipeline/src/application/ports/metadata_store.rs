//! Metadata Store Port (Driven Port)
//!
//! Relational metadata: symbol mappings and canonical assets. Read-mostly
//! from this pipeline; the external mapping-maintenance job owns the write
//! path for mappings and assets.

use async_trait::async_trait;

use crate::domain::market::SymbolMapping;
use crate::domain::shared::{AssetId, SourceId};

/// Metadata store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    /// The store could not be reached.
    #[error("metadata store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// A query failed.
    #[error("metadata query failed: {message}")]
    QueryFailed {
        /// Error details.
        message: String,
    },

    /// An update was rejected.
    #[error("metadata update rejected: {message}")]
    UpdateRejected {
        /// Error details.
        message: String,
    },
}

/// Port for the relational metadata store.
#[async_trait]
pub trait MetadataStorePort: Send + Sync {
    /// Active mappings for the given source, restricted to `codes`.
    ///
    /// One batched lookup; codes without an active mapping are simply
    /// absent from the result. At most one mapping is returned per code.
    async fn active_mappings(
        &self,
        source_id: &SourceId,
        codes: &[String],
    ) -> Result<Vec<SymbolMapping>, MetadataError>;

    /// Touch `updated_at` for the given assets; returns how many matched.
    async fn touch_assets(&self, asset_ids: &[AssetId]) -> Result<usize, MetadataError>;

    /// Write a durable audit entry for a recurring unmapped code.
    async fn record_unmapped_audit(
        &self,
        source_id: &SourceId,
        code: &str,
        occurrences: u64,
    ) -> Result<(), MetadataError>;
}
