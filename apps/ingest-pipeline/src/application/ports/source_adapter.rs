//! Source Adapter Port (Driven Port)
//!
//! Interface for pulling quotes from one market-data source. Each concrete
//! source implements this single capability; there is no adapter hierarchy,
//! only interface conformance plus per-source configuration.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::market::{QuoteRecord, Source};

/// Source adapter error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Network-level failure reaching the source.
    #[error("network error: {message}")]
    Network {
        /// Error details.
        message: String,
    },

    /// The source answered with a protocol-level error.
    #[error("source rejected request ({status}): {message}")]
    Protocol {
        /// HTTP status or protocol code.
        status: u16,
        /// Error details.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {message}")]
    MalformedResponse {
        /// Error details.
        message: String,
    },

    /// The adapter's own internal deadline elapsed.
    #[error("source request timed out")]
    Timeout,
}

/// Port for fetching quotes from one source.
///
/// `fetch_quotes` must not block past a small internal timeout of the
/// adapter's own design; the extractor imposes an outer timeout regardless.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Descriptor of the source this adapter serves.
    fn source(&self) -> &Source;

    /// Fetch current quotes for the requested instrument codes.
    ///
    /// An empty `codes` slice requests every instrument the source offers.
    async fn fetch_quotes(&self, codes: &[String]) -> Result<Vec<QuoteRecord>, SourceError>;
}

/// One registry row: an adapter plus the instrument codes requested from it
/// each cycle.
#[derive(Clone)]
pub struct SourceBinding {
    /// The adapter.
    pub adapter: Arc<dyn SourceAdapter>,
    /// Codes to request each cycle (empty = everything the source offers).
    pub request_codes: Vec<String>,
}

impl SourceBinding {
    /// Bind an adapter with an explicit request universe.
    #[must_use]
    pub fn new(adapter: Arc<dyn SourceAdapter>, request_codes: Vec<String>) -> Self {
        Self {
            adapter,
            request_codes,
        }
    }

    /// Bind an adapter that is asked for everything it offers.
    #[must_use]
    pub fn all_instruments(adapter: Arc<dyn SourceAdapter>) -> Self {
        Self {
            adapter,
            request_codes: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SourceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBinding")
            .field("source", &self.adapter.source().id)
            .field("request_codes", &self.request_codes.len())
            .finish()
    }
}
