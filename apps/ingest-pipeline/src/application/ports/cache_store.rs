//! Cache Store Port (Driven Port)
//!
//! Low-latency read views only — never the system of record. A failed cache
//! write is logged and reflected in the load report but never fails a cycle.

use std::time::Duration;

use async_trait::async_trait;

/// Cache store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be reached.
    #[error("cache unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// A value could not be encoded for the cache.
    #[error("cache encoding failed: {message}")]
    Encoding {
        /// Error details.
        message: String,
    },
}

/// Port for the key/value cache.
#[async_trait]
pub trait CacheStorePort: Send + Sync {
    /// Set `key` to `value` with a time-to-live.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), CacheError>;

    /// Set one field of the hash at `key`.
    async fn hash_set_field(&self, key: &str, field: &str, value: &str)
    -> Result<(), CacheError>;

    /// Apply a time-to-live to an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;
}
