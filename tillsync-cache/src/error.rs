//! Error types for the cache layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
///
/// Tier failures are absorbed by `TieredCache` (the lookup degrades to the
/// remaining tiers); these errors only surface from direct `DurableStore`
/// use.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
