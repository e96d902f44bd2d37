//! Error types for the sync layer.

use thiserror::Error;
use tillsync_types::EntityKey;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error from the remote service.
    #[error("network error: {0}")]
    Network(String),

    /// A single fetch attempt exceeded its timeout.
    #[error("timeout waiting for remote operation")]
    Timeout,

    /// The retry budget for a fetch was exhausted.
    #[error("fetch of {label} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Data-type label of the failed fetch.
        label: String,
        /// How many attempts were made.
        attempts: u32,
        /// The final attempt's error.
        #[source]
        source: Box<SyncError>,
    },

    /// A snapshot failed schema validation.
    #[error("validation failed for {entity_type}: {}", errors.join("; "))]
    Validation {
        /// Entity type being validated.
        entity_type: String,
        /// Validator-reported reasons.
        errors: Vec<String>,
    },

    /// A conflict could not be resolved (merge produced an invalid
    /// snapshot, or a forced resolution was rejected).
    #[error("conflict unresolvable for {key}: {reason}")]
    ConflictUnresolvable {
        /// The conflicted entity.
        key: EntityKey,
        /// Why resolution failed.
        reason: String,
    },

    /// Offline with no cached copy to fall back on.
    #[error("offline and no cached copy for {0}")]
    Offline(EntityKey),

    /// No pending conflict exists for the entity.
    #[error("no pending conflict for {0}")]
    NoPendingConflict(EntityKey),

    /// Storage error from the cache layer.
    #[error("storage error: {0}")]
    Storage(#[from] tillsync_cache::StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An internal channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Whether a fetch attempt failing with this error is worth retrying.
    ///
    /// Classification follows the error's rendered message: transient
    /// transport failures mention one of the retryable keywords; anything
    /// else (validation, bad request, auth) aborts the retry loop.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        const RETRYABLE: [&str; 4] = ["network", "timeout", "fetch", "connection"];
        let message = self.to_string().to_lowercase();
        RETRYABLE.iter().any(|kw| message.contains(kw))
    }
}
