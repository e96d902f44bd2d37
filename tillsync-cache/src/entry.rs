//! Cache entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tillsync_types::Timestamp;

/// The cache tier an entry was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    /// Fast in-process map; lost on restart.
    Memory,
    /// Session-scoped map; lost when the session ends.
    Session,
    /// Injected durable store; survives restarts.
    Durable,
}

/// One cached value with its expiry.
///
/// Owned exclusively by `TieredCache`; entries are only created and
/// mutated through its `set`/`remove` API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// The cached value.
    pub value: Value,
    /// When the entry stops being fresh.
    pub expires_at: Timestamp,
}

impl CacheEntry {
    /// Creates an entry expiring `ttl_millis` from `now`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: Value, now: Timestamp, ttl_millis: u64) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at: now.plus_millis(ttl_millis),
        }
    }

    /// Whether the entry has expired as of `now`.
    ///
    /// A zero TTL makes `expires_at == set time`, so such entries are
    /// expired from the moment they are written.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}
