//! The tiered cache.

use crate::durable::DurableStore;
use crate::entry::{CacheEntry, Tier};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tillsync_types::Timestamp;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Layered key/value cache: memory → session → durable.
///
/// Lookups consult tiers fastest-first; the first tier holding a
/// non-expired entry wins, and the hit is promoted into the faster tiers
/// (read-through). Writes go to all tiers together with a shared expiry.
///
/// A failing tier never aborts a lookup or write — the operation degrades
/// to the remaining tiers and the failure is logged. Safe for concurrent
/// use without external locking.
pub struct TieredCache {
    memory: RwLock<HashMap<String, CacheEntry>>,
    session: RwLock<HashMap<String, CacheEntry>>,
    durable: Arc<dyn DurableStore>,
}

impl TieredCache {
    /// Creates a cache over the given durable tier.
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            session: RwLock::new(HashMap::new()),
            durable,
        }
    }

    /// Looks up a fresh value. Returns `None` on a total miss or when
    /// every tier's entry has expired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key, false).await
    }

    /// Looks up a value, accepting expired entries. Used only while
    /// offline, when a stale value beats no value. Expired entries are
    /// not promoted between tiers.
    pub async fn get_ignoring_expiration(&self, key: &str) -> Option<Value> {
        self.lookup(key, true).await
    }

    async fn lookup(&self, key: &str, accept_expired: bool) -> Option<Value> {
        let now = Timestamp::now();

        if let Some(entry) = self.memory.read().await.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            if accept_expired {
                debug!(key, tier = ?Tier::Memory, "serving expired entry");
                return Some(entry.value.clone());
            }
        }

        if let Some(entry) = self.session.read().await.get(key).cloned() {
            if !entry.is_expired(now) {
                self.memory
                    .write()
                    .await
                    .insert(key.to_string(), entry.clone());
                return Some(entry.value);
            }
            if accept_expired {
                debug!(key, tier = ?Tier::Session, "serving expired entry");
                return Some(entry.value);
            }
        }

        match self.durable.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<CacheEntry>(&bytes) {
                Ok(entry) => {
                    if !entry.is_expired(now) {
                        self.memory
                            .write()
                            .await
                            .insert(key.to_string(), entry.clone());
                        self.session
                            .write()
                            .await
                            .insert(key.to_string(), entry.clone());
                        return Some(entry.value);
                    }
                    if accept_expired {
                        debug!(key, tier = ?Tier::Durable, "serving expired entry");
                        return Some(entry.value);
                    }
                    None
                }
                Err(e) => {
                    warn!(key, error = %e, "durable tier held undecodable entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "durable tier read failed, degrading to miss");
                None
            }
        }
    }

    /// Writes a value to all tiers with `expires_at = now + ttl_millis`.
    ///
    /// A durable-tier failure is logged, not escalated: the faster tiers
    /// still hold the value, and reads always prefer the freshest tier.
    pub async fn set(&self, key: &str, value: Value, ttl_millis: u64) {
        let entry = CacheEntry::new(key, value, Timestamp::now(), ttl_millis);

        self.memory
            .write()
            .await
            .insert(key.to_string(), entry.clone());
        self.session
            .write()
            .await
            .insert(key.to_string(), entry.clone());

        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                if let Err(e) = self.durable.set(key, bytes).await {
                    warn!(key, error = %e, "durable tier write failed");
                }
            }
            Err(e) => warn!(key, error = %e, "failed to serialize cache entry"),
        }
    }

    /// Removes a key from all tiers.
    pub async fn remove(&self, key: &str) {
        self.memory.write().await.remove(key);
        self.session.write().await.remove(key);
        if let Err(e) = self.durable.remove(key).await {
            warn!(key, error = %e, "durable tier remove failed");
        }
    }

    /// Removes every key from all tiers.
    pub async fn clear(&self) {
        self.memory.write().await.clear();
        self.session.write().await.clear();
        if let Err(e) = self.durable.clear().await {
            warn!(error = %e, "durable tier clear failed");
        }
    }
}
