//! Durable store capability.
//!
//! The durable tier is an injected key/value capability (embedded KV
//! store, sqlite table, whatever the host provides). The cache serializes
//! `CacheEntry` JSON into it so expiry metadata survives a restart.

use crate::error::StorageResult;
use async_trait::async_trait;

/// Injected persistent key/value store used as the cache's durable tier.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads the raw bytes stored under `key`, if any.
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Writes raw bytes under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Removes the value under `key`. Removing a missing key is a no-op.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Removes every stored value.
    async fn clear(&self) -> StorageResult<()>;
}

/// In-memory stores for testing.
pub mod mock {
    use super::*;
    use crate::error::StorageError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// A `DurableStore` backed by an in-process map.
    #[derive(Debug, Clone, Default)]
    pub struct MemoryDurableStore {
        entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MemoryDurableStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored keys.
        pub fn len(&self) -> usize {
            self.entries.lock().unwrap().len()
        }

        /// Whether the store is empty.
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl DurableStore for MemoryDurableStore {
        async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
            self.entries.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn remove(&self, key: &str) -> StorageResult<()> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn clear(&self) -> StorageResult<()> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }
    }

    /// A store whose operations can be made to fail, for degradation tests.
    #[derive(Debug, Clone, Default)]
    pub struct FailingDurableStore {
        inner: MemoryDurableStore,
        failing: Arc<AtomicBool>,
    }

    impl FailingDurableStore {
        /// Creates a store that starts healthy.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes subsequent operations fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> StorageResult<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(StorageError::Backend("store unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DurableStore for FailingDurableStore {
        async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.check()?;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
            self.check()?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> StorageResult<()> {
            self.check()?;
            self.inner.remove(key).await
        }

        async fn clear(&self) -> StorageResult<()> {
            self.check()?;
            self.inner.clear().await
        }
    }
}
