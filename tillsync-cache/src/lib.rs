//! Tiered offline cache for tillsync.
//!
//! Serves reference and mutable data while disconnected, from three
//! layered tiers:
//!
//! - **Memory** — fast in-process map, lost on restart
//! - **Session** — session-scoped map, lost when the session ends
//! - **Durable** — injected [`DurableStore`] capability, survives restarts
//!
//! Reads consult tiers fastest-first and promote hits (read-through);
//! writes land in all tiers together. Every entry carries an expiry, and
//! [`TieredCache::get_ignoring_expiration`] lets the sync layer fall back
//! to stale data when a fresh fetch is impossible.
//!
//! There is no capacity eviction here beyond TTL expiry; tier capacity
//! limits belong to the backing store implementations.

mod cache;
mod durable;
mod entry;
mod error;

pub use cache::TieredCache;
pub use durable::{mock, DurableStore};
pub use entry::{CacheEntry, Tier};
pub use error::{StorageError, StorageResult};
