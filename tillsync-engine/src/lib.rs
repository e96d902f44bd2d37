//! Offline-resilient sync engine for tillsync.
//!
//! Serves point-of-sale reference and mutable data through a tiered cache
//! while disconnected, tolerates flaky networks with bounded retries, and
//! reconciles locally and remotely mutated records when connectivity
//! returns — without a server-side arbiter.
//!
//! # Components
//!
//! - **RetryingFetcher**: bounded retries, exponential backoff + jitter,
//!   hard per-attempt timeout
//! - **ConflictDetector**: pure field-by-field divergence detection
//! - **ResolutionEngine**: per-entity-type strategy tables with automatic
//!   merge rules; atomic resolution with a post-merge validation gate
//! - **PendingConflictStore**: conflicts parked for manual decisions
//! - **SyncCoordinator**: the pipeline — cache → fetch → detect →
//!   resolve → persist — plus offline fallback and reconnect replay
//!
//! # Pipeline
//!
//! A request consults the [`tillsync_cache::TieredCache`] first; on a miss
//! (or forced refresh) the fetcher calls the injected [`RemoteService`].
//! If the fetched copy diverges from a staged local edit, the detector and
//! resolution engine either auto-merge or park the conflict for manual
//! resolution, and the coordinator replays parked conflicts once the
//! [`Connectivity`] signal reports online again.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use tillsync_cache::{mock::MemoryDurableStore, TieredCache};
//! use tillsync_engine::{
//!     mock::MockRemote, AutoRule, Connectivity, StrategyTable, SyncConfig, SyncCoordinator,
//! };
//! use tillsync_types::AcceptAll;
//!
//! let cache = Arc::new(TieredCache::new(Arc::new(MemoryDurableStore::new())));
//! let strategies = HashMap::from([(
//!     "ingredient".to_string(),
//!     StrategyTable::new()
//!         .auto("current_stock", AutoRule::MaxNumber)
//!         .auto("last_updated", AutoRule::LatestTimestamp),
//! )]);
//!
//! let coordinator = SyncCoordinator::new(
//!     cache,
//!     Arc::new(MockRemote::new()),
//!     Arc::new(AcceptAll),
//!     strategies,
//!     Connectivity::new(true),
//!     SyncConfig::default(),
//! );
//! ```

mod connectivity;
mod coordinator;
mod detector;
mod error;
mod fetcher;
mod pending;
mod remote;
mod resolution;

pub use connectivity::Connectivity;
pub use coordinator::{Outcome, SyncConfig, SyncCoordinator, SyncPhase};
pub use detector::ConflictDetector;
pub use error::{SyncError, SyncResult};
pub use fetcher::{RetryConfig, RetryingFetcher};
pub use pending::PendingConflictStore;
pub use remote::{mock, RemoteService};
pub use resolution::{AutoRule, ManualChoice, Resolution, ResolutionEngine, StrategyTable};
