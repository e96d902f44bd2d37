//! Sync coordination.
//!
//! `SyncCoordinator` wires the pipeline together: cache lookup → retrying
//! fetch → conflict detection → resolution → persistence. It owns no I/O
//! of its own; every collaborator (cache, remote service, validator,
//! connectivity) is constructor-injected.
//!
//! Requests for different entities run fully in parallel; work on a single
//! entity is serialized by a per-entity mutex, so a second conflict
//! arriving while one is resolving waits instead of racing. Dropping a
//! `get()` future cancels outstanding retries without corrupting cache or
//! pending-conflict state — any committed cache write stands.

use crate::connectivity::Connectivity;
use crate::detector::ConflictDetector;
use crate::error::{SyncError, SyncResult};
use crate::fetcher::{RetryConfig, RetryingFetcher};
use crate::pending::PendingConflictStore;
use crate::remote::RemoteService;
use crate::resolution::{ManualChoice, Resolution, ResolutionEngine, StrategyTable};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tillsync_cache::TieredCache;
use tillsync_types::{Conflict, EntityKey, EntitySnapshot, PendingConflict, Validator};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Terminal phase of a request.
///
/// The pipeline's transitional states (fetching, detecting, resolving)
/// live in control flow and logs; callers only observe where a request
/// settled. Fetch failure is an error, not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Served from cache or freshly fetched with no divergence.
    Cached,
    /// Conflict fully auto-resolved and persisted.
    Resolved,
    /// Parked for manual resolution; stable until `resolve` is called.
    PendingManual,
}

/// Result of a `get` request: the snapshot served and the terminal phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The snapshot the caller should use.
    pub snapshot: EntitySnapshot,
    /// The phase the request terminated in.
    pub phase: SyncPhase,
}

/// Coordinator configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// TTL for cached snapshots, in milliseconds.
    pub cache_ttl_millis: u64,
    /// Retry behavior for remote fetches.
    pub retry: RetryConfig,
    /// Capacity of the conflict event channel.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl_millis: 5 * 60 * 1000,
            retry: RetryConfig::default(),
            event_capacity: 64,
        }
    }
}

/// Orchestrates offline-resilient entity access.
pub struct SyncCoordinator {
    cache: Arc<TieredCache>,
    remote: Arc<dyn RemoteService>,
    validator: Arc<dyn Validator>,
    detector: ConflictDetector,
    engine: ResolutionEngine,
    fetcher: RetryingFetcher,
    pending: Arc<PendingConflictStore>,
    connectivity: Connectivity,
    config: SyncConfig,
    /// Unsynced local mutations, cleared once an entity reaches
    /// `Cached`/`Resolved`.
    staged: RwLock<HashMap<EntityKey, EntitySnapshot>>,
    /// Per-entity serialization of the request/resolve pipeline.
    entity_locks: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
    conflict_tx: broadcast::Sender<PendingConflict>,
}

impl SyncCoordinator {
    /// Creates a coordinator over injected collaborators and per-type
    /// strategy tables.
    pub fn new(
        cache: Arc<TieredCache>,
        remote: Arc<dyn RemoteService>,
        validator: Arc<dyn Validator>,
        strategies: HashMap<String, StrategyTable>,
        connectivity: Connectivity,
        config: SyncConfig,
    ) -> Self {
        let (conflict_tx, _) = broadcast::channel(config.event_capacity);
        Self {
            cache,
            remote,
            validator: validator.clone(),
            detector: ConflictDetector::new(),
            engine: ResolutionEngine::new(strategies, validator),
            fetcher: RetryingFetcher::new(config.retry.clone()),
            pending: Arc::new(PendingConflictStore::new()),
            connectivity,
            config,
            staged: RwLock::new(HashMap::new()),
            entity_locks: Mutex::new(HashMap::new()),
            conflict_tx,
        }
    }

    /// Fetches an entity, preferring cache unless `force_refresh`.
    ///
    /// Offline, an expired cached copy is served rather than raising a
    /// network error; a total miss offline is [`SyncError::Offline`]. No
    /// network attempts are made while offline: a transition to offline
    /// during an in-flight fetch abandons the remaining retries and falls
    /// back to the cache the same way.
    pub async fn get(
        &self,
        entity_type: &str,
        entity_id: &str,
        force_refresh: bool,
    ) -> SyncResult<Outcome> {
        let key = EntityKey::new(entity_type, entity_id);
        let lock = self.entity_lock(&key).await;
        let _guard = lock.lock().await;

        if !force_refresh {
            if let Some(value) = self.cache.get(&key.cache_key()).await {
                let snapshot: EntitySnapshot = serde_json::from_value(value)?;
                debug!(key = %key, "cache hit, skipping network");
                return Ok(Outcome {
                    snapshot,
                    phase: SyncPhase::Cached,
                });
            }
        }

        if !self.connectivity.is_online() {
            return match self.cache.get_ignoring_expiration(&key.cache_key()).await {
                Some(value) => {
                    info!(key = %key, "offline, serving possibly stale cache entry");
                    Ok(Outcome {
                        snapshot: serde_json::from_value(value)?,
                        phase: SyncPhase::Cached,
                    })
                }
                None => Err(SyncError::Offline(key)),
            };
        }

        debug!(key = %key, "fetching from remote");
        let mut offline_rx = self.connectivity.subscribe();
        let operation = format!("{}.get", key.entity_type);
        let remote = Arc::clone(&self.remote);
        let id = key.entity_id.clone();
        let fetch = self.fetcher.fetch(&key.entity_type, || {
            let remote = Arc::clone(&remote);
            let operation = operation.clone();
            let id = id.clone();
            async move { remote.call(&operation, json!({ "id": id })).await }
        });
        let fetched = tokio::select! {
            result = fetch => result?,
            _ = went_offline(&mut offline_rx) => {
                info!(key = %key, "went offline mid-fetch, falling back to cache");
                return match self.cache.get_ignoring_expiration(&key.cache_key()).await {
                    Some(value) => Ok(Outcome {
                        snapshot: serde_json::from_value(value)?,
                        phase: SyncPhase::Cached,
                    }),
                    None => Err(SyncError::Offline(key.clone())),
                };
            }
        };
        let remote_snapshot: EntitySnapshot = serde_json::from_value(fetched)?;

        let staged = self.staged.read().await.get(&key).cloned();
        match staged {
            None => {
                self.require_valid(&remote_snapshot)?;
                self.persist(&key, &remote_snapshot).await?;
                Ok(Outcome {
                    snapshot: remote_snapshot,
                    phase: SyncPhase::Cached,
                })
            }
            Some(local_snapshot) => {
                self.reconcile(&key, local_snapshot, remote_snapshot).await
            }
        }
    }

    /// Records an unsynced local mutation.
    ///
    /// The edit is written through the cache so reads observe it, and
    /// remembered so the next refresh of the entity runs the conflict
    /// pipeline against whatever the remote returns.
    pub async fn stage_local(&self, snapshot: EntitySnapshot) -> SyncResult<()> {
        let key = snapshot.key();
        let lock = self.entity_lock(&key).await;
        let _guard = lock.lock().await;

        self.require_valid(&snapshot)?;
        self.cache
            .set(
                &key.cache_key(),
                serde_json::to_value(&snapshot)?,
                self.config.cache_ttl_millis,
            )
            .await;
        self.staged.write().await.insert(key.clone(), snapshot);
        debug!(key = %key, "staged local edit");
        Ok(())
    }

    /// Applies an explicit decision to a parked conflict.
    pub async fn resolve(&self, key: &EntityKey, choice: ManualChoice) -> SyncResult<EntitySnapshot> {
        let lock = self.entity_lock(key).await;
        let _guard = lock.lock().await;

        let pending = self
            .pending
            .get(key)
            .await
            .ok_or_else(|| SyncError::NoPendingConflict(key.clone()))?;

        let snapshot = self.engine.resolve_with(&pending.conflict, choice)?;
        self.persist(key, &snapshot).await?;
        self.pending.remove(key).await;
        info!(key = %key, "pending conflict manually resolved");
        Ok(snapshot)
    }

    /// The shared pending-conflict store, for UI listings.
    #[must_use]
    pub fn pending_store(&self) -> Arc<PendingConflictStore> {
        Arc::clone(&self.pending)
    }

    /// Subscribes to conflicts entering the pending-manual state.
    pub fn subscribe_conflicts(&self) -> broadcast::Receiver<PendingConflict> {
        self.conflict_tx.subscribe()
    }

    /// Lists conflicts awaiting manual resolution.
    pub async fn list_pending(&self) -> Vec<PendingConflict> {
        self.pending.all().await
    }

    /// Re-drives every parked conflict through resolution. Returns how
    /// many resolved fully. Entities are independent; no cross-entity
    /// ordering is guaranteed.
    pub async fn replay_pending(&self) -> usize {
        let parked = self.pending.all().await;
        if parked.is_empty() {
            return 0;
        }
        info!(count = parked.len(), "replaying pending conflicts");

        let mut resolved = 0;
        for entry in parked {
            let key = entry.key().clone();
            let lock = self.entity_lock(&key).await;
            let _guard = lock.lock().await;

            match self.engine.resolve(&entry.conflict) {
                Ok(Resolution::Merged(snapshot)) => {
                    if let Err(e) = self.persist(&key, &snapshot).await {
                        warn!(key = %key, error = %e, "failed to persist replayed resolution");
                        continue;
                    }
                    self.pending.remove(&key).await;
                    resolved += 1;
                }
                Ok(Resolution::Manual(_)) => {
                    debug!(key = %key, "conflict still requires manual resolution");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "replayed conflict unresolvable");
                }
            }
        }
        resolved
    }

    /// Spawns a task that batch-replays pending conflicts on every
    /// offline→online transition. The task ends when the connectivity
    /// channel closes.
    pub fn watch_connectivity(self: Arc<Self>) -> JoinHandle<()> {
        let coordinator = self;
        let mut rx = coordinator.connectivity.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online {
                    info!("connectivity restored, replaying pending conflicts");
                    coordinator.replay_pending().await;
                }
            }
        })
    }

    // ── Conflict pipeline ────────────────────────────────────────

    /// Runs detection and resolution for a fetched snapshot that may
    /// diverge from a staged local edit. Caller holds the entity lock.
    async fn reconcile(
        &self,
        key: &EntityKey,
        local: EntitySnapshot,
        remote: EntitySnapshot,
    ) -> SyncResult<Outcome> {
        // Validity pre-check: exactly one valid side wins outright, no
        // field-level conflict.
        let local_valid = self.validator.validate(&local.entity_type, &local).valid;
        let remote_valid = self.validator.validate(&remote.entity_type, &remote).valid;
        match (local_valid, remote_valid) {
            (true, false) => {
                info!(key = %key, "remote snapshot invalid, keeping local");
                self.persist(key, &local).await?;
                return Ok(Outcome {
                    snapshot: local,
                    phase: SyncPhase::Resolved,
                });
            }
            (false, true) => {
                info!(key = %key, "local snapshot invalid, taking remote");
                self.persist(key, &remote).await?;
                return Ok(Outcome {
                    snapshot: remote,
                    phase: SyncPhase::Resolved,
                });
            }
            (false, false) => {
                return Err(SyncError::ConflictUnresolvable {
                    key: key.clone(),
                    reason: "both local and remote snapshots fail validation".into(),
                });
            }
            (true, true) => {}
        }

        let Some(conflict) = self.detector.detect(&local, &remote) else {
            // Same field values; the local edit carried no divergence.
            self.persist(key, &remote).await?;
            return Ok(Outcome {
                snapshot: remote,
                phase: SyncPhase::Cached,
            });
        };

        info!(key = %key, fields = conflict.fields.len(), "conflict detected");
        self.run_resolution(key, conflict).await
    }

    /// Resolution step shared by the fetch path and replay. Caller holds
    /// the entity lock.
    async fn run_resolution(&self, key: &EntityKey, conflict: Conflict) -> SyncResult<Outcome> {
        match self.engine.resolve(&conflict)? {
            Resolution::Merged(snapshot) => {
                self.persist(key, &snapshot).await?;
                self.pending.remove(key).await;
                info!(key = %key, "conflict auto-resolved");
                Ok(Outcome {
                    snapshot,
                    phase: SyncPhase::Resolved,
                })
            }
            Resolution::Manual(fields) => {
                let pending = PendingConflict::new(conflict);
                self.pending.add(pending.clone()).await;
                // Subscribers may not exist yet; a lagging channel is
                // their loss, the store remains authoritative.
                let _ = self.conflict_tx.send(pending.clone());
                info!(
                    key = %key,
                    fields = fields.len(),
                    "conflict parked for manual resolution"
                );
                Ok(Outcome {
                    snapshot: pending.conflict.local.clone(),
                    phase: SyncPhase::PendingManual,
                })
            }
        }
    }

    /// Writes a snapshot through the cache and clears any staged edit.
    async fn persist(&self, key: &EntityKey, snapshot: &EntitySnapshot) -> SyncResult<()> {
        self.cache
            .set(
                &key.cache_key(),
                serde_json::to_value(snapshot)?,
                self.config.cache_ttl_millis,
            )
            .await;
        self.staged.write().await.remove(key);
        Ok(())
    }

    /// Rejects snapshots that fail schema validation.
    fn require_valid(&self, snapshot: &EntitySnapshot) -> SyncResult<()> {
        let report = self.validator.validate(&snapshot.entity_type, snapshot);
        if report.valid {
            Ok(())
        } else {
            Err(SyncError::Validation {
                entity_type: snapshot.entity_type.clone(),
                errors: report.errors,
            })
        }
    }

    /// Returns the serialization lock for an entity. Locks no task holds
    /// anymore are pruned here, so the map tracks entities in flight
    /// rather than every entity ever touched.
    async fn entity_lock(&self, key: &EntityKey) -> Arc<Mutex<()>> {
        let mut locks = self.entity_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Resolves once the connectivity channel reports offline. Pends forever
/// if the channel closes while still online, leaving the racing fetch to
/// finish on its own.
async fn went_offline(rx: &mut watch::Receiver<bool>) {
    loop {
        if !*rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
