//! Per-field conflict resolution.
//!
//! Every entity type declares a `StrategyTable` assigning each field that
//! can conflict to exactly one policy: an automatic rule, prefer-remote,
//! prefer-local, or require-manual. Automatic rules are a tagged-variant
//! dispatch ([`AutoRule`]) rather than name matching, so the rule set
//! stays auditable and extensible.
//!
//! Resolution is atomic: if any field requires a manual decision, nothing
//! is applied and the whole diff list is handed back.

use crate::error::{SyncError, SyncResult};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tillsync_types::{Conflict, EntityKey, EntitySnapshot, FieldDiff, Validator};
use tracing::{debug, warn};

/// Automatic per-field merge rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoRule {
    /// Timestamp-like fields: the later of the two values wins.
    LatestTimestamp,
    /// Numeric stock-like fields: the larger value wins.
    ///
    /// Assumes both sides only ever apply incremental updates. A
    /// legitimate decrement (say, correcting an over-count) loses to the
    /// stale larger value; preserved from the original system rather than
    /// silently redefined.
    MaxNumber,
    /// Boolean active-like fields: logical OR, preferring the active state.
    PreferTrue,
    /// The value from the side whose snapshot was updated later. Ties go
    /// to local.
    LatestWriter,
}

/// How a single field is settled, per the strategy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldPolicy {
    Auto(AutoRule),
    PreferRemote,
    PreferLocal,
    RequireManual,
}

/// Per-entity-type resolution strategy.
///
/// Fields not placed in any set default to require-manual: the engine
/// never guesses about a field nobody classified.
#[derive(Debug, Clone, Default)]
pub struct StrategyTable {
    auto: HashMap<String, AutoRule>,
    prefer_remote: HashSet<String>,
    prefer_local: HashSet<String>,
    require_manual: HashSet<String>,
}

impl StrategyTable {
    /// Creates an empty table (everything requires manual resolution).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns an automatic rule to a field.
    #[must_use]
    pub fn auto(mut self, field: impl Into<String>, rule: AutoRule) -> Self {
        self.auto.insert(field.into(), rule);
        self
    }

    /// Remote's value wins unconditionally for this field.
    #[must_use]
    pub fn prefer_remote(mut self, field: impl Into<String>) -> Self {
        self.prefer_remote.insert(field.into());
        self
    }

    /// Local's value wins unconditionally for this field.
    #[must_use]
    pub fn prefer_local(mut self, field: impl Into<String>) -> Self {
        self.prefer_local.insert(field.into());
        self
    }

    /// This field always needs an explicit decision.
    #[must_use]
    pub fn require_manual(mut self, field: impl Into<String>) -> Self {
        self.require_manual.insert(field.into());
        self
    }

    /// Whether a field appears in any of the four sets.
    #[must_use]
    pub fn covers(&self, field: &str) -> bool {
        self.auto.contains_key(field)
            || self.prefer_remote.contains(field)
            || self.prefer_local.contains(field)
            || self.require_manual.contains(field)
    }

    /// Field names of a snapshot that no set classifies. Useful for
    /// asserting the coverage invariant over declared entity types.
    pub fn coverage_gaps(&self, snapshot: &EntitySnapshot) -> Vec<String> {
        snapshot
            .fields
            .keys()
            .filter(|name| !self.covers(name))
            .cloned()
            .collect()
    }

    fn policy_for(&self, field: &str) -> FieldPolicy {
        if self.require_manual.contains(field) {
            FieldPolicy::RequireManual
        } else if let Some(rule) = self.auto.get(field) {
            FieldPolicy::Auto(*rule)
        } else if self.prefer_remote.contains(field) {
            FieldPolicy::PreferRemote
        } else if self.prefer_local.contains(field) {
            FieldPolicy::PreferLocal
        } else {
            FieldPolicy::RequireManual
        }
    }
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Every field resolved; the merged snapshot passed validation.
    Merged(EntitySnapshot),
    /// One or more fields need a manual decision; nothing was applied.
    Manual(Vec<FieldDiff>),
}

/// An explicit decision for a parked conflict.
#[derive(Debug, Clone, PartialEq)]
pub enum ManualChoice {
    /// Keep the local snapshot wholesale.
    TakeLocal,
    /// Keep the remote snapshot wholesale.
    TakeRemote,
    /// Use a caller-supplied replacement snapshot.
    Replacement(EntitySnapshot),
}

/// Resolves conflicts against per-entity-type strategy tables.
pub struct ResolutionEngine {
    strategies: HashMap<String, StrategyTable>,
    validator: Arc<dyn Validator>,
}

impl ResolutionEngine {
    /// Creates an engine over the given strategies and validator.
    pub fn new(strategies: HashMap<String, StrategyTable>, validator: Arc<dyn Validator>) -> Self {
        Self {
            strategies,
            validator,
        }
    }

    /// Returns the strategy table for an entity type, if declared.
    #[must_use]
    pub fn strategy(&self, entity_type: &str) -> Option<&StrategyTable> {
        self.strategies.get(entity_type)
    }

    /// Resolves a conflict field by field.
    ///
    /// Deterministic: the merged snapshot is stamped with the conflict's
    /// `detected_at`, so resolving the same conflict twice produces the
    /// same snapshot. Errors with [`SyncError::ConflictUnresolvable`] if
    /// the merged snapshot fails validation — merge rules can produce
    /// invalid cross-field combinations even when both inputs were valid.
    pub fn resolve(&self, conflict: &Conflict) -> SyncResult<Resolution> {
        let empty = StrategyTable::default();
        let table = self
            .strategies
            .get(&conflict.key.entity_type)
            .unwrap_or(&empty);

        let manual: Vec<FieldDiff> = conflict
            .fields
            .iter()
            .filter(|diff| table.policy_for(&diff.field) == FieldPolicy::RequireManual)
            .cloned()
            .collect();

        if !manual.is_empty() {
            debug!(
                key = %conflict.key,
                fields = manual.len(),
                "conflict has manual fields, nothing applied"
            );
            return Ok(Resolution::Manual(manual));
        }

        let mut merged = conflict.local.clone();
        for diff in &conflict.fields {
            let value = match table.policy_for(&diff.field) {
                FieldPolicy::Auto(rule) => apply_rule(rule, diff),
                FieldPolicy::PreferRemote => diff.remote_value.clone(),
                FieldPolicy::PreferLocal => diff.local_value.clone(),
                // First pass already routed these to the manual list.
                FieldPolicy::RequireManual => unreachable!("manual fields filtered above"),
            };
            if value == Value::Null {
                merged.fields.remove(&diff.field);
            } else {
                merged.fields.insert(diff.field.clone(), value);
            }
        }
        merged.last_updated = conflict.detected_at;

        self.check_valid(&merged, &conflict.key)?;
        debug!(key = %conflict.key, "conflict auto-resolved");
        Ok(Resolution::Merged(merged))
    }

    /// Applies an explicit decision to a conflict, bypassing the strategy
    /// table. The chosen snapshot still has to pass validation.
    pub fn resolve_with(
        &self,
        conflict: &Conflict,
        choice: ManualChoice,
    ) -> SyncResult<EntitySnapshot> {
        let snapshot = match choice {
            ManualChoice::TakeLocal => conflict.local.clone(),
            ManualChoice::TakeRemote => conflict.remote.clone(),
            ManualChoice::Replacement(snapshot) => snapshot,
        };
        self.check_valid(&snapshot, &conflict.key)?;
        Ok(snapshot)
    }

    fn check_valid(&self, snapshot: &EntitySnapshot, key: &EntityKey) -> SyncResult<()> {
        let report = self.validator.validate(&snapshot.entity_type, snapshot);
        if report.valid {
            Ok(())
        } else {
            warn!(key = %key, errors = ?report.errors, "merged snapshot failed validation");
            Err(SyncError::ConflictUnresolvable {
                key: key.clone(),
                reason: report.errors.join("; "),
            })
        }
    }
}

/// Dispatches one automatic rule over a field diff.
fn apply_rule(rule: AutoRule, diff: &FieldDiff) -> Value {
    match rule {
        AutoRule::LatestTimestamp | AutoRule::MaxNumber => {
            numeric_max(&diff.local_value, &diff.remote_value)
                .unwrap_or_else(|| latest_writer(diff))
        }
        AutoRule::PreferTrue => {
            let local = diff.local_value.as_bool().unwrap_or(false);
            let remote = diff.remote_value.as_bool().unwrap_or(false);
            Value::Bool(local || remote)
        }
        AutoRule::LatestWriter => latest_writer(diff),
    }
}

/// The larger of two numeric values, kept verbatim (no float round-trip).
/// `None` when either side is not a number.
fn numeric_max(local: &Value, remote: &Value) -> Option<Value> {
    let l = local.as_f64()?;
    let r = remote.as_f64()?;
    Some(if r > l { remote.clone() } else { local.clone() })
}

/// The value from the later-updated side; ties go to local.
fn latest_writer(diff: &FieldDiff) -> Value {
    if diff.remote_timestamp > diff.local_timestamp {
        diff.remote_value.clone()
    } else {
        diff.local_value.clone()
    }
}
