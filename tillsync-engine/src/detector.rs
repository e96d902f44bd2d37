//! Conflict detection.
//!
//! The detector is pure: it compares two snapshots field by field and
//! reports which fields genuinely differ. It never consults the validator
//! or the network — the validity pre-check (one side invalid, the other
//! not) is the coordinator's job, before detection runs.

use serde_json::Value;
use tillsync_types::{Conflict, EntitySnapshot, FieldDiff, Timestamp};

/// Compares local and remote snapshots of an entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector;

impl ConflictDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the divergence between `local` and `remote`, or `None`
    /// when every tracked field is structurally equal.
    ///
    /// Fields present on only one side are diffed against `Value::Null`.
    /// Per-side timestamps come from each snapshot's `last_updated`; no
    /// per-field modification times are tracked.
    #[must_use]
    pub fn detect(&self, local: &EntitySnapshot, remote: &EntitySnapshot) -> Option<Conflict> {
        if local.same_fields(remote) {
            return None;
        }

        let fields: Vec<FieldDiff> = local
            .field_union(remote)
            .into_iter()
            .filter_map(|name| {
                let local_value = local.field(name).cloned().unwrap_or(Value::Null);
                let remote_value = remote.field(name).cloned().unwrap_or(Value::Null);
                if local_value == remote_value {
                    return None;
                }
                Some(FieldDiff {
                    field: name.to_string(),
                    local_value,
                    remote_value,
                    local_timestamp: local.last_updated,
                    remote_timestamp: remote.last_updated,
                })
            })
            .collect();

        // same_fields was false but every union field compared equal:
        // cannot happen, the maps would have been equal. Guard anyway so
        // a Conflict never carries an empty diff list.
        if fields.is_empty() {
            return None;
        }

        Some(Conflict {
            key: local.key(),
            local: local.clone(),
            remote: remote.clone(),
            fields,
            detected_at: Timestamp::now(),
        })
    }
}
