//! Conflict records.
//!
//! A `Conflict` captures a detected divergence between the local and remote
//! snapshot of one entity, field by field. `PendingConflict` is the parked
//! form held until an automatic or manual resolution lands.

use crate::{EntityKey, EntitySnapshot, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One field that genuinely differs between the two sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Field name.
    pub field: String,
    /// Local value (`Value::Null` when the field is absent locally).
    pub local_value: Value,
    /// Remote value (`Value::Null` when the field is absent remotely).
    pub remote_value: Value,
    /// Modification time of the local side. Snapshots do not track
    /// per-field times, so this is the snapshot's `last_updated`.
    pub local_timestamp: Timestamp,
    /// Modification time of the remote side.
    pub remote_timestamp: Timestamp,
}

/// A detected divergence between local and remote state of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// The entity both snapshots describe.
    pub key: EntityKey,
    /// The locally held snapshot.
    pub local: EntitySnapshot,
    /// The snapshot the remote side returned.
    pub remote: EntitySnapshot,
    /// Fields that differ, one diff per field.
    pub fields: Vec<FieldDiff>,
    /// When the divergence was detected.
    pub detected_at: Timestamp,
}

impl Conflict {
    /// Returns the names of the conflicting fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|d| d.field.as_str())
    }
}

/// A conflict awaiting resolution, keyed by entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConflict {
    /// The unresolved conflict.
    pub conflict: Conflict,
    /// When the conflict was parked.
    pub created_at: Timestamp,
}

impl PendingConflict {
    /// Parks a conflict, stamping the current time.
    #[must_use]
    pub fn new(conflict: Conflict) -> Self {
        Self {
            conflict,
            created_at: Timestamp::now(),
        }
    }

    /// The entity this conflict belongs to.
    #[must_use]
    pub fn key(&self) -> &EntityKey {
        &self.conflict.key
    }
}
