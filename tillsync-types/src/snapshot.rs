//! Entity snapshots.
//!
//! An `EntitySnapshot` is the shape both local and remote data share: a
//! typed field map plus the time of last modification. Both the conflict
//! detector and the resolution engine operate on this shape only, so the
//! engine never needs to know concrete entity types.

use crate::{EntityKey, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A point-in-time view of one entity's fields.
///
/// Fields are kept in a `BTreeMap` so that two snapshots built from the
/// same field set serialize identically — merged snapshots must be
/// bit-for-bit reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity type label.
    pub entity_type: String,
    /// Backend-assigned identifier.
    pub entity_id: String,
    /// Field name → value.
    pub fields: BTreeMap<String, Value>,
    /// When this snapshot was last modified, per the side that produced it.
    pub last_updated: Timestamp,
}

impl EntitySnapshot {
    /// Creates an empty snapshot for the given entity.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            fields: BTreeMap::new(),
            last_updated: Timestamp::now(),
        }
    }

    /// Returns this snapshot's entity key.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.entity_id.clone())
    }

    /// Returns a field value, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field value. Does not touch `last_updated`; callers stamp
    /// modification time explicitly.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style modification-time setter.
    #[must_use]
    pub fn with_last_updated(mut self, at: Timestamp) -> Self {
        self.last_updated = at;
        self
    }

    /// Returns the union of field names present in either snapshot.
    pub fn field_union<'a>(&'a self, other: &'a Self) -> Vec<&'a str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        for name in other.fields.keys() {
            if !self.fields.contains_key(name) {
                names.push(name);
            }
        }
        names.sort_unstable();
        names
    }

    /// Structural equality over the field map only (identity and
    /// `last_updated` excluded).
    #[must_use]
    pub fn same_fields(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}
