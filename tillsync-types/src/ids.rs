//! Entity identity.
//!
//! Entities are addressed by `(entity_type, entity_id)` string pairs as
//! assigned by the backend; this layer never generates identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of an entity across the cache, sync, and conflict layers.
///
/// Displays as `type:id` (e.g. `ingredient:42`), which is also the cache
/// key format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity type label (e.g. "ingredient", "menu_item", "transaction").
    pub entity_type: String,
    /// Backend-assigned identifier, unique within the type.
    pub entity_id: String,
}

impl EntityKey {
    /// Creates a key from a type label and an id.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Returns the `type:id` cache-key form.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.entity_type, self.entity_id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

impl FromStr for EntityKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((ty, id)) if !ty.is_empty() && !id.is_empty() => Ok(Self::new(ty, id)),
            _ => Err(crate::Error::InvalidKey(s.to_string())),
        }
    }
}
