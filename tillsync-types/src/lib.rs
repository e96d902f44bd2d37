//! Core type definitions for tillsync.
//!
//! This crate defines the fundamental, UI-agnostic types shared by the
//! cache and sync layers:
//! - Entity identity (`EntityKey`) and wall-clock timestamps
//! - `EntitySnapshot`, the shape both local and remote data share
//! - Conflict records (`Conflict`, `FieldDiff`, `PendingConflict`)
//! - The injected `Validator` capability
//!
//! Domain-specific entity types (ingredients, menu items, transactions)
//! belong to the calling application, not here; this crate only knows
//! about typed field maps.

mod conflict;
mod ids;
mod snapshot;
mod timestamp;
mod validate;

pub use conflict::{Conflict, FieldDiff, PendingConflict};
pub use ids::EntityKey;
pub use snapshot::EntitySnapshot;
pub use timestamp::Timestamp;
pub use validate::{AcceptAll, ValidationReport, Validator};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid entity key: {0}")]
    InvalidKey(String),
}
