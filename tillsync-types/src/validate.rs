//! Schema validation capability.
//!
//! Validation is injected: the engine calls it on freshly fetched
//! snapshots and on every merged snapshot before persisting, but the rules
//! themselves (required fields, cross-field constraints like price >= cost)
//! belong to the application.

use crate::EntitySnapshot;

/// Outcome of validating one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Whether the snapshot passed.
    pub valid: bool,
    /// Human-readable failure reasons; empty when valid.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// A passing report.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// A failing report with the given reasons.
    #[must_use]
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Injected schema validator.
///
/// Must be pure and deterministic: the same snapshot always yields the
/// same report, so resolving a conflict twice stays idempotent.
pub trait Validator: Send + Sync {
    /// Validates a snapshot against the schema for its entity type.
    fn validate(&self, entity_type: &str, snapshot: &EntitySnapshot) -> ValidationReport;
}

/// Default validator that accepts every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _entity_type: &str, _snapshot: &EntitySnapshot) -> ValidationReport {
        ValidationReport::ok()
    }
}
