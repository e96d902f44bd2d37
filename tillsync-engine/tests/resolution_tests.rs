use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tillsync_engine::{
    AutoRule, ConflictDetector, ManualChoice, Resolution, ResolutionEngine, StrategyTable,
    SyncError,
};
use tillsync_types::{
    AcceptAll, Conflict, EntitySnapshot, Timestamp, ValidationReport, Validator,
};

/// Rejects menu items priced below cost; accepts everything else.
struct PriceFloor;

impl Validator for PriceFloor {
    fn validate(&self, entity_type: &str, snapshot: &EntitySnapshot) -> ValidationReport {
        if entity_type != "menu_item" {
            return ValidationReport::ok();
        }
        let price = snapshot.field("price").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let cost = snapshot.field("cost").and_then(|v| v.as_f64()).unwrap_or(0.0);
        if price < cost {
            ValidationReport::failed(vec!["price below cost".into()])
        } else {
            ValidationReport::ok()
        }
    }
}

fn engine(strategies: HashMap<String, StrategyTable>) -> ResolutionEngine {
    ResolutionEngine::new(strategies, Arc::new(AcceptAll))
}

fn conflict_between(local: EntitySnapshot, remote: EntitySnapshot) -> Conflict {
    let mut conflict = ConflictDetector::new()
        .detect(&local, &remote)
        .expect("snapshots should conflict");
    // Pin detection time so assertions on the merged stamp are exact.
    conflict.detected_at = Timestamp::from_millis(5000);
    conflict
}

// ── POS scenarios ────────────────────────────────────────────────

#[test]
fn ingredient_stock_takes_max_of_both_sides() {
    let local = EntitySnapshot::new("ingredient", "42")
        .with_field("current_stock", json!(25))
        .with_field("last_updated", json!(1000))
        .with_last_updated(Timestamp::from_millis(1000));
    let remote = EntitySnapshot::new("ingredient", "42")
        .with_field("current_stock", json!(30))
        .with_field("last_updated", json!(900))
        .with_last_updated(Timestamp::from_millis(900));

    let strategies = HashMap::from([(
        "ingredient".to_string(),
        StrategyTable::new()
            .auto("current_stock", AutoRule::MaxNumber)
            .auto("last_updated", AutoRule::LatestTimestamp),
    )]);

    let resolution = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap();

    let Resolution::Merged(merged) = resolution else {
        panic!("expected full auto-resolution");
    };
    assert_eq!(merged.field("current_stock"), Some(&json!(30)));
    assert_eq!(merged.field("last_updated"), Some(&json!(1000)));
}

#[test]
fn menu_price_prefers_remote_regardless_of_timestamps() {
    let local = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(150))
        .with_last_updated(Timestamp::from_millis(9999));
    let remote = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(160))
        .with_last_updated(Timestamp::from_millis(1));

    let strategies = HashMap::from([(
        "menu_item".to_string(),
        StrategyTable::new().prefer_remote("price"),
    )]);

    let Resolution::Merged(merged) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected full auto-resolution");
    };
    assert_eq!(merged.field("price"), Some(&json!(160)));
}

#[test]
fn transaction_id_conflict_requires_manual_decision() {
    let local = EntitySnapshot::new("transaction", "t1")
        .with_field("id", json!("t1-local"))
        .with_field("total", json!(500));
    let remote = EntitySnapshot::new("transaction", "t1")
        .with_field("id", json!("t1-remote"))
        .with_field("total", json!(500));

    let strategies = HashMap::from([(
        "transaction".to_string(),
        StrategyTable::new()
            .require_manual("id")
            .auto("total", AutoRule::MaxNumber),
    )]);

    let Resolution::Manual(unresolved) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected manual resolution");
    };
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].field, "id");
}

// ── Automatic rules ──────────────────────────────────────────────

#[test]
fn prefer_true_takes_logical_or() {
    let local = EntitySnapshot::new("ingredient", "1").with_field("active", json!(false));
    let remote = EntitySnapshot::new("ingredient", "1").with_field("active", json!(true));

    let strategies = HashMap::from([(
        "ingredient".to_string(),
        StrategyTable::new().auto("active", AutoRule::PreferTrue),
    )]);

    let Resolution::Merged(merged) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected merge");
    };
    assert_eq!(merged.field("active"), Some(&json!(true)));
}

#[test]
fn latest_writer_takes_later_side() {
    let local = EntitySnapshot::new("ingredient", "1")
        .with_field("name", json!("old name"))
        .with_last_updated(Timestamp::from_millis(1000));
    let remote = EntitySnapshot::new("ingredient", "1")
        .with_field("name", json!("new name"))
        .with_last_updated(Timestamp::from_millis(2000));

    let strategies = HashMap::from([(
        "ingredient".to_string(),
        StrategyTable::new().auto("name", AutoRule::LatestWriter),
    )]);

    let Resolution::Merged(merged) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected merge");
    };
    assert_eq!(merged.field("name"), Some(&json!("new name")));
}

#[test]
fn latest_writer_tie_keeps_local() {
    let local = EntitySnapshot::new("ingredient", "1")
        .with_field("name", json!("local"))
        .with_last_updated(Timestamp::from_millis(1000));
    let remote = EntitySnapshot::new("ingredient", "1")
        .with_field("name", json!("remote"))
        .with_last_updated(Timestamp::from_millis(1000));

    let strategies = HashMap::from([(
        "ingredient".to_string(),
        StrategyTable::new().auto("name", AutoRule::LatestWriter),
    )]);

    let Resolution::Merged(merged) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected merge");
    };
    assert_eq!(merged.field("name"), Some(&json!("local")));
}

#[test]
fn prefer_local_keeps_local_value() {
    let local = EntitySnapshot::new("ingredient", "1").with_field("notes", json!("mine"));
    let remote = EntitySnapshot::new("ingredient", "1").with_field("notes", json!("theirs"));

    let strategies = HashMap::from([(
        "ingredient".to_string(),
        StrategyTable::new().prefer_local("notes"),
    )]);

    let Resolution::Merged(merged) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected merge");
    };
    assert_eq!(merged.field("notes"), Some(&json!("mine")));
}

// ── Atomicity and defaults ───────────────────────────────────────

#[test]
fn unclassified_field_defaults_to_manual() {
    let local = EntitySnapshot::new("ingredient", "1").with_field("mystery", json!(1));
    let remote = EntitySnapshot::new("ingredient", "1").with_field("mystery", json!(2));

    // Empty table: nothing classified.
    let strategies = HashMap::from([("ingredient".to_string(), StrategyTable::new())]);

    let Resolution::Manual(unresolved) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected manual");
    };
    assert_eq!(unresolved[0].field, "mystery");
}

#[test]
fn undeclared_entity_type_defaults_to_manual() {
    let local = EntitySnapshot::new("supplier", "1").with_field("name", json!("a"));
    let remote = EntitySnapshot::new("supplier", "1").with_field("name", json!("b"));

    let Resolution::Manual(_) = engine(HashMap::new())
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected manual");
    };
}

#[test]
fn one_manual_field_blocks_all_resolvable_fields() {
    let local = EntitySnapshot::new("transaction", "t1")
        .with_field("id", json!("a"))
        .with_field("total", json!(100));
    let remote = EntitySnapshot::new("transaction", "t1")
        .with_field("id", json!("b"))
        .with_field("total", json!(200));

    let strategies = HashMap::from([(
        "transaction".to_string(),
        StrategyTable::new()
            .require_manual("id")
            .auto("total", AutoRule::MaxNumber),
    )]);

    // Only the manual field is reported; the resolvable one is withheld,
    // not partially applied.
    let Resolution::Manual(unresolved) = engine(strategies)
        .resolve(&conflict_between(local, remote))
        .unwrap()
    else {
        panic!("expected manual");
    };
    assert_eq!(unresolved.len(), 1);
    assert_eq!(unresolved[0].field, "id");
}

// ── Determinism ──────────────────────────────────────────────────

#[test]
fn resolving_twice_is_bit_identical() {
    let local = EntitySnapshot::new("ingredient", "42")
        .with_field("current_stock", json!(25))
        .with_field("active", json!(false))
        .with_last_updated(Timestamp::from_millis(1000));
    let remote = EntitySnapshot::new("ingredient", "42")
        .with_field("current_stock", json!(30))
        .with_field("active", json!(true))
        .with_last_updated(Timestamp::from_millis(900));

    let strategies = HashMap::from([(
        "ingredient".to_string(),
        StrategyTable::new()
            .auto("current_stock", AutoRule::MaxNumber)
            .auto("active", AutoRule::PreferTrue),
    )]);
    let engine = engine(strategies);
    let conflict = conflict_between(local, remote);

    let first = engine.resolve(&conflict).unwrap();
    let second = engine.resolve(&conflict).unwrap();
    let (Resolution::Merged(a), Resolution::Merged(b)) = (first, second) else {
        panic!("expected merges");
    };
    assert_eq!(
        serde_json::to_vec(&a).unwrap(),
        serde_json::to_vec(&b).unwrap()
    );
}

// ── Validation gate ──────────────────────────────────────────────

#[test]
fn merge_producing_invalid_snapshot_is_unresolvable() {
    // Each side is individually valid (price >= cost), but prefer-remote
    // on price with prefer-local on cost merges into price < cost.
    let local = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(200))
        .with_field("cost", json!(180));
    let remote = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(150))
        .with_field("cost", json!(120));

    let strategies = HashMap::from([(
        "menu_item".to_string(),
        StrategyTable::new().prefer_remote("price").prefer_local("cost"),
    )]);
    let engine = ResolutionEngine::new(strategies, Arc::new(PriceFloor));

    let err = engine
        .resolve(&conflict_between(local, remote))
        .unwrap_err();
    assert!(matches!(err, SyncError::ConflictUnresolvable { .. }));
}

// ── Forced overrides ─────────────────────────────────────────────

#[test]
fn take_remote_override_uses_remote_wholesale() {
    let local = EntitySnapshot::new("transaction", "t1").with_field("id", json!("a"));
    let remote = EntitySnapshot::new("transaction", "t1").with_field("id", json!("b"));
    let conflict = conflict_between(local, remote.clone());

    let resolved = engine(HashMap::new())
        .resolve_with(&conflict, ManualChoice::TakeRemote)
        .unwrap();
    assert_eq!(resolved, remote);
}

#[test]
fn replacement_override_is_validated() {
    let local = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(200))
        .with_field("cost", json!(100));
    let remote = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(210))
        .with_field("cost", json!(100));
    let conflict = conflict_between(local, remote);

    let engine = ResolutionEngine::new(HashMap::new(), Arc::new(PriceFloor));
    let bad = EntitySnapshot::new("menu_item", "7")
        .with_field("price", json!(50))
        .with_field("cost", json!(100));

    let err = engine
        .resolve_with(&conflict, ManualChoice::Replacement(bad))
        .unwrap_err();
    assert!(matches!(err, SyncError::ConflictUnresolvable { .. }));
}

// ── Strategy coverage ────────────────────────────────────────────

#[test]
fn coverage_gaps_reports_unclassified_fields() {
    let table = StrategyTable::new()
        .auto("current_stock", AutoRule::MaxNumber)
        .prefer_remote("name");
    let snap = EntitySnapshot::new("ingredient", "1")
        .with_field("current_stock", json!(1))
        .with_field("name", json!("x"))
        .with_field("supplier", json!("acme"));

    assert_eq!(table.coverage_gaps(&snap), vec!["supplier".to_string()]);
    assert!(table.covers("current_stock"));
    assert!(!table.covers("supplier"));
}
