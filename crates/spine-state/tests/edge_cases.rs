//! Edge case tests for spine-state.

use serde_json::json;
use spine_state::{
    apply_at_path, assert_valid_root, classify, get_at_path, path, produce, Kind, OpaqueKind,
    Path, Seg, SpineError, Value, WriteOutcome,
};

// ============================================================================
// Root validation
// ============================================================================

#[test]
fn test_scalar_roots_are_rejected() {
    for root in [Value::from(42), Value::from("str"), Value::from(true)] {
        let err = produce(&root, |_| {}).unwrap_err();
        assert!(matches!(err, SpineError::InvalidRootType { .. }), "{err}");
    }
}

#[test]
fn test_unsupported_roots_are_rejected() {
    for kind in [OpaqueKind::RegExp, OpaqueKind::Promise, OpaqueKind::WeakCollection] {
        let root = Value::Opaque(kind);
        assert_eq!(classify(&root), Kind::Unsupported);
        assert!(assert_valid_root(&root).is_err());
    }
    let date = Value::date_from_millis(1).unwrap();
    assert!(produce(&date, |_| {}).is_err());
}

#[test]
fn test_nullish_roots_round_trip() {
    assert_eq!(produce(&Value::Null, |_| {}).unwrap(), Value::Null);
    assert!(produce(&Value::Undefined, |_| {}).unwrap().is_undefined());
}

// ============================================================================
// Path updater
// ============================================================================

#[test]
fn test_empty_path_replaces_or_nulls_root() {
    let mut root = Value::from(json!({"a": 1}));
    assert!(apply_at_path(&mut root, "", Value::from(json!([1])), false).is_applied());
    assert_eq!(root, Value::from(json!([1])));

    assert!(apply_at_path(&mut root, Path::root(), Value::Undefined, true).is_applied());
    assert_eq!(root, Value::Null);
}

#[test]
fn test_missing_intermediates_become_records() {
    let mut root = Value::from(json!({}));
    apply_at_path(&mut root, "a.b.c", Value::from(1), false);
    assert_eq!(root, Value::from(json!({"a": {"b": {"c": 1}}})));

    // Digit segments under a missing key still vivify a record, not a list
    let mut root = Value::from(json!({}));
    apply_at_path(&mut root, "xs.0", Value::from(1), false);
    assert_eq!(root, Value::from(json!({"xs": {"0": 1}})));
}

#[test]
fn test_scalar_intermediate_is_replaced() {
    let mut root = Value::from(json!({"a": 5}));
    assert!(apply_at_path(&mut root, "a.b", Value::from(1), false).is_applied());
    assert_eq!(root, Value::from(json!({"a": {"b": 1}})));
}

#[test]
fn test_uninterpretable_segment_halts_silently() {
    let original = Value::from(json!({"list": [1, 2]}));
    let mut root = original.clone();
    let outcome = apply_at_path(&mut root, "list.name.x", Value::from(1), false);

    assert_eq!(
        outcome,
        WriteOutcome::Halted {
            at: path!("list"),
            found: Kind::List,
        }
    );
    assert_eq!(root, original);
}

#[test]
fn test_write_into_null_root_halts() {
    let mut root = Value::Null;
    let outcome = apply_at_path(&mut root, "a", Value::from(1), false);
    assert!(!outcome.is_applied());
    assert_eq!(root, Value::Null);
}

#[test]
fn test_sparse_list_write_pads_with_undefined() {
    let mut root = Value::from(json!({"xs": [1]}));
    apply_at_path(&mut root, "xs.3", Value::from(4), false);
    assert_eq!(
        root.get("xs").unwrap(),
        &Value::list([Value::from(1), Value::Undefined, Value::Undefined, Value::from(4)])
    );
}

#[test]
fn test_far_index_halts_without_panicking() {
    let original = Value::from(json!({"xs": [1]}));

    for path in ["xs.18446744073709551615", "xs.18446744073709551615.a", "xs.4294967296"] {
        let mut root = original.clone();
        let outcome = apply_at_path(&mut root, path, Value::from(1), false);
        assert!(
            matches!(&outcome, WriteOutcome::Halted { at, found: Kind::List } if *at == path!("xs")),
            "{path}: {outcome:?}"
        );
        assert_eq!(root, original);
    }

    let result = produce(&original, |d| {
        let outcome = d.at("xs").set(Seg::entry(1e300), 1);
        assert!(!outcome.is_applied());
        assert!(!d.at("xs").set(Seg::entry(-1.0), 1).is_applied());
    })
    .unwrap();
    assert_eq!(result, original);
}

#[test]
fn test_list_delete_out_of_range_is_noop() {
    let mut root = Value::from(json!({"xs": [1, 2]}));
    assert!(apply_at_path(&mut root, "xs.9", Value::Null, true).is_applied());
    assert_eq!(root, Value::from(json!({"xs": [1, 2]})));
}

#[test]
fn test_record_delete_missing_key_is_noop() {
    let mut root = Value::from(json!({"a": 1}));
    apply_at_path(&mut root, "b", Value::Null, true);
    assert_eq!(root, Value::from(json!({"a": 1})));
}

#[test]
fn test_record_delete_keeps_key_order() {
    let mut root = Value::from(json!({"a": 1, "b": 2, "c": 3}));
    apply_at_path(&mut root, "a", Value::Null, true);
    let keys: Vec<&String> = root.as_record().unwrap().keys().collect();
    assert_eq!(keys, ["b", "c"]);
}

#[test]
fn test_numeric_key_on_record() {
    let mut root = Value::from(json!({"r": {}}));
    apply_at_path(&mut root, path!("r", 7), Value::from("seven"), false);
    assert_eq!(root.get("r").unwrap().get("7"), Some(&Value::from("seven")));
}

// ============================================================================
// Sets addressed by position
// ============================================================================

#[test]
fn test_set_positional_write_dedupes() {
    let mut root = Value::record([("s", Value::set([Value::from(1), Value::from(2)]))]);
    apply_at_path(&mut root, "s.0", Value::from(2), false);
    assert_eq!(root.get("s").unwrap().as_set().unwrap().len(), 1);
    assert!(root.get("s").unwrap().as_set().unwrap().contains(&Value::from(2)));
}

#[test]
fn test_set_positional_delete() {
    let mut root = Value::record([(
        "s",
        Value::set([Value::from("a"), Value::from("b"), Value::from("c")]),
    )]);
    apply_at_path(&mut root, "s.1", Value::Null, true);
    let items: Vec<Value> = root.get("s").unwrap().as_set().unwrap().iter().cloned().collect();
    assert_eq!(items, vec![Value::from("a"), Value::from("c")]);

    apply_at_path(&mut root, "s.10", Value::Null, true);
    assert_eq!(root.get("s").unwrap().len(), Some(2));
}

#[test]
fn test_write_below_set_element() {
    let element = Value::from(json!({"n": 1}));
    let original = Value::record([("s", Value::set([element.clone(), Value::from(2)]))]);
    let mut root = original.clone();

    apply_at_path(&mut root, "s.0.n", Value::from(5), false);

    let set = root.get("s").unwrap().as_set().unwrap();
    assert_eq!(set.nth(0).unwrap().get("n"), Some(&Value::from(5)));
    assert_eq!(element.get("n"), Some(&Value::from(1)));
}

// ============================================================================
// Reads and equality
// ============================================================================

#[test]
fn test_get_at_path_edge_cases() {
    let root = Value::from(json!({"a": [{"b": null}]}));
    assert_eq!(get_at_path(&root, &Path::root()), Some(&root));
    assert_eq!(get_at_path(&root, &Path::parse("a.0.b")), Some(&Value::Null));
    assert_eq!(get_at_path(&root, &Path::parse("a.0.b.c")), None);
    assert_eq!(get_at_path(&root, &Path::parse("a.x")), None);
    assert_eq!(root.get(Seg::entry(0)), None);
}

#[test]
fn test_map_keys_use_same_value_zero() {
    let m = Value::map([(Value::from(f64::NAN), Value::from("nan"))]);
    assert_eq!(m.as_map().unwrap().get(&Value::from(f64::NAN)), Some(&Value::from("nan")));

    let s = Value::set([Value::from(0.0), Value::from(-0.0)]);
    assert_eq!(s.len(), Some(1));
}
