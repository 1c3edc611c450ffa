//! Property tests over generated trees and paths.
//!
//! Trees mix records, lists, maps and sets; paths mix record keys, indices
//! and map entries, so writes may vivify, pad, descend into set elements or
//! halt.

use proptest::prelude::*;
use spine_state::{apply_at_path, deep_clone, produce, Path, Seg, Value};

fn arb_key() -> impl Strategy<Value = String> {
    "[a-d]"
}

/// Scalars drawn from small pools so maps and sets see duplicates.
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-3i32..4).prop_map(Value::from),
        arb_key().prop_map(Value::String),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec((arb_key(), inner.clone()), 0..4).prop_map(Value::record),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::list),
            prop::collection::vec((arb_scalar(), inner), 0..4).prop_map(Value::map),
            prop::collection::vec(arb_scalar(), 0..4).prop_map(Value::set),
        ]
    })
}

fn arb_root() -> impl Strategy<Value = Value> {
    prop::collection::vec((arb_key(), arb_value()), 1..5).prop_map(Value::record)
}

fn arb_seg() -> impl Strategy<Value = Seg> {
    prop_oneof![
        arb_key().prop_map(Seg::Key),
        (0usize..5).prop_map(Seg::Index),
        arb_scalar().prop_map(Seg::Entry),
    ]
}

/// A path whose first segment is a root field name.
fn arb_path() -> impl Strategy<Value = (String, Path)> {
    (arb_key(), prop::collection::vec(arb_seg(), 0..3)).prop_map(|(first, rest)| {
        let path: Path = std::iter::once(Seg::Key(first.clone())).chain(rest).collect();
        (first, path)
    })
}

fn root_fields(root: &Value) -> Vec<(String, Value)> {
    match root {
        Value::Record(record) => record.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Vec::new(),
    }
}

fn set_elements(value: &Value) -> Vec<Value> {
    match value {
        Value::Set(set) => set.iter().cloned().collect(),
        _ => Vec::new(),
    }
}

proptest! {
    #[test]
    fn path_writes_never_touch_the_input(
        root in arb_root(),
        (_, path) in arb_path(),
        value in arb_value(),
        delete in any::<bool>(),
    ) {
        let snapshot = deep_clone(&root);
        let mut next = root.clone();
        apply_at_path(&mut next, &path, value, delete);
        prop_assert_eq!(&root, &snapshot);
    }

    #[test]
    fn producer_writes_never_touch_the_input(
        root in arb_root(),
        (_, path) in arb_path(),
        value in arb_scalar(),
    ) {
        let snapshot = deep_clone(&root);
        let segments: Vec<Seg> = path.iter().cloned().collect();
        let result = produce(&root, |draft| {
            if let Some((last, spine)) = segments.split_last() {
                let mut target = draft.clone();
                for seg in spine {
                    target = target.at(seg.clone());
                }
                target.set(last.clone(), value.clone());
            }
        });
        prop_assert!(result.is_ok());
        prop_assert_eq!(&root, &snapshot);
    }

    #[test]
    fn untouched_siblings_are_shared(
        root in arb_root(),
        (first, path) in arb_path(),
        value in arb_value(),
        delete in any::<bool>(),
    ) {
        let mut next = root.clone();
        apply_at_path(&mut next, &path, value, delete);

        for (key, before) in root_fields(&root) {
            if key == first || !before.is_container() {
                continue;
            }
            let after = next.get(key.as_str());
            prop_assert!(after.is_some_and(|after| after.same_node(&before)), "{} was copied", key);
        }
    }

    #[test]
    fn record_delete_removes_only_that_field(root in arb_root(), key in arb_key()) {
        let mut next = root.clone();
        prop_assert!(apply_at_path(&mut next, key.as_str(), Value::Null, true).is_applied());
        prop_assert!(next.get(key.as_str()).is_none());

        for (other, before) in root_fields(&root) {
            if other != key {
                prop_assert_eq!(next.get(other.as_str()), Some(&before));
            }
        }
    }

    #[test]
    fn list_delete_in_range_shortens_by_one(
        items in prop::collection::vec(arb_scalar(), 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let index = pick.index(items.len());
        let root = Value::record([("xs", Value::list(items.clone()))]);
        let mut next = root.clone();
        prop_assert!(apply_at_path(&mut next, &Path::root().key("xs").index(index), Value::Null, true).is_applied());

        let mut expected = items;
        expected.remove(index);
        prop_assert_eq!(next.get("xs"), Some(&Value::list(expected)));
        prop_assert_eq!(root.get("xs").and_then(Value::len), Some(next.get("xs").and_then(Value::len).unwrap_or(0) + 1));
    }

    #[test]
    fn sets_keep_first_occurrences_in_order(items in prop::collection::vec(arb_scalar(), 0..12)) {
        let mut expected: Vec<Value> = Vec::new();
        for item in &items {
            if !expected.iter().any(|seen| seen.same_value_zero(item)) {
                expected.push(item.clone());
            }
        }
        prop_assert_eq!(set_elements(&Value::set(items)), expected);
    }
}
