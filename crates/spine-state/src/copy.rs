//! Shallow and deep copies of state nodes.

use crate::value::{MapNode, Record, SetNode};
use crate::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// New top-level container of the same kind with the same immediate entries.
///
/// Children are shared by reference, so only one node is allocated. Scalars,
/// dates and opaque values pass through unchanged.
///
/// ```
/// use spine_state::{shallow_copy, Value};
/// use serde_json::json;
///
/// let v = Value::from(json!({"a": {"b": 1}}));
/// let c = shallow_copy(&v);
/// assert!(!c.same_node(&v));
/// assert!(c.get("a").unwrap().same_node(v.get("a").unwrap()));
/// ```
pub fn shallow_copy(value: &Value) -> Value {
    match value {
        Value::Record(r) => Value::Record(Arc::new(Record::clone(r))),
        Value::List(l) => Value::List(Arc::new(l.as_ref().clone())),
        Value::Map(m) => Value::Map(Arc::new(MapNode::clone(m))),
        Value::Set(s) => Value::Set(Arc::new(SetNode::clone(s))),
        other => other.clone(),
    }
}

/// Copy every container in the tree.
///
/// Copies are memoized by node identity: a node reachable along several paths
/// is copied once and the copy is shared the same way in the result.
pub fn deep_clone(value: &Value) -> Value {
    let mut seen = HashMap::new();
    clone_node(value, &mut seen)
}

fn clone_node(value: &Value, seen: &mut HashMap<usize, Value>) -> Value {
    let Some(id) = value.node_id() else {
        return value.clone();
    };
    if let Some(copy) = seen.get(&id) {
        return copy.clone();
    }

    let copy = match value {
        Value::Record(r) => Value::from(
            r.iter()
                .map(|(k, v)| (k.clone(), clone_node(v, seen)))
                .collect::<Record>(),
        ),
        Value::List(l) => Value::list(l.iter().map(|v| clone_node(v, seen)).collect::<Vec<_>>()),
        Value::Map(m) => Value::map(
            m.iter()
                .map(|(k, v)| (clone_node(k, seen), clone_node(v, seen)))
                .collect::<Vec<_>>(),
        ),
        Value::Set(s) => Value::set(s.iter().map(|v| clone_node(v, seen)).collect::<Vec<_>>()),
        other => other.clone(),
    };
    seen.insert(id, copy.clone());
    copy
}
