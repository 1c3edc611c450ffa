//! Producer entry points.
//!
//! A producer run validates the root, hands the caller a [`Draft`] over a
//! shallow copy of it and returns whatever tree the draft ended up holding.
//! Every node the caller did not write to is shared with the input.

use crate::copy::shallow_copy;
use crate::draft::{Draft, DraftCell};
use crate::error::{SpineError, SpineResult};
use crate::guard::assert_valid_root;
use crate::updater::CopyLog;
use crate::Value;

/// Output of [`produce_with_log`].
#[derive(Clone, Debug)]
pub struct Produced {
    pub root: Value,
    /// Spine nodes copied while the producer ran.
    pub log: CopyLog,
}

/// Produce a new state from `state` by mutating a draft.
///
/// `state` is never modified. Unchanged subtrees of the result are the same
/// nodes as in `state`.
///
/// # Examples
///
/// ```
/// use spine_state::{produce, Value};
/// use serde_json::json;
///
/// let state = Value::from(json!({"todo": [{"done": false}], "user": {"name": "a"}}));
/// let next = produce(&state, |draft| {
///     draft.at("todo").at(0).set("done", true);
/// })
/// .unwrap();
///
/// assert_eq!(next.get("todo").unwrap().get(0).unwrap().get("done"), Some(&Value::Bool(true)));
/// assert_eq!(state.get("todo").unwrap().get(0).unwrap().get("done"), Some(&Value::Bool(false)));
/// assert!(next.get("user").unwrap().same_node(state.get("user").unwrap()));
/// ```
pub fn produce<F>(state: &Value, mutate: F) -> SpineResult<Value>
where
    F: FnOnce(&Draft<'_>),
{
    produce_with_log(state, mutate).map(|produced| produced.root)
}

/// [`produce`] with a fallible producer.
///
/// An error from `mutate` is returned as-is and the partial tree is dropped.
pub fn try_produce<F, E>(state: &Value, mutate: F) -> Result<Value, E>
where
    F: FnOnce(&Draft<'_>) -> Result<(), E>,
    E: From<SpineError>,
{
    let cell = open(state)?;
    mutate(&Draft::root(&cell))?;
    Ok(close(cell).root)
}

/// [`produce`], also returning the copy log of the run.
pub fn produce_with_log<F>(state: &Value, mutate: F) -> SpineResult<Produced>
where
    F: FnOnce(&Draft<'_>),
{
    let cell = open(state)?;
    mutate(&Draft::root(&cell));
    Ok(close(cell))
}

fn open(state: &Value) -> SpineResult<DraftCell> {
    assert_valid_root(state)?;
    tracing::debug!(kind = %state.kind(), "producer opened");
    Ok(DraftCell::new(shallow_copy(state)))
}

fn close(cell: DraftCell) -> Produced {
    let (root, log) = cell.into_parts();
    tracing::debug!(copies = log.len(), "producer closed");
    Produced { root, log }
}
