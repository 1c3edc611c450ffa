//! Copy-on-write writes at arbitrary depth.
//!
//! [`apply_at_path`] walks a path from a root it owns, makes each container on
//! the spine exclusively owned right before touching it, and applies the final
//! set or delete with the semantics of the container found there. A node that
//! is still shared with another tree is shallow-copied; a node this update has
//! already copied is reused, so repeated writes under one prefix copy that
//! prefix once.

use crate::value::SetNode;
use crate::{Kind, Path, Seg, Value};
use std::sync::Arc;

/// How far past the end of a list or set a write may reach. Writes further
/// out halt instead of padding.
pub const MAX_SPARSE_EXTENSION: usize = 1 << 16;

/// Terminal effect of a path write.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Set(Value),
    Delete,
}

/// What happened to a path write.
///
/// Writes never fail. When the walk reaches something it cannot descend
/// into, the rest of the write is dropped and the walk reports where.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOutcome {
    Applied,
    Halted {
        /// Path of the node the walk stopped at.
        at: Path,
        /// Kind of that node.
        found: Kind,
    },
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

/// Record of the spine copies made by one or more path writes.
#[derive(Clone, Debug, Default)]
pub struct CopyLog {
    copies: Vec<Path>,
}

impl CopyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every node copied, in copy order.
    pub fn copies(&self) -> &[Path] {
        &self.copies
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// How many times the node at `path` was copied.
    pub fn times_copied(&self, path: &Path) -> usize {
        self.copies.iter().filter(|p| *p == path).count()
    }

    fn note(&mut self, full: &Path, depth: usize, kind: Kind) {
        let at = full.prefix(depth);
        tracing::trace!(path = %at, kind = %kind, "copied spine node");
        self.copies.push(at);
    }
}

/// Set or delete the value at `path` under `root`.
///
/// Missing or non-container intermediates are replaced by empty records.
/// Lists and sets are addressed by position; a list delete splices and a set
/// delete removes the element at that position. An empty path replaces the
/// root (a delete leaves `Null`). A position more than
/// [`MAX_SPARSE_EXTENSION`] past the end halts the write.
///
/// # Examples
///
/// ```
/// use spine_state::{apply_at_path, Value};
/// use serde_json::json;
///
/// let original = Value::from(json!({"a": {"b": 1}, "c": [1, 2]}));
/// let mut root = original.clone();
///
/// assert!(apply_at_path(&mut root, "a.b", Value::from(2), false).is_applied());
/// assert!(apply_at_path(&mut root, "c.0", Value::Null, true).is_applied());
///
/// assert_eq!(root, Value::from(json!({"a": {"b": 2}, "c": [2]})));
/// assert_eq!(original, Value::from(json!({"a": {"b": 1}, "c": [1, 2]})));
/// ```
pub fn apply_at_path(
    root: &mut Value,
    path: impl Into<Path>,
    value: Value,
    is_delete: bool,
) -> WriteOutcome {
    let edit = if is_delete {
        Edit::Delete
    } else {
        Edit::Set(value)
    };
    apply_edit(root, &path.into(), edit, &mut CopyLog::new())
}

/// [`apply_at_path`] with an explicit edit, recording spine copies in `log`.
pub fn apply_edit(root: &mut Value, path: &Path, edit: Edit, log: &mut CopyLog) -> WriteOutcome {
    let outcome = walk(root, path.segments(), path, 0, edit, log);
    if let WriteOutcome::Halted { at, found } = &outcome {
        tracing::debug!(path = %path, at = %at, found = %found, "path write halted");
    }
    outcome
}

fn walk(
    current: &mut Value,
    segments: &[Seg],
    full: &Path,
    depth: usize,
    edit: Edit,
    log: &mut CopyLog,
) -> WriteOutcome {
    match segments {
        [] => {
            *current = match edit {
                Edit::Set(value) => value,
                Edit::Delete => Value::Null,
            };
            WriteOutcome::Applied
        }
        [last] => write_terminal(current, last, full, depth, edit, log),
        [seg, rest @ ..] => {
            let descended = match &mut *current {
                Value::Set(set) => descend_set(set, seg, rest, full, depth, edit, log),
                other => step(other, seg, full, depth, log)
                    .map(|child| walk(child, rest, full, depth + 1, edit, log)),
            };
            descended.unwrap_or_else(|| halted(current, full, depth))
        }
    }
}

fn halted(current: &Value, full: &Path, depth: usize) -> WriteOutcome {
    WriteOutcome::Halted {
        at: full.prefix(depth),
        found: current.kind(),
    }
}

/// Position `seg` addresses in a sequence of `len`, if a write may reach it.
///
/// Writes past the end pad with `Undefined`, at most
/// [`MAX_SPARSE_EXTENSION`] slots.
fn reachable(seg: &Seg, len: usize) -> Option<usize> {
    seg.position()
        .filter(|&index| index.saturating_sub(len) <= MAX_SPARSE_EXTENSION)
}

/// Make the node behind `node` exclusively owned, copying it if shared.
fn own<'a, T: Clone>(
    node: &'a mut Arc<T>,
    full: &Path,
    depth: usize,
    kind: Kind,
    log: &mut CopyLog,
) -> &'a mut T {
    if Arc::get_mut(node).is_none() {
        log.note(full, depth, kind);
    }
    Arc::make_mut(node)
}

/// Replace a non-container slot with an empty record.
fn vivify(slot: &mut Value) {
    if !slot.is_container() {
        *slot = Value::empty_record();
    }
}

/// Descend one segment, returning the (vivified) child slot.
fn step<'a>(
    current: &'a mut Value,
    seg: &Seg,
    full: &Path,
    depth: usize,
    log: &mut CopyLog,
) -> Option<&'a mut Value> {
    match current {
        Value::Record(record) => {
            let key = seg.record_key()?.into_owned();
            let record = own(record, full, depth, Kind::Record, log);
            let slot = record.entry(key).or_insert(Value::Undefined);
            vivify(slot);
            Some(slot)
        }
        Value::List(list) => {
            let index = reachable(seg, list.len())?;
            let list = own(list, full, depth, Kind::List, log);
            if index >= list.len() {
                list.resize(index, Value::Undefined);
                list.push(Value::Undefined);
            }
            let slot = &mut list[index];
            vivify(slot);
            Some(slot)
        }
        Value::Map(map) => {
            let map = own(map, full, depth, Kind::Map, log);
            let slot = map.slot(seg.map_key());
            vivify(slot);
            Some(slot)
        }
        _ => None,
    }
}

/// Descend into a set element and finish the write below it.
///
/// Set elements are hashed, so the element is taken out, written to, and
/// put back at its position.
fn descend_set(
    set: &mut Arc<SetNode>,
    seg: &Seg,
    rest: &[Seg],
    full: &Path,
    depth: usize,
    edit: Edit,
    log: &mut CopyLog,
) -> Option<WriteOutcome> {
    let index = reachable(seg, set.len())?;
    let set = own(set, full, depth, Kind::Set, log);
    let (position, mut child) = match set.take_at(index) {
        Some(child) => (index, child),
        None => {
            if index > set.len() {
                set.insert(Value::Undefined);
            }
            (set.len(), Value::Undefined)
        }
    };
    vivify(&mut child);
    let outcome = walk(&mut child, rest, full, depth + 1, edit, log);
    set.put_at(position, child);
    Some(outcome)
}

fn write_terminal(
    current: &mut Value,
    seg: &Seg,
    full: &Path,
    depth: usize,
    edit: Edit,
    log: &mut CopyLog,
) -> WriteOutcome {
    match current {
        Value::Record(record) => {
            let Some(key) = seg.record_key() else {
                return halted(current, full, depth);
            };
            let key = key.into_owned();
            let record = own(record, full, depth, Kind::Record, log);
            match edit {
                Edit::Set(value) => {
                    record.insert(key, value);
                }
                Edit::Delete => {
                    record.shift_remove(&key);
                }
            }
        }
        Value::List(list) => {
            let Some(index) = reachable(seg, list.len()) else {
                return halted(current, full, depth);
            };
            let list = own(list, full, depth, Kind::List, log);
            match edit {
                Edit::Set(value) if index < list.len() => list[index] = value,
                Edit::Set(value) => {
                    list.resize(index, Value::Undefined);
                    list.push(value);
                }
                Edit::Delete => {
                    if index < list.len() {
                        list.remove(index);
                    }
                }
            }
        }
        Value::Map(map) => {
            let key = seg.map_key();
            let map = own(map, full, depth, Kind::Map, log);
            match edit {
                Edit::Set(value) => {
                    map.insert(key, value);
                }
                Edit::Delete => {
                    map.remove(&key);
                }
            }
        }
        Value::Set(set) => {
            let Some(index) = reachable(seg, set.len()) else {
                return halted(current, full, depth);
            };
            let set = own(set, full, depth, Kind::Set, log);
            match edit {
                Edit::Set(value) if index < set.len() => set.replace_at(index, value),
                Edit::Set(value) => {
                    if index > set.len() {
                        set.insert(Value::Undefined);
                    }
                    set.put_at(set.len(), value);
                }
                Edit::Delete => {
                    set.take_at(index);
                }
            }
        }
        _ => return halted(current, full, depth),
    }
    WriteOutcome::Applied
}

/// Get a reference to a value at a path (for reading).
pub fn get_at_path<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, seg| current.child(seg))
}
