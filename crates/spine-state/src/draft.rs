//! Drafts: mutable-looking handles over the tree a producer is building.
//!
//! A [`Draft`] is a path into the new root held by the running producer. Reads
//! resolve the path against the new root, so they see every earlier write;
//! writes go through the path updater, which copies the spine on first touch.
//! The original state is never reachable through a draft.

use crate::error::{SpineError, SpineResult};
use crate::updater::{apply_edit, get_at_path, CopyLog, Edit};
use crate::value::{DateNode, MapNode, SetNode};
use crate::{Kind, Path, Seg, Value, WriteOutcome};
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

/// Per-call state of one producer run: the new root and its copy log.
struct Session {
    root: Value,
    log: CopyLog,
}

/// Write-through cell shared by every draft of one producer run.
///
/// Owned by the running `produce` call; dropped (or unwrapped) when it
/// returns, so no clone-tracking state survives between calls.
pub(crate) struct DraftCell(RefCell<Session>);

impl DraftCell {
    pub(crate) fn new(root: Value) -> Self {
        Self(RefCell::new(Session {
            root,
            log: CopyLog::new(),
        }))
    }

    /// Clone of the node at `path`, if any.
    fn snapshot(&self, path: &Path) -> Option<Value> {
        get_at_path(&self.0.borrow().root, path).cloned()
    }

    fn read<R>(&self, path: &Path, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(get_at_path(&self.0.borrow().root, path))
    }

    fn apply(&self, path: &Path, edit: Edit) -> WriteOutcome {
        let mut session = self.0.borrow_mut();
        let Session { root, log } = &mut *session;
        apply_edit(root, path, edit, log)
    }

    pub(crate) fn into_parts(self) -> (Value, CopyLog) {
        let session = self.0.into_inner();
        (session.root, session.log)
    }
}

/// Handle over the node at one path of the tree being produced.
///
/// Cheap to clone. The `'s` lifetime ties it to the producer run.
#[derive(Clone)]
pub struct Draft<'s> {
    cell: &'s DraftCell,
    path: Path,
}

/// Result of reading through a draft.
#[derive(Clone, Debug)]
pub enum Field<'s> {
    /// Container or date: a nested draft at the child's path.
    Node(Draft<'s>),
    /// Scalar or opaque value, returned verbatim.
    Leaf(Value),
}

impl<'s> Field<'s> {
    pub fn into_draft(self) -> Option<Draft<'s>> {
        match self {
            Field::Node(draft) => Some(draft),
            Field::Leaf(_) => None,
        }
    }

    pub fn into_leaf(self) -> Option<Value> {
        match self {
            Field::Leaf(value) => Some(value),
            Field::Node(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Field::Node(_))
    }
}

impl fmt::Debug for Draft<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Draft").field("path", &self.path).finish_non_exhaustive()
    }
}

impl<'s> Draft<'s> {
    pub(crate) fn root(cell: &'s DraftCell) -> Self {
        Self {
            cell,
            path: Path::root(),
        }
    }

    /// Path of this draft from the producer root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of the current node, `None` when nothing is there.
    pub fn kind(&self) -> Option<Kind> {
        self.cell.read(&self.path, |node| node.map(Value::kind))
    }

    /// Current value of this node (`Undefined` when absent).
    ///
    /// The snapshot shares structure with the tree being built. Holding on to
    /// it makes the next write below this path copy again.
    pub fn snapshot(&self) -> Value {
        self.cell.snapshot(&self.path).unwrap_or_default()
    }

    /// Nested draft at `key`, whether or not anything is there yet.
    pub fn at(&self, key: impl Into<Seg>) -> Draft<'s> {
        Draft {
            cell: self.cell,
            path: self.path.with_segment(key.into()),
        }
    }

    /// Read the child at `key`.
    ///
    /// Containers and dates come back as nested drafts; scalars as values.
    pub fn get(&self, key: impl Into<Seg>) -> Option<Field<'s>> {
        let child = self.at(key);
        let kind = child.kind()?;
        if kind.is_container() || kind == Kind::Date {
            Some(Field::Node(child))
        } else {
            child.cell.snapshot(&child.path).map(Field::Leaf)
        }
    }

    /// Scalar child at `key`; `None` when absent or a container.
    pub fn scalar(&self, key: impl Into<Seg>) -> Option<Value> {
        self.get(key).and_then(Field::into_leaf)
    }

    /// Number of immediate entries (0 for non-containers).
    pub fn len(&self) -> usize {
        self.cell
            .read(&self.path, |node| node.and_then(Value::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segments addressing every immediate child, in iteration order.
    pub fn keys(&self) -> Vec<Seg> {
        self.cell.read(&self.path, |node| match node {
            Some(Value::Record(r)) => r.keys().map(|k| Seg::Key(k.clone())).collect(),
            Some(Value::List(l)) => (0..l.len()).map(Seg::Index).collect(),
            Some(Value::Map(m)) => m.keys().map(|k| Seg::Entry(k.clone())).collect(),
            Some(Value::Set(s)) => (0..s.len()).map(Seg::Index).collect(),
            _ => Vec::new(),
        })
    }

    /// Write `value` at `key` below this node.
    pub fn set(&self, key: impl Into<Seg>, value: impl Into<Value>) -> WriteOutcome {
        let path = self.path.with_segment(key.into());
        self.cell.apply(&path, Edit::Set(value.into()))
    }

    /// Delete the child at `key`.
    pub fn delete(&self, key: impl Into<Seg>) -> WriteOutcome {
        let path = self.path.with_segment(key.into());
        self.cell.apply(&path, Edit::Delete)
    }

    /// Overwrite this node itself.
    pub fn replace(&self, value: impl Into<Value>) -> WriteOutcome {
        self.cell.apply(&self.path, Edit::Set(value.into()))
    }

    /// Append to a list, returning its new length.
    pub fn push(&self, value: impl Into<Value>) -> SpineResult<usize> {
        let len = self.list()?.len();
        self.set(Seg::Index(len), value);
        Ok(len + 1)
    }

    /// Remove and return the last element of a list.
    pub fn pop(&self) -> SpineResult<Option<Value>> {
        let list = self.list()?;
        let Some(last) = list.last().cloned() else {
            return Ok(None);
        };
        let index = list.len() - 1;
        // Release the snapshot so the delete does not copy the list again.
        drop(list);
        self.delete(Seg::Index(index));
        Ok(Some(last))
    }

    pub(crate) fn mismatch(&self, expected: Kind, found: Option<&Value>) -> SpineError {
        SpineError::type_mismatch(
            self.path.clone(),
            expected.name(),
            found.map_or("undefined", Value::type_name),
        )
    }

    fn list(&self) -> SpineResult<Arc<Vec<Value>>> {
        match self.cell.snapshot(&self.path) {
            Some(Value::List(list)) => Ok(list),
            other => Err(self.mismatch(Kind::List, other.as_ref())),
        }
    }

    pub(crate) fn map_node(&self) -> SpineResult<Arc<MapNode>> {
        match self.cell.snapshot(&self.path) {
            Some(Value::Map(map)) => Ok(map),
            other => Err(self.mismatch(Kind::Map, other.as_ref())),
        }
    }

    pub(crate) fn set_node(&self) -> SpineResult<Arc<SetNode>> {
        match self.cell.snapshot(&self.path) {
            Some(Value::Set(set)) => Ok(set),
            other => Err(self.mismatch(Kind::Set, other.as_ref())),
        }
    }

    pub(crate) fn date_node(&self) -> SpineResult<DateNode> {
        match self.cell.snapshot(&self.path) {
            Some(Value::Date(date)) => Ok(date),
            other => Err(self.mismatch(Kind::Date, other.as_ref())),
        }
    }
}
