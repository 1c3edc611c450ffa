//! The dynamically-typed state model.
//!
//! Containers live behind `Arc`, so cloning a [`Value`] is cheap and two values
//! can share a subtree. Reference identity of container nodes is what
//! structural sharing is measured by (see [`Value::same_node`]).

use crate::error::SpineResult;
use crate::Seg;
use chrono::{DateTime, Utc};
use indexmap::{Equivalent, IndexMap, IndexSet};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// String-keyed record, read back in insertion order.
pub type Record = IndexMap<String, Value>;

/// Largest integer an `f64` holds exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Ordered, integer-indexed sequence. Holes are [`Value::Undefined`].
pub type List = Vec<Value>;

/// A node of a state tree.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent value; also fills holes left by sparse list writes.
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Record(Arc<Record>),
    List(Arc<List>),
    Map(Arc<MapNode>),
    Set(Arc<SetNode>),
    Date(DateNode),
    /// Built-in the engine refuses to handle.
    Opaque(OpaqueKind),
}

/// Classification of a [`Value`] by its variant tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Record,
    List,
    Map,
    Set,
    Date,
    Scalar,
    Unsupported,
}

impl Kind {
    /// Stable lowercase name, used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Record => "record",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Set => "set",
            Kind::Date => "date",
            Kind::Scalar => "scalar",
            Kind::Unsupported => "unsupported",
        }
    }

    /// Record, list, map or set.
    pub fn is_container(self) -> bool {
        matches!(self, Kind::Record | Kind::List | Kind::Map | Kind::Set)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque built-ins that are rejected rather than copied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpaqueKind {
    RegExp,
    Promise,
    Error,
    BigInt,
    Binary,
    TypedArray,
    WeakCollection,
}

impl OpaqueKind {
    pub fn name(self) -> &'static str {
        match self {
            OpaqueKind::RegExp => "regexp",
            OpaqueKind::Promise => "promise",
            OpaqueKind::Error => "error",
            OpaqueKind::BigInt => "bigint",
            OpaqueKind::Binary => "binary",
            OpaqueKind::TypedArray => "typed-array",
            OpaqueKind::WeakCollection => "weak-collection",
        }
    }
}

/// Determine the [`Kind`] of a value.
pub fn classify(value: &Value) -> Kind {
    match value {
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Kind::Scalar
        }
        Value::Record(_) => Kind::Record,
        Value::List(_) => Kind::List,
        Value::Map(_) => Kind::Map,
        Value::Set(_) => Kind::Set,
        Value::Date(_) => Kind::Date,
        Value::Opaque(_) => Kind::Unsupported,
    }
}

/// Hash-map key comparing values with [`Value::same_value_zero`].
///
/// Numbers hash by their bits with `-0` folded into `+0` and every `NaN`
/// folded into one; containers hash by node identity.
#[derive(Clone, Debug)]
struct SvzKey(Value);

/// Borrowed form of [`SvzKey`] for lookups.
struct SvzRef<'a>(&'a Value);

fn hash_same_value_zero<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Undefined | Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Number(n) => {
            let bits = if n.is_nan() {
                f64::NAN.to_bits()
            } else if *n == 0.0 {
                0
            } else {
                n.to_bits()
            };
            bits.hash(state);
        }
        Value::String(s) => s.hash(state),
        Value::Date(d) => d.hash(state),
        Value::Opaque(kind) => kind.hash(state),
        Value::Record(_) | Value::List(_) | Value::Map(_) | Value::Set(_) => {
            value.node_id().hash(state)
        }
    }
}

impl PartialEq for SvzKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_value_zero(&other.0)
    }
}

impl Eq for SvzKey {}

impl Hash for SvzKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_same_value_zero(&self.0, state);
    }
}

impl Hash for SvzRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_same_value_zero(self.0, state);
    }
}

impl Equivalent<SvzKey> for SvzRef<'_> {
    fn equivalent(&self, key: &SvzKey) -> bool {
        self.0.same_value_zero(&key.0)
    }
}

/// Key-value map whose keys may be any value.
///
/// Entries keep insertion order; keys are unique under
/// [`Value::same_value_zero`].
#[derive(Clone, Debug, Default)]
pub struct MapNode {
    entries: IndexMap<SvzKey, Value>,
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(&SvzRef(key))
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(&SvzRef(key))
    }

    /// Insert or overwrite. An existing key keeps its position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries.insert(SvzKey(key), value)
    }

    /// Remove `key`, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.shift_remove(&SvzRef(key))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.keys().map(|k| &k.0)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Slot for `key`, appending an `Undefined` entry when absent.
    pub(crate) fn slot(&mut self, key: Value) -> &mut Value {
        self.entries.entry(SvzKey(key)).or_insert(Value::Undefined)
    }
}

impl FromIterator<(Value, Value)> for MapNode {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (SvzKey(k), v)).collect(),
        }
    }
}

impl PartialEq for MapNode {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

/// Set of unique values (under [`Value::same_value_zero`]) in insertion order.
///
/// Elements can also be addressed by position in iteration order, which is
/// how paths descend into a set. Positions are not stable across inserts and
/// removals.
#[derive(Clone, Debug, Default)]
pub struct SetNode {
    items: IndexSet<SvzKey>,
}

impl SetNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, value: &Value) -> Option<usize> {
        self.items.get_index_of(&SvzRef(value))
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(&SvzRef(value))
    }

    /// Returns false when the value was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        self.items.insert(SvzKey(value))
    }

    /// Remove `value`, keeping the order of the remaining elements.
    pub fn remove(&mut self, value: &Value) -> bool {
        self.items.shift_remove(&SvzRef(value))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn nth(&self, index: usize) -> Option<&Value> {
        self.items.get_index(index).map(|k| &k.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().map(|k| &k.0)
    }

    /// Take the element at `index` out of the set.
    pub(crate) fn take_at(&mut self, index: usize) -> Option<Value> {
        self.items.shift_remove_index(index).map(|k| k.0)
    }

    /// Place `value` at `index` (at most `len`).
    ///
    /// An equal element before `index` wins and `value` is dropped; an equal
    /// element at or after `index` is removed, so the first occurrence is
    /// the one kept.
    pub(crate) fn put_at(&mut self, index: usize, value: Value) {
        match self.items.get_index_of(&SvzRef(&value)) {
            Some(existing) if existing < index => {}
            Some(existing) => {
                self.items.shift_remove_index(existing);
                self.items.shift_insert(index, SvzKey(value));
            }
            None => {
                self.items.shift_insert(index, SvzKey(value));
            }
        }
    }

    /// Overwrite the element at `index` (below `len`), collapsing duplicates.
    pub(crate) fn replace_at(&mut self, index: usize, value: Value) {
        if self.take_at(index).is_some() {
            self.put_at(index, value);
        }
    }
}

impl FromIterator<Value> for SetNode {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(SvzKey).collect(),
        }
    }
}

impl PartialEq for SetNode {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

/// An instant, mutated only through date operations on a draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateNode(DateTime<Utc>);

impl DateNode {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// `None` when the timestamp is outside the representable range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Value {
    /// Build a record from `(field, value)` pairs.
    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(Arc::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn empty_record() -> Self {
        Value::Record(Arc::new(Record::new()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Arc::new(items.into_iter().collect()))
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Arc::new(entries.into_iter().collect()))
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Arc::new(items.into_iter().collect()))
    }

    /// Date value from epoch milliseconds; `None` when out of range.
    pub fn date_from_millis(millis: i64) -> Option<Self> {
        DateNode::from_millis(millis).map(Value::Date)
    }

    pub fn kind(&self) -> Kind {
        classify(self)
    }

    /// Type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Record(_) => "record",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Date(_) => "date",
            Value::Opaque(kind) => kind.name(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    /// `Null` or `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetNode> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateNode> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Non-negative integral number as a position. Numbers past 2^53 are
    /// not exact integers and never qualify.
    pub fn as_position(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.fract() == 0.0 && (0.0..=MAX_SAFE_INTEGER).contains(n) => {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Number of immediate entries of a container.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Record(r) => Some(r.len()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            Value::Set(s) => Some(s.len()),
            _ => None,
        }
    }

    /// Address of the container node, if this is a container.
    pub fn node_id(&self) -> Option<usize> {
        match self {
            Value::Record(a) => Some(Arc::as_ptr(a) as *const () as usize),
            Value::List(a) => Some(Arc::as_ptr(a) as *const () as usize),
            Value::Map(a) => Some(Arc::as_ptr(a) as *const () as usize),
            Value::Set(a) => Some(Arc::as_ptr(a) as *const () as usize),
            _ => None,
        }
    }

    /// True when both values are the same container node.
    ///
    /// This is the reference-identity check behind structural sharing.
    pub fn same_node(&self, other: &Value) -> bool {
        match (self.node_id(), other.node_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Key/element equality used by maps and sets.
    ///
    /// Numbers compare by value with `NaN` equal to itself; containers compare
    /// by node identity; dates by instant; opaque values by kind.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => self.same_node(other),
        }
    }

    /// Immediate child addressed by `seg`, read-only.
    pub fn get(&self, seg: impl Into<Seg>) -> Option<&Value> {
        self.child(&seg.into())
    }

    pub(crate) fn child(&self, seg: &Seg) -> Option<&Value> {
        match self {
            Value::Record(r) => r.get(seg.record_key()?.as_ref()),
            Value::List(l) => l.get(seg.position()?),
            Value::Map(m) => m.get(&seg.map_key()),
            Value::Set(s) => s.nth(seg.position()?),
            _ => None,
        }
    }

    /// Convert to JSON through [`Serialize`].
    pub fn to_json(&self) -> SpineResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write_number(f, *n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Record(r) => {
                f.write_str("{")?;
                for (i, (k, v)) in r.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("Map{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} => {}", k, v)?;
                }
                f.write_str("}")
            }
            Value::Set(s) => {
                f.write_str("Set{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
            Value::Date(d) => write!(f, "{}", d.instant().to_rfc3339()),
            Value::Opaque(kind) => write!(f, "<{}>", kind.name()),
        }
    }
}

struct Pair<'a>(&'a Value, &'a Value);

impl Serialize for Pair<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(self.0)?;
        seq.serialize_element(self.1)?;
        seq.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                // Integral numbers serialize as integers so they round-trip to JSON ints.
                if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.len()))?;
                for (k, v) in r.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::List(l) => {
                let mut seq = serializer.serialize_seq(Some(l.len()))?;
                for v in l.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut seq = serializer.serialize_seq(Some(m.len()))?;
                for (k, v) in m.iter() {
                    seq.serialize_element(&Pair(k, v))?;
                }
                seq.end()
            }
            Value::Set(s) => {
                let mut seq = serializer.serialize_seq(Some(s.len()))?;
                for v in s.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Date(d) => serializer.serialize_i64(d.millis()),
            Value::Opaque(kind) => Err(S::Error::custom(format!(
                "cannot serialize opaque {} value",
                kind.name()
            ))),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Value::record(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(Arc::new(r))
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Value::List(Arc::new(l))
    }
}

impl From<MapNode> for Value {
    fn from(m: MapNode) -> Self {
        Value::Map(Arc::new(m))
    }
}

impl From<SetNode> for Value {
    fn from(s: SetNode) -> Self {
        Value::Set(Arc::new(s))
    }
}

impl From<DateNode> for Value {
    fn from(d: DateNode) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(DateNode::new(d))
    }
}

impl From<OpaqueKind> for Value {
    fn from(kind: OpaqueKind) -> Self {
        Value::Opaque(kind)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
