//! Typed operations on map, set and date drafts.
//!
//! Each container kind with its own mutation API gets an operation enum.
//! [`Draft::dispatch`] runs an operation against the node at the draft's
//! path: mutating operations copy the node fresh, apply the change to the
//! copy, install it through the path updater and return the new node;
//! read-like operations return their natural result and leave the tree alone.

use crate::draft::{Draft, Field};
use crate::error::{SpineError, SpineResult};
use crate::value::{DateNode, MapNode, SetNode};
use crate::{Seg, Value};
use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use std::sync::Arc;

/// Operation on a map draft.
#[derive(Clone, Debug, PartialEq)]
pub enum MapOp {
    Get(Value),
    Has(Value),
    Len,
    Keys,
    Values,
    Entries,
    Insert(Value, Value),
    Remove(Value),
    Clear,
}

impl MapOp {
    pub fn is_mutating(&self) -> bool {
        matches!(self, MapOp::Insert(..) | MapOp::Remove(_) | MapOp::Clear)
    }
}

/// Operation on a set draft.
#[derive(Clone, Debug, PartialEq)]
pub enum SetOp {
    Has(Value),
    Len,
    Values,
    Add(Value),
    Remove(Value),
    Clear,
    /// Swap an element for another, in place. Duplicates collapse.
    Replace { old: Value, new: Value },
}

impl SetOp {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            SetOp::Add(_) | SetOp::Remove(_) | SetOp::Clear | SetOp::Replace { .. }
        )
    }
}

/// Operation on a date draft. Months and days are 1-based.
#[derive(Clone, Debug, PartialEq)]
pub enum DateOp {
    Millis,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    SetMillis(i64),
    SetYear(i32),
    SetMonth(u32),
    SetDay(u32),
    SetHour(u32),
    SetMinute(u32),
    SetSecond(u32),
    SetMillisecond(u32),
    AdvanceBy(TimeDelta),
}

impl DateOp {
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            DateOp::Millis
                | DateOp::Year
                | DateOp::Month
                | DateOp::Day
                | DateOp::Hour
                | DateOp::Minute
                | DateOp::Second
                | DateOp::Millisecond
        )
    }
}

/// Any draft operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DraftOp {
    Map(MapOp),
    Set(SetOp),
    Date(DateOp),
}

impl From<MapOp> for DraftOp {
    fn from(op: MapOp) -> Self {
        DraftOp::Map(op)
    }
}

impl From<SetOp> for DraftOp {
    fn from(op: SetOp) -> Self {
        DraftOp::Set(op)
    }
}

impl From<DateOp> for DraftOp {
    fn from(op: DateOp) -> Self {
        DraftOp::Date(op)
    }
}

impl<'s> Draft<'s> {
    /// Run a typed operation against the node at this draft.
    ///
    /// Mutating operations return the new map, set or date; read-like
    /// operations return their result (`Undefined` for a missing map key,
    /// `Bool` for membership, `Number` for sizes, lists for iteration).
    pub fn dispatch(&self, op: impl Into<DraftOp>) -> SpineResult<Value> {
        match op.into() {
            DraftOp::Map(op) => self.dispatch_map(op),
            DraftOp::Set(op) => self.dispatch_set(op),
            DraftOp::Date(op) => self.dispatch_date(op),
        }
    }

    fn install(&self, node: Value) -> Value {
        // The node was just resolved at this path, so the write cannot halt.
        let outcome = self.replace(node.clone());
        debug_assert!(outcome.is_applied(), "install halted: {outcome:?}");
        node
    }

    fn dispatch_map(&self, op: MapOp) -> SpineResult<Value> {
        let map = self.map_node()?;
        let value = match op {
            MapOp::Get(key) => map.get(&key).cloned().unwrap_or_default(),
            MapOp::Has(key) => Value::Bool(map.contains_key(&key)),
            MapOp::Len => Value::from(map.len()),
            MapOp::Keys => Value::list(map.keys().cloned().collect::<Vec<_>>()),
            MapOp::Values => Value::list(map.values().cloned().collect::<Vec<_>>()),
            MapOp::Entries => Value::list(
                map.iter()
                    .map(|(k, v)| Value::list([k.clone(), v.clone()]))
                    .collect::<Vec<_>>(),
            ),
            MapOp::Insert(key, value) => self.rewrite(map, |m| {
                m.insert(key, value);
            }),
            MapOp::Remove(key) => self.rewrite(map, |m| {
                m.remove(&key);
            }),
            MapOp::Clear => self.rewrite(map, MapNode::clear),
        };
        Ok(value)
    }

    fn dispatch_set(&self, op: SetOp) -> SpineResult<Value> {
        let set = self.set_node()?;
        let value = match op {
            SetOp::Has(value) => Value::Bool(set.contains(&value)),
            SetOp::Len => Value::from(set.len()),
            SetOp::Values => Value::list(set.iter().cloned().collect::<Vec<_>>()),
            SetOp::Add(value) => self.rewrite(set, |s| {
                s.insert(value);
            }),
            SetOp::Remove(value) => self.rewrite(set, |s| {
                s.remove(&value);
            }),
            SetOp::Clear => self.rewrite(set, SetNode::clear),
            SetOp::Replace { old, new } => self.rewrite(set, |s| {
                if let Some(i) = s.position(&old) {
                    s.replace_at(i, new);
                }
            }),
        };
        Ok(value)
    }

    /// Copy `node`, edit the copy and install it at this path.
    fn rewrite<T>(&self, node: Arc<T>, edit: impl FnOnce(&mut T)) -> Value
    where
        T: Clone,
        Value: From<T>,
    {
        let mut fresh = T::clone(&node);
        edit(&mut fresh);
        self.install(Value::from(fresh))
    }

    fn dispatch_date(&self, op: DateOp) -> SpineResult<Value> {
        let date = self.date_node()?;
        let at = date.instant();
        let changed = match op {
            DateOp::Millis => return Ok(Value::from(date.millis())),
            DateOp::Year => return Ok(Value::from(at.year())),
            DateOp::Month => return Ok(Value::from(at.month())),
            DateOp::Day => return Ok(Value::from(at.day())),
            DateOp::Hour => return Ok(Value::from(at.hour())),
            DateOp::Minute => return Ok(Value::from(at.minute())),
            DateOp::Second => return Ok(Value::from(at.second())),
            DateOp::Millisecond => return Ok(Value::from(at.timestamp_subsec_millis())),
            DateOp::SetMillis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| self.bad_date(format!("timestamp {ms}ms out of range")))?,
            DateOp::SetYear(y) => at
                .with_year(y)
                .ok_or_else(|| self.bad_date(format!("year {y} invalid for {at}")))?,
            DateOp::SetMonth(m) => at
                .with_month(m)
                .ok_or_else(|| self.bad_date(format!("month {m} invalid for {at}")))?,
            DateOp::SetDay(d) => at
                .with_day(d)
                .ok_or_else(|| self.bad_date(format!("day {d} invalid for {at}")))?,
            DateOp::SetHour(h) => at
                .with_hour(h)
                .ok_or_else(|| self.bad_date(format!("hour {h} out of range")))?,
            DateOp::SetMinute(m) => at
                .with_minute(m)
                .ok_or_else(|| self.bad_date(format!("minute {m} out of range")))?,
            DateOp::SetSecond(s) => at
                .with_second(s)
                .ok_or_else(|| self.bad_date(format!("second {s} out of range")))?,
            DateOp::SetMillisecond(ms) => set_millisecond(at, ms)
                .ok_or_else(|| self.bad_date(format!("millisecond {ms} out of range")))?,
            DateOp::AdvanceBy(delta) => at
                .checked_add_signed(delta)
                .ok_or_else(|| self.bad_date(format!("advancing by {delta} overflows")))?,
        };
        Ok(self.install(Value::Date(DateNode::new(changed))))
    }

    fn bad_date(&self, reason: String) -> SpineError {
        SpineError::invalid_date(self.path().clone(), reason)
    }

    /// Typed view over a map draft.
    pub fn as_map(&self) -> SpineResult<MapDraft<'s>> {
        self.map_node()?;
        Ok(MapDraft(self.clone()))
    }

    /// Typed view over a set draft.
    pub fn as_set(&self) -> SpineResult<SetDraft<'s>> {
        self.set_node()?;
        Ok(SetDraft(self.clone()))
    }

    /// Typed view over a date draft.
    pub fn as_date(&self) -> SpineResult<DateDraft<'s>> {
        self.date_node()?;
        Ok(DateDraft(self.clone()))
    }
}

fn set_millisecond(at: DateTime<Utc>, ms: u32) -> Option<DateTime<Utc>> {
    if ms >= 1000 {
        return None;
    }
    at.with_nanosecond(ms * 1_000_000)
}

/// Map draft with the map API spelled out.
#[derive(Clone, Debug)]
pub struct MapDraft<'s>(Draft<'s>);

impl<'s> MapDraft<'s> {
    pub fn draft(&self) -> &Draft<'s> {
        &self.0
    }

    /// Value under `key`; containers come back as nested drafts.
    pub fn get(&self, key: impl Into<Value>) -> Option<Field<'s>> {
        self.0.get(Seg::Entry(key.into()))
    }

    /// Nested draft for the entry under `key`.
    pub fn entry(&self, key: impl Into<Value>) -> Draft<'s> {
        self.0.at(Seg::Entry(key.into()))
    }

    pub fn has(&self, key: impl Into<Value>) -> SpineResult<bool> {
        Ok(self.0.dispatch(MapOp::Has(key.into()))?.as_bool() == Some(true))
    }

    pub fn len(&self) -> SpineResult<usize> {
        Ok(self.0.map_node()?.len())
    }

    pub fn is_empty(&self) -> SpineResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn keys(&self) -> SpineResult<Vec<Value>> {
        Ok(self.0.map_node()?.keys().cloned().collect())
    }

    /// Insert or overwrite, returning the new map.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> SpineResult<Value> {
        self.0.dispatch(MapOp::Insert(key.into(), value.into()))
    }

    /// Remove `key`, returning the new map.
    pub fn remove(&self, key: impl Into<Value>) -> SpineResult<Value> {
        self.0.dispatch(MapOp::Remove(key.into()))
    }

    pub fn clear(&self) -> SpineResult<Value> {
        self.0.dispatch(MapOp::Clear)
    }
}

/// Set draft with the set API spelled out.
#[derive(Clone, Debug)]
pub struct SetDraft<'s>(Draft<'s>);

impl<'s> SetDraft<'s> {
    pub fn draft(&self) -> &Draft<'s> {
        &self.0
    }

    /// Nested draft for the element at `index` in iteration order.
    ///
    /// Positions shift when earlier elements are removed; prefer
    /// [`SetDraft::replace`] when the element itself is known.
    pub fn nth(&self, index: usize) -> Draft<'s> {
        self.0.at(Seg::Index(index))
    }

    pub fn position(&self, value: &Value) -> SpineResult<Option<usize>> {
        Ok(self.0.set_node()?.position(value))
    }

    pub fn has(&self, value: impl Into<Value>) -> SpineResult<bool> {
        Ok(self.0.dispatch(SetOp::Has(value.into()))?.as_bool() == Some(true))
    }

    pub fn len(&self) -> SpineResult<usize> {
        Ok(self.0.set_node()?.len())
    }

    pub fn is_empty(&self) -> SpineResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn values(&self) -> SpineResult<Vec<Value>> {
        Ok(self.0.set_node()?.iter().cloned().collect())
    }

    /// Add `value`, returning the new set.
    pub fn add(&self, value: impl Into<Value>) -> SpineResult<Value> {
        self.0.dispatch(SetOp::Add(value.into()))
    }

    /// Remove `value`, returning the new set.
    pub fn remove(&self, value: impl Into<Value>) -> SpineResult<Value> {
        self.0.dispatch(SetOp::Remove(value.into()))
    }

    pub fn clear(&self) -> SpineResult<Value> {
        self.0.dispatch(SetOp::Clear)
    }

    /// Swap `old` for `new` at `old`'s position, returning the new set.
    pub fn replace(&self, old: impl Into<Value>, new: impl Into<Value>) -> SpineResult<Value> {
        self.0.dispatch(SetOp::Replace {
            old: old.into(),
            new: new.into(),
        })
    }
}

/// Date draft with getters and setters.
#[derive(Clone, Debug)]
pub struct DateDraft<'s>(Draft<'s>);

impl<'s> DateDraft<'s> {
    pub fn draft(&self) -> &Draft<'s> {
        &self.0
    }

    pub fn instant(&self) -> SpineResult<DateTime<Utc>> {
        Ok(self.0.date_node()?.instant())
    }

    pub fn millis(&self) -> SpineResult<i64> {
        Ok(self.0.date_node()?.millis())
    }

    pub fn set_millis(&self, millis: i64) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetMillis(millis))
    }

    pub fn set_year(&self, year: i32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetYear(year))
    }

    pub fn set_month(&self, month: u32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetMonth(month))
    }

    pub fn set_day(&self, day: u32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetDay(day))
    }

    pub fn set_hour(&self, hour: u32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetHour(hour))
    }

    pub fn set_minute(&self, minute: u32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetMinute(minute))
    }

    pub fn set_second(&self, second: u32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetSecond(second))
    }

    pub fn set_millisecond(&self, millisecond: u32) -> SpineResult<Value> {
        self.0.dispatch(DateOp::SetMillisecond(millisecond))
    }

    pub fn advance_by(&self, delta: TimeDelta) -> SpineResult<Value> {
        self.0.dispatch(DateOp::AdvanceBy(delta))
    }
}
