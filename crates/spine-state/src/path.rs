//! Paths addressing nodes inside a state tree.
//!
//! A path is a sequence of segments walked from the root. How a segment is
//! interpreted depends on the container it is applied to: records take field
//! names, lists and sets take positions, maps take arbitrary key values.

use crate::Value;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// A single segment in a path.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Seg {
    /// Field name (records) or string key (maps).
    Key(String),
    /// Position (lists, sets) or numeric key (maps).
    Index(usize),
    /// Arbitrary map key.
    Entry(Value),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Create a map-entry segment keyed by an arbitrary value.
    #[inline]
    pub fn entry(key: impl Into<Value>) -> Self {
        Seg::Entry(key.into())
    }

    /// Field name this segment addresses in a record.
    ///
    /// Indices become their decimal form; entry keys qualify only when they
    /// are strings or integral numbers.
    pub fn record_key(&self) -> Option<Cow<'_, str>> {
        match self {
            Seg::Key(k) => Some(Cow::Borrowed(k.as_str())),
            Seg::Index(i) => Some(Cow::Owned(i.to_string())),
            Seg::Entry(Value::String(s)) => Some(Cow::Borrowed(s.as_str())),
            Seg::Entry(v) => v.as_position().map(|i| Cow::Owned(i.to_string())),
        }
    }

    /// Position this segment addresses in a list or set.
    pub fn position(&self) -> Option<usize> {
        match self {
            Seg::Index(i) => Some(*i),
            Seg::Key(k) => parse_position(k),
            Seg::Entry(v) => v.as_position(),
        }
    }

    /// Key this segment addresses in a map.
    pub fn map_key(&self) -> Value {
        match self {
            Seg::Key(k) => Value::String(k.clone()),
            Seg::Index(i) => Value::from(*i),
            Seg::Entry(v) => v.clone(),
        }
    }
}

fn parse_position(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
            Seg::Entry(v) => write!(f, "{{{}}}", v),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A complete path into a state tree. The empty path is the root.
///
/// # Examples
///
/// ```
/// use spine_state::Path;
///
/// let path = Path::root().key("users").index(0).key("name");
/// assert_eq!(path.len(), 3);
/// assert_eq!(path, Path::parse("users.0.name"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (root).
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty path (alias for `new`).
    #[inline]
    pub fn root() -> Self {
        Self::new()
    }

    /// Parse a dot-delimited path.
    ///
    /// Segments made only of ASCII digits become [`Seg::Index`]; everything
    /// else becomes [`Seg::Key`]. The empty string is the root.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        path.split('.')
            .map(|segment| match parse_position(segment) {
                Some(i) => Seg::Index(i),
                None => Seg::Key(segment.to_owned()),
            })
            .collect()
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment onto the path (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Pop the last segment from the path.
    #[inline]
    pub fn pop(&mut self) -> Option<Seg> {
        self.0.pop()
    }

    /// Get the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Check if this path is empty (root).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of segments in this path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the last segment.
    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Append a segment and return a new path (non-mutating builder).
    #[inline]
    pub fn with_segment(&self, seg: Seg) -> Path {
        let mut result = self.clone();
        result.0.push(seg);
        result
    }

    /// Check if this path is a prefix of another path.
    ///
    /// ```
    /// use spine_state::path;
    ///
    /// let parent = path!("user");
    /// let child = path!("user", "name");
    ///
    /// assert!(parent.is_prefix_of(&child));
    /// assert!(!child.is_prefix_of(&parent));
    /// ```
    #[inline]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Get the parent path (path without the last segment).
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            let mut p = self.clone();
            p.pop();
            Some(p)
        }
    }

    /// The first `len` segments as a new path.
    #[inline]
    pub fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = Seg;
    type IntoIter = std::vec::IntoIter<Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::parse(path)
    }
}

impl From<String> for Path {
    fn from(path: String) -> Self {
        Path::parse(&path)
    }
}

impl From<usize> for Path {
    fn from(i: usize) -> Self {
        Path(vec![Seg::Index(i)])
    }
}

impl From<Seg> for Path {
    fn from(seg: Seg) -> Self {
        Path(vec![seg])
    }
}

impl From<Vec<Seg>> for Path {
    fn from(segments: Vec<Seg>) -> Self {
        Path(segments)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

/// Construct a `Path` from a sequence of segments.
///
/// # Examples
///
/// ```
/// use spine_state::path;
///
/// // String literals become Key segments
/// let p = path!("users", "alice", "email");
///
/// // Numbers become Index segments
/// let p = path!("items", 0, "name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::path!(@seg $seg));
        )+
        p
    }};
    (@seg $seg:expr) => {
        $crate::Seg::from($seg)
    };
}
