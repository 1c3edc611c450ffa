//! Observable state container with path queries.
//!
//! A [`Store`] holds one root value and a set of subscribers. [`Query`]
//! handles address a path inside it; writing through a query rebuilds the
//! root with copy-on-write and notifies every subscriber with the new root.

use crate::copy::{deep_clone, shallow_copy};
use crate::draft::Draft;
use crate::error::SpineResult;
use crate::produce::produce;
use crate::updater::{apply_at_path, get_at_path};
use crate::{Path, Seg, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Deep-copy every value on the way in, so the store never shares nodes
    /// with values the caller still holds.
    pub detach: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { detach: true }
    }
}

impl StoreConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SpineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What triggered a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    Set,
}

/// What kind of change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Update,
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// Path that was written (empty for the root).
    pub path: Path,
    #[serde(rename = "from")]
    pub source: ChangeSource,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Root value after the write.
    pub value: Value,
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&[Change]) + Send + Sync>;

struct Inner {
    value: Value,
    config: StoreConfig,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_id: u64,
}

/// Shared, observable root value.
///
/// Cloning the handle shares the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Store")
            .field("value", &inner.value)
            .field("config", &inner.config)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl Store {
    /// Create a store with the default config.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_config(value, StoreConfig::default())
    }

    pub fn with_config(value: impl Into<Value>, config: StoreConfig) -> Self {
        let value = ingest(&config, value.into());
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                config,
                subscribers: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> StoreConfig {
        self.lock().config.clone()
    }

    /// Current root value.
    pub fn get(&self) -> Value {
        self.lock().value.clone()
    }

    /// Query at the root.
    pub fn root(&self) -> Query {
        Query {
            store: self.clone(),
            path: Path::root(),
        }
    }

    /// Query at `path`.
    pub fn query(&self, path: impl Into<Path>) -> Query {
        Query {
            store: self.clone(),
            path: path.into(),
        }
    }

    /// Register `f` to be called after every write.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&[Change]) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.insert(id, Arc::new(f));
        id
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Run a producer against the current root and store its result.
    ///
    /// The store is not locked while `mutate` runs; a write made from inside
    /// `mutate` is overwritten by the produced root.
    pub fn produce<F>(&self, mutate: F) -> SpineResult<Value>
    where
        F: FnOnce(&Draft<'_>),
    {
        let next = produce(&self.get(), mutate)?;
        Ok(self.commit(Path::root(), |_| next))
    }

    /// Build the next root under the lock, store it, then notify outside it.
    fn commit(&self, path: Path, build: impl FnOnce(&Inner) -> Value) -> Value {
        let (root, subscribers) = {
            let mut inner = self.lock();
            let root = build(&inner);
            inner.value = root.clone();
            let subscribers: Vec<Subscriber> = inner.subscribers.values().cloned().collect();
            (root, subscribers)
        };

        tracing::debug!(path = %path, subscribers = subscribers.len(), "store updated");
        let changes = [Change {
            path,
            source: ChangeSource::Set,
            kind: ChangeKind::Update,
            value: root.clone(),
        }];
        for subscriber in &subscribers {
            subscriber(&changes);
        }
        root
    }
}

fn ingest(config: &StoreConfig, value: Value) -> Value {
    if config.detach {
        deep_clone(&value)
    } else {
        value
    }
}

/// Handle on one path of a [`Store`].
#[derive(Clone, Debug)]
pub struct Query {
    store: Store,
    path: Path,
}

impl Query {
    /// Query one level deeper.
    pub fn q(&self, key: impl Into<Seg>) -> Query {
        Query {
            store: self.store.clone(),
            path: self.path.with_segment(key.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Value at this path, `Undefined` if the path does not resolve.
    pub fn get(&self) -> Value {
        let inner = self.store.lock();
        get_at_path(&inner.value, &self.path)
            .cloned()
            .unwrap_or_default()
    }

    /// Write `value` at this path and return the new root.
    ///
    /// At the root this replaces the whole value. Below it, the root is
    /// copied (a scalar or null root becomes an empty record) and the write
    /// goes through [`apply_at_path`].
    pub fn set(&self, value: impl Into<Value>) -> Value {
        let path = self.path.clone();
        let value = value.into();
        self.store.commit(self.path.clone(), move |inner| {
            let value = ingest(&inner.config, value);
            if path.is_empty() {
                return value;
            }
            let mut root = if inner.value.is_container() {
                shallow_copy(&inner.value)
            } else {
                Value::empty_record()
            };
            let outcome = apply_at_path(&mut root, path, value, false);
            if !outcome.is_applied() {
                // Keep the stored root as it was; subscribers still hear about the write.
                return inner.value.clone();
            }
            root
        })
    }

    /// Write `f(current)` at this path and return the new root.
    ///
    /// `f` runs without the store locked.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) -> Value {
        let next = f(&self.get());
        self.set(next)
    }

    /// Subscribe to every change of the store this query belongs to.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&[Change]) + Send + Sync + 'static,
    {
        self.store.subscribe(f)
    }

    /// Whole root value of the store.
    pub fn state(&self) -> Value {
        self.store.get()
    }
}
