//! Copy-on-write state trees with mutable-looking drafts.
//!
//! `spine-state` produces the next version of a state tree from a closure
//! that edits a draft as if it were mutable. The input tree is never
//! modified; the output reuses every node the closure did not touch, so the
//! cost of an update is proportional to the depth of the edited paths, not the
//! size of the tree.
//!
//! # Core Concepts
//!
//! - **Value**: a state node. Records, lists, maps and sets are containers
//!   behind `Arc`, so cloning a tree is cheap and equality can short-circuit
//!   on identity
//! - **Path**: a sequence of segments addressing a node
//! - **apply_at_path**: the copy-on-write updater; it copies each spine node
//!   at most once per update and leaves siblings shared
//! - **Draft**: a path-addressed handle the producer closure writes through
//! - **produce**: validates the root, runs the closure, returns the new root
//! - **Store / Query**: an observable root with path queries and subscribers
//!
//! # Quick Start
//!
//! ```
//! use spine_state::{produce, Value};
//! use serde_json::json;
//!
//! let state = Value::from(json!({
//!     "user": {"name": "Ada", "langs": ["en"]},
//!     "settings": {"theme": "dark"}
//! }));
//!
//! let next = produce(&state, |draft| {
//!     let user = draft.at("user");
//!     user.set("name", "Grace");
//!     user.at("langs").push("fr").unwrap();
//! })
//! .unwrap();
//!
//! assert_eq!(next.get("user").unwrap().get("name"), Some(&Value::from("Grace")));
//! assert_eq!(state.get("user").unwrap().get("name"), Some(&Value::from("Ada")));
//!
//! // Untouched subtrees are shared, not copied
//! assert!(next.get("settings").unwrap().same_node(state.get("settings").unwrap()));
//! ```
//!
//! # Maps, Sets and Dates
//!
//! ```
//! use spine_state::{produce, Value};
//!
//! let state = Value::record([
//!     ("tags", Value::set([Value::from("a")])),
//!     ("index", Value::map([(Value::from(1), Value::from("one"))])),
//! ]);
//!
//! let next = produce(&state, |draft| {
//!     draft.at("tags").as_set().unwrap().add("b").unwrap();
//!     draft.at("index").as_map().unwrap().insert(2, "two").unwrap();
//! })
//! .unwrap();
//!
//! assert_eq!(next.get("tags").unwrap().len(), Some(2));
//! assert_eq!(state.get("tags").unwrap().len(), Some(1));
//! ```

mod copy;
mod draft;
mod error;
mod guard;
mod ops;
mod path;
mod produce;
mod store;
mod updater;
mod value;

// Core types
pub use copy::{deep_clone, shallow_copy};
pub use error::{SpineError, SpineResult};
pub use guard::assert_valid_root;
pub use path::{Path, Seg};
pub use updater::{
    apply_at_path, apply_edit, get_at_path, CopyLog, Edit, WriteOutcome, MAX_SPARSE_EXTENSION,
};
pub use value::{classify, DateNode, Kind, List, MapNode, OpaqueKind, Record, SetNode, Value};

// Drafts
pub use draft::{Draft, Field};
pub use ops::{DateDraft, DateOp, DraftOp, MapDraft, MapOp, SetDraft, SetOp};
pub use produce::{produce, produce_with_log, try_produce, Produced};

// Store
pub use store::{Change, ChangeKind, ChangeSource, Query, Store, StoreConfig, SubscriptionId};

// Re-export chrono's duration type used by date drafts
pub use chrono::TimeDelta;
