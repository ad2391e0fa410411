//! Pathstate core: fine-grained reactive state
//!
//! Wraps plain value trees so that reads can be tracked by path and writes
//! notify exactly the listeners whose paths they affect:
//! - `Engine`: owns the view cache, tracker, listener registry and
//!   initialization state
//! - `View`: tracked, notifying access to one map or array in a `Target`
//! - `Path`: dot-separated address of a location (`"user.profile.age"`)
//! - `Subscription`: selector-based subscription with the external-store
//!   shape (`subscribe` / `get_snapshot`)
//! - `Initializer` / `Initialization`: deduplicated, cached asynchronous
//!   population of a store
//!
//! Everything is single-threaded: handles are `Rc`-based and notification
//! runs synchronously before the mutating call returns.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use pathstate_core::{path, Engine, Target, Value};
//!
//! let engine = Engine::new();
//! let target = Target::new(Value::map());
//! let store = engine.wrap(&target).unwrap();
//!
//! let hits = Rc::new(Cell::new(0));
//! let seen = hits.clone();
//! let _listener = engine.register_path(path!("count"), move |_| seen.set(seen.get() + 1));
//!
//! store.set("count", 1).unwrap();
//! store.set("count", 1).unwrap();
//! assert_eq!(hits.get(), 1);
//! ```

mod array;
mod engine;
mod error;
pub mod init;
mod path;
mod registry;
mod subscription;
mod target;
mod tracker;
mod value;
mod view;

pub use array::compare_values;
pub use engine::{Engine, EngineConfig};
pub use error::{Error, InitError, Result};
pub use init::{
    Initialization, Initializer, PendingHandle, RunOptions, Snapshot, DEFAULT_KEY,
};
pub use path::{parse_index, Path, PathError, LENGTH, SEPARATOR};
pub use registry::{Callback, ListenerId, NotifyOptions, Registration};
pub use subscription::Subscription;
pub use target::{Target, TargetId};
pub use tracker::Tracker;
pub use value::{Value, MAX_ARRAY_PADDING};
pub use view::{View, WrapConfig};
