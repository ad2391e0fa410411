//! Serde integration for pathstate
//!
//! Typed access to reactive stores:
//! - `TypedView`: read and write Rust types through a view
//! - `initializer_from` / `typed_sync` / `typed_future`: initializers built
//!   from serializable data
//! - Value <-> serde and Value <-> JSON conversions
//!
//! Reads and writes keep the engine's semantics: typed reads are tracked and
//! typed writes notify only when the serialized value differs.

mod convert;
mod error;
mod typed;

pub use convert::{from_value, json_to_value, to_value, value_to_json};
pub use error::{Error, Result};
pub use typed::{initializer_from, selection_as, typed_future, typed_sync, TypedView};

// Re-export core types for convenience
pub use pathstate_core::{Engine, Path, Target, Value, View};
