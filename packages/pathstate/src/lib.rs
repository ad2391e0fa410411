//! Pathstate: fine-grained reactive state over plain value trees.
//!
//! Reads through a view are tracked by path; writes notify exactly the
//! listeners whose paths they affect. Typed access via serde lives in
//! [`serde`].

pub use pathstate_core::*;

/// Typed access through serde.
pub mod serde {
    pub use pathstate_serde::{
        from_value, initializer_from, json_to_value, selection_as, to_value, typed_future,
        typed_sync, value_to_json, Error, Result, TypedView,
    };
}
