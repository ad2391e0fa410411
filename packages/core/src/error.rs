//! Error types for the engine.

use crate::path::{Path, PathError};

/// Errors returned synchronously by engine operations.
///
/// These are programming or validation errors: a bad path, a write through a
/// view whose location no longer holds a container, a second default-key
/// initializer on one store. Failures inside initializers are reported as
/// [`InitError`] and kept as state instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Path validation error.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// The wrap target is not a structured value.
    #[error("invalid target at '{path}': expected a map or array, found {found}")]
    InvalidTarget { path: Path, found: &'static str },

    /// A key used on an array view is not a valid index.
    #[error("invalid array index '{component}' at '{path}'")]
    InvalidIndex { path: Path, component: String },

    /// An array operation was used on a view that does not hold an array.
    #[error("'{path}' is not an array")]
    NotAnArray { path: Path },

    /// The view's location was replaced by a non-container or removed.
    #[error("location '{path}' no longer holds a structured value")]
    Detached { path: Path },

    /// A second default-key initializer was registered on one store.
    #[error(
        "duplicate initializer for key '{key}' on store '{store}': \
         only one initializer per store per key"
    )]
    DuplicateInitializer { store: String, key: String },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an initializer.
///
/// Cloneable so a single settled failure can be handed to every consumer
/// attached to the same pending computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InitError {
    message: String,
}

impl InitError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<Error> for InitError {
    fn from(e: Error) -> Self {
        InitError::new(e.to_string())
    }
}

impl From<String> for InitError {
    fn from(message: String) -> Self {
        InitError::new(message)
    }
}

impl From<&str> for InitError {
    fn from(message: &str) -> Self {
        InitError::new(message)
    }
}
