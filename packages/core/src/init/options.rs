//! Options for running an initializer.

use std::fmt;
use std::rc::Rc;

use crate::{InitError, Value};

/// Cache key used when the caller does not name one.
pub const DEFAULT_KEY: &str = "default";

pub type SuccessHook = Rc<dyn Fn(&Value)>;
pub type ErrorHook = Rc<dyn Fn(&InitError)>;

/// Options for [`Engine::run`](crate::Engine::run).
///
/// ```rust
/// use pathstate_core::{RunOptions, Value};
///
/// let options = RunOptions::new()
///     .key("profile")
///     .deps(vec![Value::from(42)])
///     .suspense(true);
/// assert_eq!(options.key, "profile");
/// ```
#[derive(Clone)]
pub struct RunOptions {
    /// Scope for deduplication and caching within one store.
    pub key: String,

    /// Values whose change re-runs the initializer.
    pub deps: Vec<Value>,

    /// Expose the pending handle to readers while the computation runs.
    pub suspense: bool,

    /// Surface a failure as `Snapshot::Failed` instead of only inline.
    pub error_boundary: bool,

    pub on_success: Option<SuccessHook>,
    pub on_error: Option<ErrorHook>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            deps: Vec::new(),
            suspense: false,
            error_boundary: false,
            on_success: None,
            on_error: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn deps(mut self, deps: Vec<Value>) -> Self {
        self.deps = deps;
        self
    }

    pub fn suspense(mut self, suspense: bool) -> Self {
        self.suspense = suspense;
        self
    }

    pub fn error_boundary(mut self, error_boundary: bool) -> Self {
        self.error_boundary = error_boundary;
        self
    }

    pub fn on_success(mut self, hook: impl Fn(&Value) + 'static) -> Self {
        self.on_success = Some(Rc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&InitError) + 'static) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }

    pub fn is_default_key(&self) -> bool {
        self.key == DEFAULT_KEY
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("key", &self.key)
            .field("deps", &self.deps)
            .field("suspense", &self.suspense)
            .field("error_boundary", &self.error_boundary)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = RunOptions::default();
        assert_eq!(options.key, DEFAULT_KEY);
        assert!(options.is_default_key());
        assert!(options.deps.is_empty());
        assert!(!options.suspense);
        assert!(!options.error_boundary);
    }

    #[test]
    fn builder_sets_fields() {
        let options = RunOptions::new()
            .key("k")
            .error_boundary(true)
            .on_error(|_| {});
        assert!(!options.is_default_key());
        assert!(options.error_boundary);
        assert!(format!("{:?}", options).contains("on_error: true"));
    }
}
