//! Views: tracked, notifying access to one structured location.
//!
//! A [`View`] proxies the map or array found at a base path inside a
//! [`Target`]. Reads record the child path with the engine's active tracker.
//! Writes and deletes go to the target in place and, when something actually
//! changed, notify listeners at the child path.
//!
//! Structured children are reached through [`View::child`], which wraps them
//! lazily with the child path. Nothing is deep-copied unless the caller asks
//! for an owned value.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::path::{parse_index, LENGTH};
use crate::value::{grown_len, MAX_ARRAY_PADDING};
use crate::registry::NotifyOptions;
use crate::{Engine, Error, Path, Result, Target, Value};

/// Per-view configuration. Two views over the same location are the same
/// view only if their configurations are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrapConfig {
    /// Propagation used for notifications emitted by this view's writes.
    pub notify: NotifyOptions,

    /// Whether reads through this view are recorded with the tracker.
    pub track_reads: bool,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            notify: NotifyOptions::default(),
            track_reads: true,
        }
    }
}

pub(crate) struct ViewInner {
    engine: Engine,
    target: Target,
    path: Path,
    config: WrapConfig,
}

/// Tracked, notifying handle to one map or array.
///
/// Cloning a `View` is cheap and yields the same view.
#[derive(Clone)]
pub struct View {
    inner: Rc<ViewInner>,
}

impl View {
    pub(crate) fn new(engine: Engine, target: Target, path: Path, config: WrapConfig) -> Self {
        Self {
            inner: Rc::new(ViewInner {
                engine,
                target,
                path,
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ViewInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ViewInner> {
        Rc::downgrade(&self.inner)
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    /// Base path of this view inside its target.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn config(&self) -> WrapConfig {
        self.inner.config
    }

    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn record(&self, path: &Path) {
        if self.inner.config.track_reads {
            self.inner.engine.record_access(path);
        }
    }

    /// Run `f` on the value at this view's location without tracking.
    fn peek<T>(&self, f: impl FnOnce(Option<&Value>) -> T) -> T {
        let root = self.inner.target.read();
        f(root.get(&self.inner.path))
    }

    pub fn is_array(&self) -> bool {
        self.peek(|value| matches!(value, Some(Value::Array(_))))
    }

    pub fn is_map(&self) -> bool {
        self.peek(|value| matches!(value, Some(Value::Map(_))))
    }

    /// False once the location no longer holds a map or an array.
    pub fn is_attached(&self) -> bool {
        self.peek(|value| value.is_some_and(Value::is_structured))
    }

    // ------------------------------------------------------------------
    // Read hooks

    /// Read one child and return an owned copy.
    ///
    /// On arrays the `length` key answers the element count. Invalid keys
    /// read as `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !Path::is_valid_key(key) {
            return None;
        }
        self.record(&self.inner.path.child(key));
        self.peek(|value| match value? {
            Value::Array(items) if key == LENGTH => Some(Value::from(items.len())),
            value => value.child(key).cloned(),
        })
    }

    /// Read a structured child as a view bound to the child path.
    ///
    /// Returns `None` when the child is missing or is a scalar.
    pub fn child(&self, key: &str) -> Option<View> {
        if !Path::is_valid_key(key) {
            return None;
        }
        let path = self.inner.path.child(key);
        self.record(&path);
        let structured = self.peek(|value| {
            value
                .and_then(|value| value.child(key))
                .is_some_and(Value::is_structured)
        });
        if !structured {
            return None;
        }
        self.inner
            .engine
            .wrap_at(&self.inner.target, path, self.inner.config)
            .ok()
    }

    /// Read a nested value, recording every path walked on the way.
    pub fn get_in(&self, relative: &Path) -> Option<Value> {
        let mut current = self.inner.path.clone();
        for component in relative.iter() {
            current = current.child(component);
            self.record(&current);
        }
        let root = self.inner.target.read();
        let (last, parent) = match (relative.last(), relative.parent()) {
            (Some(last), Some(parent)) => (last, parent),
            _ => return root.get(&self.inner.path).cloned(),
        };
        let container = self.inner.path.join(&parent);
        let value = match root.get(&container)? {
            Value::Array(items) if last == LENGTH => Some(Value::from(items.len())),
            value => value.child(last).cloned(),
        };
        value
    }

    /// Entry count. Records the `length` path on arrays.
    pub fn len(&self) -> usize {
        let (len, is_array) = self.peek(|value| match value {
            Some(Value::Array(items)) => (items.len(), true),
            Some(Value::Map(map)) => (map.len(), false),
            _ => (0, false),
        });
        if is_array {
            self.record(&self.inner.path.child(LENGTH));
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of a map or indices of an array. Not tracked.
    pub fn keys(&self) -> Vec<String> {
        self.peek(|value| value.map(Value::keys).unwrap_or_default())
    }

    /// Whether `key` is present. Not tracked.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(|value| value.and_then(|value| value.child(key)).is_some())
    }

    /// Owned copy of the whole location.
    ///
    /// Records every top-level key, plus `length` on arrays, so a selector
    /// returning a snapshot depends on the entire container.
    pub fn snapshot(&self) -> Value {
        let (value, keys) = self.peek(|value| match value {
            Some(value) => (value.clone(), value.keys()),
            None => (Value::Null, Vec::new()),
        });
        if value.is_array() {
            self.record(&self.inner.path.child(LENGTH));
        }
        for key in &keys {
            self.record(&self.inner.path.child(key));
        }
        value
    }

    // ------------------------------------------------------------------
    // Write hooks

    /// Write one child. Returns whether the stored value changed.
    ///
    /// Writing an equal value is a no-op and notifies nobody. On arrays the
    /// key must be an index or `length`; writing past the end pads with
    /// `Null`, and writing `length` truncates or pads. One write may add at
    /// most [`MAX_ARRAY_PADDING`] slots.
    ///
    /// # Errors
    ///
    /// [`Error::Path`] for keys that are not a single path component,
    /// [`Error::InvalidIndex`] for non-index keys on arrays and for writes
    /// that would pad past the limit, and
    /// [`Error::Detached`] when this view's location is gone.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        Path::validate_component(key, self.inner.path.len())?;
        let value = value.into();
        let child_path = self.inner.path.child(key);

        let resized = {
            let mut root = self.inner.target.write();
            match root.get_mut(&self.inner.path) {
                Some(Value::Map(map)) => {
                    if map.get(key) == Some(&value) {
                        return Ok(false);
                    }
                    map.insert(key.to_string(), value);
                    None
                }
                Some(Value::Array(items)) => {
                    let original = items.len();
                    if key == LENGTH {
                        let new_len = match value {
                            Value::Integer(n) => usize::try_from(n)
                                .ok()
                                .filter(|len| *len <= original.saturating_add(MAX_ARRAY_PADDING))
                                .ok_or_else(|| self.invalid_index(key))?,
                            _ => return Err(self.invalid_index(key)),
                        };
                        if new_len == original {
                            return Ok(false);
                        }
                        items.resize(new_len, Value::Null);
                    } else {
                        let index = parse_index(key).ok_or_else(|| self.invalid_index(key))?;
                        if items.get(index) == Some(&value) {
                            return Ok(false);
                        }
                        if index >= original {
                            let len =
                                grown_len(original, index).ok_or_else(|| self.invalid_index(key))?;
                            items.resize(len, Value::Null);
                        }
                        items[index] = value;
                    }
                    (items.len() != original).then_some((original, items.len()))
                }
                _ => return Err(self.detached()),
            }
        };

        let options = self.inner.config.notify;
        match resized {
            None => self.inner.engine.notify(&child_path, options),
            Some((original, new_len)) => {
                let mut batch = vec![child_path, self.inner.path.child(LENGTH)];
                batch.extend(
                    (original.min(new_len)..original.max(new_len))
                        .map(|index| self.inner.path.child_index(index)),
                );
                self.inner.engine.notify_many(&batch, options);
            }
        }
        Ok(true)
    }

    /// Remove one child and return it.
    ///
    /// Deleting an array element leaves a `Null` hole; the length does not
    /// change. Deleting a missing key returns `None` and notifies nobody.
    pub fn delete(&self, key: &str) -> Result<Option<Value>> {
        Path::validate_component(key, self.inner.path.len())?;
        let removed = {
            let mut root = self.inner.target.write();
            match root.get_mut(&self.inner.path) {
                Some(Value::Map(map)) => map.remove(key),
                Some(Value::Array(items)) => {
                    let index = parse_index(key).ok_or_else(|| self.invalid_index(key))?;
                    items
                        .get_mut(index)
                        .map(|slot| std::mem::replace(slot, Value::Null))
                }
                _ => return Err(self.detached()),
            }
        };

        if removed.is_some() {
            self.inner
                .engine
                .notify(&self.inner.path.child(key), self.inner.config.notify);
        }
        Ok(removed)
    }

    /// Replace this view's whole location with another structured value.
    ///
    /// Listeners at this path, its ancestors and every registered path below
    /// it are notified.
    pub fn replace(&self, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        if !value.is_structured() {
            return Err(Error::InvalidTarget {
                path: self.inner.path.clone(),
                found: value.kind(),
            });
        }
        {
            let mut root = self.inner.target.write();
            if root.get(&self.inner.path) == Some(&value) {
                return Ok(false);
            }
            root.set(&self.inner.path, value)?;
        }
        self.inner
            .engine
            .notify(&self.inner.path, self.inner.config.notify);
        Ok(true)
    }

    /// Apply each entry of a map through [`View::set`].
    ///
    /// Anything other than a map is rejected without touching the store and
    /// returns `Ok(false)`.
    pub fn merge(&self, value: Value) -> Result<bool> {
        let entries = match value {
            Value::Map(entries) => entries,
            other => {
                tracing::warn!(
                    path = %self.inner.path,
                    kind = other.kind(),
                    "merge rejected: expected a map"
                );
                return Ok(false);
            }
        };
        let mut changed = false;
        for (key, value) in entries {
            changed |= self.set(&key, value)?;
        }
        Ok(changed)
    }

    pub(crate) fn detached(&self) -> Error {
        Error::Detached {
            path: self.inner.path.clone(),
        }
    }

    fn invalid_index(&self, key: &str) -> Error {
        Error::InvalidIndex {
            path: self.inner.path.clone(),
            component: key.to_string(),
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("target", &self.inner.target.id())
            .field("path", &self.inner.path)
            .field("config", &self.inner.config)
            .finish()
    }
}
