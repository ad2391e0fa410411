//! The Value type - a tree-shaped data structure.
//!
//! Raw targets hold a `Value` tree. Views read and write it in place; the
//! engine never deep-copies it except when a caller asks for a snapshot.

use std::collections::BTreeMap;

use crate::path::{parse_index, Path};
use crate::{Error, Result};

/// A dynamically-typed tree value.
///
/// # Design Notes
///
/// - Uses `BTreeMap` for deterministic key order
/// - `Array` and `Map` are the structured variants; only they can be wrapped
/// - Uses `i64` for integers and `f64` for floats
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Key-value map with string keys.
    Map(BTreeMap<String, Value>),
}

/// Most `Null` slots a single write may add past the end of an array.
pub const MAX_ARRAY_PADDING: usize = 4096;

/// Length an array of `len` elements must grow to so `index` is in bounds,
/// or `None` when that needs more than [`MAX_ARRAY_PADDING`] new slots.
pub(crate) fn grown_len(len: usize, index: usize) -> Option<usize> {
    index
        .checked_add(1)
        .filter(|new_len| *new_len <= len.saturating_add(MAX_ARRAY_PADDING))
}

impl Value {
    /// Create a null value.
    pub fn null() -> Self {
        Value::Null
    }

    /// Create an empty map.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a map.
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Check if this value is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Maps and arrays are structured; everything else is a scalar.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Array(_))
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Keys of a map, or the indices of an array; empty for scalars.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Map(map) => map.keys().cloned().collect(),
            Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Direct child by key. Arrays take canonical decimal indices.
    pub fn child(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::Array(items) => items.get(parse_index(key)?),
            _ => None,
        }
    }

    /// Get a reference to a nested value by path.
    ///
    /// Returns `None` if the path doesn't exist or can't be navigated
    /// (e.g., trying to index into a string).
    pub fn get(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for component in path.iter() {
            current = current.child(component)?;
        }
        Some(current)
    }

    /// Get a mutable reference to a nested value by path.
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Value> {
        let mut current = self;
        for component in path.iter() {
            current = match current {
                Value::Map(map) => map.get_mut(component.as_str())?,
                Value::Array(arr) => arr.get_mut(parse_index(component)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set a value at a path, creating intermediate maps as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path traverses through a non-container value
    /// or uses a non-index component on an array.
    pub fn set(&mut self, path: &Path, value: Value) -> Result<()> {
        if path.is_empty() {
            *self = value;
            return Ok(());
        }

        let mut current = self;
        for (i, component) in path.iter().enumerate() {
            let is_last = i == path.len() - 1;
            let here = || path.slice(0, i);

            if is_last {
                match current {
                    Value::Map(map) => {
                        map.insert(component.clone(), value);
                    }
                    Value::Array(arr) => {
                        let index = parse_index(component).ok_or_else(|| Error::InvalidIndex {
                            path: here(),
                            component: component.clone(),
                        })?;
                        if index >= arr.len() {
                            let len = grown_len(arr.len(), index).ok_or_else(|| {
                                Error::InvalidIndex {
                                    path: here(),
                                    component: component.clone(),
                                }
                            })?;
                            arr.resize(len, Value::Null);
                        }
                        arr[index] = value;
                    }
                    other => {
                        return Err(Error::InvalidTarget {
                            path: here(),
                            found: other.kind(),
                        })
                    }
                }
                return Ok(());
            }

            current = match current {
                Value::Map(map) => map
                    .entry(component.clone())
                    .or_insert_with(|| Value::Map(BTreeMap::new())),
                Value::Array(arr) => {
                    let index = parse_index(component)
                        .filter(|index| *index < arr.len())
                        .ok_or_else(|| Error::InvalidIndex {
                            path: here(),
                            component: component.clone(),
                        })?;
                    &mut arr[index]
                }
                other => {
                    return Err(Error::InvalidTarget {
                        path: here(),
                        found: other.kind(),
                    })
                }
            };
        }

        Ok(())
    }

    /// Remove a value at a path, returning it if it existed.
    ///
    /// Removing an array element shifts the following elements down.
    pub fn remove(&mut self, path: &Path) -> Option<Value> {
        let parent = self.get_mut(&path.parent()?)?;
        let last = path.last()?;
        match parent {
            Value::Map(map) => map.remove(last),
            Value::Array(arr) => {
                let index = parse_index(last)?;
                (index < arr.len()).then(|| arr.remove(index))
            }
            _ => None,
        }
    }

    /// One-level comparison used to decide whether a selected value changed.
    ///
    /// Maps compare key sets and then each entry with `==`; every other
    /// variant falls back to `==`. This is a cheap heuristic, not a promise of
    /// deep equality semantics for callers.
    pub fn shallow_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            _ => self == other,
        }
    }
}

// Conversion from common types

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
