//! Length-mutating array operations on views.
//!
//! Each operation runs on the raw vector in one step and then emits a single
//! batched notification covering the array path, its `length` path and every
//! index in `[0, max(original_len, new_len))`. Reorders and shifts therefore
//! reach every element listener, including ones whose value did not change.

use std::cmp::Ordering;
use std::ops::Range;

use crate::path::LENGTH;
use crate::{Error, Result, Value, View};

impl View {
    fn mutate_array<R>(&self, op: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let (result, original, new_len) = {
            let mut root = self.target().write();
            match root.get_mut(self.path()) {
                Some(Value::Array(items)) => {
                    let original = items.len();
                    let result = op(items);
                    (result, original, items.len())
                }
                Some(_) => {
                    return Err(Error::NotAnArray {
                        path: self.path().clone(),
                    })
                }
                None => return Err(self.detached()),
            }
        };

        let path = self.path();
        let mut batch = Vec::with_capacity(original.max(new_len) + 2);
        batch.push(path.clone());
        batch.push(path.child(LENGTH));
        batch.extend((0..original.max(new_len)).map(|index| path.child_index(index)));

        tracing::trace!(%path, original, new_len, "array mutation");
        self.engine().notify_many(&batch, self.config().notify);
        Ok(result)
    }

    /// Append one element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        self.mutate_array(|items| {
            items.push(value);
            items.len()
        })
    }

    /// Append several elements as one mutation. Returns the new length.
    pub fn extend<I>(&self, values: I) -> Result<usize>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.mutate_array(|items| {
            items.extend(values);
            items.len()
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.mutate_array(Vec::pop)
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.mutate_array(|items| (!items.is_empty()).then(|| items.remove(0)))
    }

    /// Insert one element at the front. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        self.mutate_array(|items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start`, insert `items` there, and
    /// return the removed elements.
    ///
    /// `start` and `delete_count` are clamped to the array bounds.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let inserted: Vec<Value> = items.into_iter().collect();
        self.mutate_array(|values| {
            let start = start.min(values.len());
            let end = start.saturating_add(delete_count).min(values.len());
            values.splice(start..end, inserted).collect()
        })
    }

    /// Sort with the natural value order: numbers numerically, strings
    /// lexicographically, mixed kinds grouped by kind.
    pub fn sort(&self) -> Result<()> {
        self.mutate_array(|items| items.sort_by(compare_values))
    }

    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        self.mutate_array(|items| items.sort_by(compare))
    }

    pub fn reverse(&self) -> Result<()> {
        self.mutate_array(|items| items.reverse())
    }

    /// Overwrite every element with `value`.
    pub fn fill(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.mutate_array(|items| items.fill(value))
    }

    /// Overwrite the elements in `range`, clamped to the array bounds.
    pub fn fill_range(&self, value: impl Into<Value>, range: Range<usize>) -> Result<()> {
        let value = value.into();
        self.mutate_array(|items| {
            let end = range.end.min(items.len());
            let start = range.start.min(end);
            items[start..end].fill(value);
        })
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Integer(_) | Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Bytes(_) => 4,
        Value::Array(_) => 5,
        Value::Map(_) => 6,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Total order used by [`View::sort`].
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => kind_rank(a).cmp(&kind_rank(b)),
        },
    }
}
