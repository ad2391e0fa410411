//! Raw targets: the shared roots that views wrap.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Value;

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct TargetInner {
    id: TargetId,
    value: RefCell<Value>,
}

/// A plain value tree that callers own and the engine wraps.
///
/// Cloning a `Target` creates a new handle to the **same** tree. Writes made
/// directly through [`Target::write`] bypass every view and are therefore
/// never observed by listeners.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed)),
                value: RefCell::new(value.into()),
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Borrow the raw tree without tracking.
    pub fn read(&self) -> Ref<'_, Value> {
        self.inner.value.borrow()
    }

    /// Mutably borrow the raw tree without notification.
    pub fn write(&self) -> RefMut<'_, Value> {
        self.inner.value.borrow_mut()
    }

    /// Deep copy of the current tree.
    pub fn to_value(&self) -> Value {
        self.read().clone()
    }

    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_tree() {
        let a = Target::new(Value::map());
        let b = a.clone();
        *b.write() = Value::from(vec![1, 2]);
        assert_eq!(a.to_value(), Value::from(vec![1, 2]));
        assert!(a.ptr_eq(&b));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn ids_are_unique() {
        let a = Target::new(Value::map());
        let b = Target::new(Value::map());
        assert_ne!(a.id(), b.id());
        assert!(!a.ptr_eq(&b));
    }
}
