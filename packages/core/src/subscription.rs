//! Selector-based subscriptions with the external-store shape.
//!
//! A [`Subscription`] evaluates its selector under a tracker to learn which
//! paths it depends on, registers one listener on all of them, and on every
//! notification re-evaluates the selector and decides whether consumers must
//! re-read. Consumers use [`Subscription::subscribe`] and
//! [`Subscription::get_snapshot`].
//!
//! Tracking is redone whenever the first consumer subscribes. With no
//! consumers nothing listens, so reads evaluate the selector on demand.
//!
//! Change detection is a heuristic: arrays and whole-store selections always
//! count as changed, maps compare one level deep, everything else uses `==`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::init::Snapshot;
use crate::path::LENGTH;
use crate::registry::{ListenerId, ListenerSet, Registration};
use crate::{Path, Value, View};

type Selector = Rc<dyn Fn(&View) -> Value>;
type Invalidate = Rc<dyn Fn()>;

struct SubscriptionInner {
    view: View,
    selector: Selector,
    paths: RefCell<Vec<Path>>,
    identity: Cell<bool>,
    last: RefCell<Value>,
    callbacks: RefCell<Vec<(ListenerId, Invalidate)>>,
    next_id: Cell<u64>,
    registrations: RefCell<Vec<Registration>>,
}

impl SubscriptionInner {
    /// Evaluate the selector under a fresh tracker and record the paths it
    /// depends on.
    ///
    /// A selector that reads nothing through the view falls back to every
    /// top-level key of the store. A selector that reads exactly the whole
    /// container (every key, plus `length` on arrays) is an identity
    /// selector.
    fn track(&self) -> Value {
        let store = &self.view;
        let (value, tracker) = store.engine().track(|| (self.selector)(store));

        let mut whole: Vec<Path> = store
            .keys()
            .iter()
            .map(|key| store.path().child(key))
            .collect();
        if store.is_array() {
            whole.push(store.path().child(LENGTH));
        }
        whole.sort();

        let tracked = tracker.paths();
        let identity = !tracked.is_empty() && tracked == whole;
        let paths = if tracked.is_empty() { whole } else { tracked };

        tracing::trace!(
            store = %store.path(),
            paths = paths.len(),
            identity,
            "subscription tracked"
        );
        *self.paths.borrow_mut() = paths;
        self.identity.set(identity);
        value
    }

    fn evaluate(&self) -> Value {
        self.view.engine().untracked(|| (self.selector)(&self.view))
    }

    fn attach(self: &Rc<Self>) {
        let value = self.track();
        *self.last.borrow_mut() = value;

        let engine = self.view.engine();
        let weak = Rc::downgrade(self);
        let paths = engine.register_paths(self.paths.borrow().clone(), move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.refresh(false);
            }
        });
        let weak = Rc::downgrade(self);
        let status = engine.on_status_change(&self.view, move || {
            if let Some(inner) = weak.upgrade() {
                inner.refresh(true);
            }
        });
        *self.registrations.borrow_mut() = vec![paths, status];
    }

    fn detach(&self) {
        let registrations = std::mem::take(&mut *self.registrations.borrow_mut());
        drop(registrations);
    }

    /// Re-evaluate the selector and invalidate consumers if it changed, or
    /// unconditionally when `force` is set.
    fn refresh(&self, force: bool) {
        let next = self.evaluate();
        let changed = {
            let last = self.last.borrow();
            if self.identity.get() || next.is_array() {
                true
            } else if next.is_map() {
                !last.shallow_eq(&next)
            } else {
                *last != next
            }
        };
        if changed {
            *self.last.borrow_mut() = next;
        }
        if changed || force {
            let callbacks: Vec<Invalidate> = self
                .callbacks
                .borrow()
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect();
            for callback in callbacks {
                callback();
            }
        }
    }
}

impl ListenerSet for SubscriptionInner {
    fn remove_listener(&self, id: ListenerId) {
        let now_empty = {
            let mut callbacks = self.callbacks.borrow_mut();
            callbacks.retain(|(lid, _)| *lid != id);
            callbacks.is_empty()
        };
        if now_empty {
            self.detach();
        }
    }
}

/// A consumer-facing subscription to one selection of a store.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    /// Evaluate `selector` once under a tracker and derive the paths to
    /// listen on.
    pub fn new(store: &View, selector: impl Fn(&View) -> Value + 'static) -> Self {
        let inner = Rc::new(SubscriptionInner {
            view: store.clone(),
            selector: Rc::new(selector),
            paths: RefCell::new(Vec::new()),
            identity: Cell::new(false),
            last: RefCell::new(Value::Null),
            callbacks: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            registrations: RefCell::new(Vec::new()),
        });
        let value = inner.track();
        *inner.last.borrow_mut() = value;
        Self { inner }
    }

    /// Register an invalidation callback.
    ///
    /// The first callback re-tracks the selector and installs the path
    /// listeners; the last one to go removes them.
    pub fn subscribe(&self, on_invalidate: impl Fn() + 'static) -> Registration {
        let id = ListenerId(self.inner.next_id.get() + 1);
        self.inner.next_id.set(id.0);
        let first = {
            let mut callbacks = self.inner.callbacks.borrow_mut();
            callbacks.push((id, Rc::new(on_invalidate)));
            callbacks.len() == 1
        };
        if first {
            self.inner.attach();
        }
        let weak: Weak<SubscriptionInner> = Rc::downgrade(&self.inner);
        Registration::new(weak, id)
    }

    /// Current selection through the suspension contract.
    ///
    /// `Failed` when an initializer with an error boundary failed for this
    /// store, `Pending` while a suspense-enabled initializer runs, else the
    /// current selected value.
    pub fn get_snapshot(&self) -> Snapshot<Value> {
        let engine = self.inner.view.engine();
        if let Some(error) = engine.boundary_error(&self.inner.view) {
            return Snapshot::Failed(error);
        }
        if let Some(handle) = engine.pending_for(&self.inner.view) {
            return Snapshot::Pending(handle);
        }
        Snapshot::Ready(self.value())
    }

    /// Current selected value, without the suspension checks.
    ///
    /// While subscribed this is the value kept up to date by notifications;
    /// otherwise the selector runs again.
    pub fn value(&self) -> Value {
        if self.inner.callbacks.borrow().is_empty() {
            let next = self.inner.evaluate();
            *self.inner.last.borrow_mut() = next;
        }
        self.inner.last.borrow().clone()
    }

    /// Paths this subscription listens on.
    pub fn paths(&self) -> Vec<Path> {
        self.inner.paths.borrow().clone()
    }

    /// Whether the selector returned the whole store.
    pub fn is_identity(&self) -> bool {
        self.inner.identity.get()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    pub fn store(&self) -> &View {
        &self.inner.view
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("store", &self.inner.view)
            .field("paths", &*self.inner.paths.borrow())
            .field("identity", &self.is_identity())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
