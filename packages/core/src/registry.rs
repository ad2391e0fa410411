//! Path-keyed notification registry.
//!
//! Listeners register on an exact [`Path`] or globally. A mutation at path
//! `P` reaches, in this order:
//!
//! 1. listeners at exactly `P`
//! 2. listeners at the array container when `P` is `array.index[.rest]`
//! 3. listeners at every strict ancestor of `P`, nearest first
//! 4. listeners at every registered strict descendant of `P`
//! 5. global listeners
//!
//! Path-exact delivery alone would under-notify: a listener on `user` must
//! still run when `user.name` changes, and a listener on `user.name` must run
//! when `user` is replaced wholesale.
//!
//! Steps 3 and 4 walk the registered path set linearly, so a notification
//! costs time proportional to the number of registered paths.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::Path;

/// Callback invoked with the mutated path.
pub type Callback = Rc<dyn Fn(&Path)>;

/// Identity of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Which related paths a notification propagates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyOptions {
    pub notify_parents: bool,
    pub notify_children: bool,
    pub notify_array_changes: bool,
}

impl Default for NotifyOptions {
    fn default() -> Self {
        Self {
            notify_parents: true,
            notify_children: true,
            notify_array_changes: true,
        }
    }
}

impl NotifyOptions {
    /// Deliver to exact-path and global listeners only.
    pub fn exact() -> Self {
        Self {
            notify_parents: false,
            notify_children: false,
            notify_array_changes: false,
        }
    }
}

/// Something a [`Registration`] can remove itself from.
pub(crate) trait ListenerSet {
    fn remove_listener(&self, id: ListenerId);
}

/// Handle for a registered listener.
///
/// Dropping the handle unregisters the listener; [`unregister`] does the same
/// eagerly. Both are idempotent.
///
/// [`unregister`]: Registration::unregister
#[must_use = "dropping a Registration unregisters its listener"]
pub struct Registration {
    set: Weak<dyn ListenerSet>,
    id: ListenerId,
    active: Cell<bool>,
}

impl Registration {
    pub(crate) fn new(set: Weak<dyn ListenerSet>, id: ListenerId) -> Self {
        Self {
            set,
            id,
            active: Cell::new(true),
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn unregister(&self) {
        if self.active.replace(false) {
            if let Some(set) = self.set.upgrade() {
                set.remove_listener(self.id);
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    paths: BTreeMap<Path, Vec<(ListenerId, Callback)>>,
    globals: Vec<(ListenerId, Callback)>,
    owners: HashMap<ListenerId, Option<Vec<Path>>>,
    next_id: u64,
    warned: bool,
}

impl Registry {
    fn allocate(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        match self.owners.remove(&id) {
            Some(Some(paths)) => {
                for path in paths {
                    if let Some(listeners) = self.paths.get_mut(&path) {
                        listeners.retain(|(lid, _)| *lid != id);
                        if listeners.is_empty() {
                            self.paths.remove(&path);
                        }
                    }
                }
                true
            }
            Some(None) => {
                self.globals.retain(|(lid, _)| *lid != id);
                true
            }
            None => false,
        }
    }

    /// Resolve the ordered, de-duplicated call list for a batch of paths.
    fn collect(&self, batch: &[Path], options: NotifyOptions) -> Vec<(ListenerId, Path, Callback)> {
        let mut seen: HashSet<ListenerId> = HashSet::new();
        let mut calls = Vec::new();

        for path in batch {
            let mut push_at = |at: &Path| {
                if let Some(listeners) = self.paths.get(at) {
                    for (id, callback) in listeners {
                        if seen.insert(*id) {
                            calls.push((*id, path.clone(), callback.clone()));
                        }
                    }
                }
            };

            push_at(path);

            if options.notify_array_changes {
                if let Some((array_path, _)) = path.array_split() {
                    push_at(&array_path);
                }
            }

            if options.notify_parents {
                for ancestor in path.ancestors() {
                    push_at(&ancestor);
                }
            }

            if options.notify_children {
                for (registered, listeners) in &self.paths {
                    if registered.is_strict_descendant_of(path) {
                        for (id, callback) in listeners {
                            if seen.insert(*id) {
                                calls.push((*id, path.clone(), callback.clone()));
                            }
                        }
                    }
                }
            }
        }

        if let Some(origin) = batch.first() {
            for (id, callback) in &self.globals {
                if seen.insert(*id) {
                    calls.push((*id, origin.clone(), callback.clone()));
                }
            }
        }

        calls
    }
}

/// Shared listener registry owned by an [`Engine`](crate::Engine).
pub(crate) struct Listeners {
    registry: RefCell<Registry>,
    warn_threshold: usize,
}

impl Listeners {
    pub(crate) fn new(warn_threshold: usize) -> Rc<Self> {
        Rc::new(Self {
            registry: RefCell::new(Registry::default()),
            warn_threshold,
        })
    }

    pub(crate) fn register_path(self: &Rc<Self>, path: Path, callback: Callback) -> Registration {
        self.register_paths(vec![path], callback)
    }

    /// Register one listener on several paths. A notification reaching more
    /// than one of them runs the callback once.
    pub(crate) fn register_paths(
        self: &Rc<Self>,
        paths: Vec<Path>,
        callback: Callback,
    ) -> Registration {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.allocate();
            for path in &paths {
                registry
                    .paths
                    .entry(path.clone())
                    .or_default()
                    .push((id, callback.clone()));
            }
            registry.owners.insert(id, Some(paths));

            let count = registry.paths.len();
            if count > self.warn_threshold && !registry.warned {
                registry.warned = true;
                tracing::warn!(
                    registered_paths = count,
                    threshold = self.warn_threshold,
                    "registered path count exceeds threshold; notifications scan every path"
                );
            }
            id
        };
        Registration::new(self.weak_set(), id)
    }

    pub(crate) fn register_global(self: &Rc<Self>, callback: Callback) -> Registration {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.allocate();
            registry.owners.insert(id, None);
            registry.globals.push((id, callback));
            id
        };
        Registration::new(self.weak_set(), id)
    }

    fn weak_set(self: &Rc<Self>) -> Weak<dyn ListenerSet> {
        let weak: Weak<Listeners> = Rc::downgrade(self);
        weak
    }

    /// Deliver one coherent notification for every path in `batch`.
    ///
    /// The call list is resolved before any callback runs, so callbacks may
    /// register or unregister listeners freely. Listeners registered during
    /// dispatch wait for the next notification; listeners unregistered during
    /// dispatch are skipped. A listener reached through several paths of the
    /// batch runs once.
    pub(crate) fn notify(&self, batch: &[Path], options: NotifyOptions) {
        let calls = self.registry.borrow().collect(batch, options);
        tracing::trace!(
            paths = batch.len(),
            listeners = calls.len(),
            "dispatching notification"
        );
        for (id, origin, callback) in calls {
            if self.registry.borrow().owners.contains_key(&id) {
                callback(&origin);
            }
        }
    }

    pub(crate) fn path_count(&self) -> usize {
        self.registry.borrow().paths.len()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.registry.borrow().owners.len()
    }
}

impl ListenerSet for Listeners {
    fn remove_listener(&self, id: ListenerId) {
        self.registry.borrow_mut().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Callback) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| {
            let sink = sink.clone();
            Rc::new(move |_: &Path| sink.borrow_mut().push(name.to_string())) as Callback
        };
        (log, make)
    }

    #[test]
    fn exact_listener_fires_and_unrelated_does_not() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let _count = listeners.register_path(path!("count"), make("count"));
        let _name = listeners.register_path(path!("name"), make("name"));

        listeners.notify(&[path!("count")], NotifyOptions::default());

        assert_eq!(*log.borrow(), vec!["count"]);
    }

    #[test]
    fn propagation_order() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let _g = listeners.register_global(make("global"));
        let _child = listeners.register_path(path!("a.b.c.d"), make("a.b.c.d"));
        let _a = listeners.register_path(path!("a"), make("a"));
        let _ab = listeners.register_path(path!("a.b"), make("a.b"));
        let _abc = listeners.register_path(path!("a.b.c"), make("a.b.c"));
        let _ad = listeners.register_path(path!("a.d"), make("a.d"));

        listeners.notify(&[path!("a.b.c")], NotifyOptions::default());

        assert_eq!(
            *log.borrow(),
            vec!["a.b.c", "a.b", "a", "a.b.c.d", "global"]
        );
    }

    #[test]
    fn array_element_reaches_container() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let _items = listeners.register_path(path!("todos"), make("todos"));

        listeners.notify(
            &[path!("todos.2.done")],
            NotifyOptions {
                notify_parents: false,
                ..NotifyOptions::default()
            },
        );

        assert_eq!(*log.borrow(), vec!["todos"]);
    }

    #[test]
    fn exact_options_skip_relatives() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let _parent = listeners.register_path(path!("user"), make("user"));
        let _child = listeners.register_path(path!("user.name.first"), make("first"));
        let _g = listeners.register_global(make("global"));

        listeners.notify(&[path!("user.name")], NotifyOptions::exact());

        assert_eq!(*log.borrow(), vec!["global"]);
    }

    #[test]
    fn same_path_listeners_fire_in_registration_order() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let _one = listeners.register_path(path!("x"), make("one"));
        let _two = listeners.register_path(path!("x"), make("two"));
        let _three = listeners.register_path(path!("x"), make("three"));

        listeners.notify(&[path!("x")], NotifyOptions::default());

        assert_eq!(*log.borrow(), vec!["one", "two", "three"]);
    }

    #[test]
    fn batch_runs_each_listener_once() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let _items = listeners.register_path(path!("items"), make("items"));
        let _len = listeners.register_path(path!("items.length"), make("length"));
        let _g = listeners.register_global(make("global"));

        listeners.notify(
            &[path!("items"), path!("items.length"), path!("items.0")],
            NotifyOptions::default(),
        );

        assert_eq!(*log.borrow(), vec!["items", "length", "global"]);
    }

    #[test]
    fn unregister_is_idempotent() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let registration = listeners.register_path(path!("x"), make("x"));
        assert_eq!(listeners.path_count(), 1);

        registration.unregister();
        registration.unregister();
        drop(registration);

        listeners.notify(&[path!("x")], NotifyOptions::default());
        assert!(log.borrow().is_empty());
        assert_eq!(listeners.path_count(), 0);
        assert_eq!(listeners.listener_count(), 0);
    }

    #[test]
    fn callbacks_may_unregister_during_dispatch() {
        let listeners = Listeners::new(usize::MAX);
        let slot: Rc<RefCell<Option<Registration>>> = Rc::new(RefCell::new(None));
        let fired = Rc::new(Cell::new(0));

        let inner_slot = slot.clone();
        let inner_fired = fired.clone();
        let registration = listeners.register_path(
            path!("x"),
            Rc::new(move |_: &Path| {
                inner_fired.set(inner_fired.get() + 1);
                inner_slot.borrow_mut().take();
            }),
        );
        *slot.borrow_mut() = Some(registration);

        listeners.notify(&[path!("x")], NotifyOptions::default());
        listeners.notify(&[path!("x")], NotifyOptions::default());

        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn listener_removed_by_earlier_callback_is_skipped() {
        let listeners = Listeners::new(usize::MAX);
        let fired = Rc::new(Cell::new(0));
        let sink = fired.clone();
        let ancestor = listeners.register_path(
            path!("x"),
            Rc::new(move |_: &Path| sink.set(sink.get() + 1)),
        );

        // Exact listeners run before ancestors.
        let slot = Rc::new(RefCell::new(Some(ancestor)));
        let inner_slot = slot.clone();
        let _exact = listeners.register_path(
            path!("x.y"),
            Rc::new(move |_: &Path| {
                inner_slot.borrow_mut().take();
            }),
        );

        listeners.notify(&[path!("x.y")], NotifyOptions::default());
        assert!(slot.borrow().is_none());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn multi_path_listener_runs_once() {
        let listeners = Listeners::new(usize::MAX);
        let (log, make) = recorder();
        let registration =
            listeners.register_paths(vec![path!("items"), path!("items.0")], make("items"));

        listeners.notify(&[path!("items")], NotifyOptions::default());
        assert_eq!(*log.borrow(), vec!["items"]);
        assert_eq!(listeners.path_count(), 2);

        drop(registration);
        assert_eq!(listeners.path_count(), 0);
    }

    #[test]
    fn callback_receives_mutated_path() {
        let listeners = Listeners::new(usize::MAX);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _r = listeners.register_path(
            path!("user"),
            Rc::new(move |p: &Path| sink.borrow_mut().push(p.clone())),
        );

        listeners.notify(&[path!("user.name")], NotifyOptions::default());

        assert_eq!(*seen.borrow(), vec![path!("user.name")]);
    }
}
