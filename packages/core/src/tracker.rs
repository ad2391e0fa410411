//! Access tracking for one synchronous evaluation at a time.
//!
//! While a [`Tracker`] is active, every tracked read through a view records
//! the path it touched. Reads outside a tracked evaluation are not observed.
//! Async code is never tracked: the tracker is always cleared before an
//! evaluation can yield.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::Path;

/// The set of paths read during one evaluation.
///
/// Cloning a `Tracker` shares the same set, so the handle returned by
/// [`Engine::start_tracking`](crate::Engine::start_tracking) sees every path
/// recorded until tracking stops.
#[derive(Clone, Debug, Default)]
pub struct Tracker {
    paths: Rc<RefCell<BTreeSet<Path>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, path: &Path) {
        let mut paths = self.paths.borrow_mut();
        if !paths.contains(path) {
            paths.insert(path.clone());
        }
    }

    /// Recorded paths in path order.
    pub fn paths(&self) -> Vec<Path> {
        self.paths.borrow().iter().cloned().collect()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.borrow().contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.borrow().is_empty()
    }
}

/// Slot holding the engine's current tracker.
#[derive(Default)]
pub(crate) struct AccessTracker {
    current: RefCell<Option<Tracker>>,
}

impl AccessTracker {
    pub(crate) fn start(&self) -> Tracker {
        let tracker = Tracker::new();
        *self.current.borrow_mut() = Some(tracker.clone());
        tracker
    }

    pub(crate) fn stop(&self) -> Option<Tracker> {
        self.current.borrow_mut().take()
    }

    pub(crate) fn is_tracking(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub(crate) fn record(&self, path: &Path) {
        if let Some(tracker) = self.current.borrow().as_ref() {
            tracing::trace!(%path, "tracked read");
            tracker.record(path);
        }
    }

    /// Run `f` with `tracker` installed, then put the previous one back.
    pub(crate) fn with<T>(&self, tracker: Option<Tracker>, f: impl FnOnce() -> T) -> T {
        let previous = self.current.replace(tracker);
        let _restore = Restore {
            slot: &self.current,
            previous: Some(previous),
        };
        f()
    }
}

struct Restore<'a> {
    slot: &'a RefCell<Option<Tracker>>,
    previous: Option<Option<Tracker>>,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.slot.borrow_mut() = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;

    #[test]
    fn record_is_noop_without_tracker() {
        let slot = AccessTracker::default();
        slot.record(&path!("a"));
        assert!(!slot.is_tracking());
        assert!(slot.stop().is_none());
    }

    #[test]
    fn start_returns_live_handle() {
        let slot = AccessTracker::default();
        let tracker = slot.start();
        slot.record(&path!("a"));
        slot.record(&path!("a"));
        slot.record(&path!("b.c"));
        let stopped = slot.stop().unwrap();

        assert_eq!(tracker.paths(), vec![path!("a"), path!("b.c")]);
        assert_eq!(stopped.len(), 2);
        assert!(!slot.is_tracking());
    }

    #[test]
    fn start_replaces_current_tracker() {
        let slot = AccessTracker::default();
        let first = slot.start();
        slot.record(&path!("a"));
        let second = slot.start();
        slot.record(&path!("b"));
        slot.stop();

        assert_eq!(first.paths(), vec![path!("a")]);
        assert_eq!(second.paths(), vec![path!("b")]);
    }

    #[test]
    fn with_restores_outer_tracker() {
        let slot = AccessTracker::default();
        let outer = slot.start();
        let inner = Tracker::new();
        slot.with(Some(inner.clone()), || slot.record(&path!("inner")));
        slot.record(&path!("outer"));

        assert_eq!(inner.paths(), vec![path!("inner")]);
        assert_eq!(outer.paths(), vec![path!("outer")]);
    }

    #[test]
    fn with_none_suspends_tracking() {
        let slot = AccessTracker::default();
        let outer = slot.start();
        slot.with(None, || slot.record(&path!("hidden")));
        assert!(outer.is_empty());
        assert!(slot.is_tracking());
    }
}
