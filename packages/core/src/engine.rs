//! The engine: one instance owns every shared table.
//!
//! An [`Engine`] holds the view cache, the access tracker, the listener
//! registry and the initialization orchestrator. It is cheap to clone (every
//! clone is a handle to the same state) and deliberately `!Send`: all reads,
//! writes, tracking and notification run on one thread.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;

use crate::init::{Initialization, Initializer, Orchestrator, PendingHandle, RunOptions};
use crate::registry::{Listeners, NotifyOptions, Registration};
use crate::subscription::Subscription;
use crate::target::{Target, TargetId};
use crate::tracker::{AccessTracker, Tracker};
use crate::view::{View, ViewInner, WrapConfig};
use crate::{Error, InitError, Path, Result, Value};

/// Configuration for an [`Engine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Configuration used by [`Engine::wrap`].
    pub wrap: WrapConfig,

    /// Registered path count above which a warning is logged once.
    pub listener_warn_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wrap: WrapConfig::default(),
            listener_warn_threshold: 10_000,
        }
    }
}

struct CachedView {
    config: WrapConfig,
    view: Weak<ViewInner>,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    tracker: AccessTracker,
    listeners: Rc<Listeners>,
    views: RefCell<HashMap<(TargetId, Path), CachedView>>,
    orchestrator: Rc<Orchestrator>,
}

/// Handle to one reactive state engine.
#[derive(Clone)]
pub struct Engine {
    inner: Rc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let listeners = Listeners::new(config.listener_warn_threshold);
        Self {
            inner: Rc::new(EngineInner {
                config,
                tracker: AccessTracker::default(),
                listeners,
                views: RefCell::new(HashMap::new()),
                orchestrator: Orchestrator::new(),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Views

    /// Wrap the root of `target` with the engine's default configuration.
    pub fn wrap(&self, target: &Target) -> Result<View> {
        self.wrap_at(target, Path::root(), self.inner.config.wrap)
    }

    /// Wrap the structured value found at `path` inside `target`.
    ///
    /// Repeated calls for the same location and an equal configuration return
    /// the same view while any handle to it is alive. A different
    /// configuration produces a new view and replaces the cached one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] when the location does not hold a map
    /// or an array.
    pub fn wrap_at(&self, target: &Target, path: Path, config: WrapConfig) -> Result<View> {
        {
            let root = target.read();
            match root.get(&path) {
                Some(value) if value.is_structured() => {}
                Some(value) => {
                    return Err(Error::InvalidTarget {
                        path,
                        found: value.kind(),
                    })
                }
                None => {
                    return Err(Error::InvalidTarget {
                        path,
                        found: "nothing",
                    })
                }
            }
        }

        let key = (target.id(), path);
        let mut views = self.inner.views.borrow_mut();
        if let Some(cached) = views.get(&key) {
            if cached.config == config {
                if let Some(inner) = cached.view.upgrade() {
                    return Ok(View::from_inner(inner));
                }
            }
        }

        views.retain(|_, cached| cached.view.strong_count() > 0);

        let (target_id, path) = key;
        let view = View::new(self.clone(), target.clone(), path.clone(), config);
        tracing::debug!(target_id = %target_id, %path, "created view");
        views.insert(
            (target_id, path),
            CachedView {
                config,
                view: view.downgrade(),
            },
        );
        Ok(view)
    }

    /// Number of live views in the cache.
    pub fn cached_view_count(&self) -> usize {
        self.inner
            .views
            .borrow()
            .values()
            .filter(|cached| cached.view.strong_count() > 0)
            .count()
    }

    // ------------------------------------------------------------------
    // Tracking

    /// Install a fresh tracker, replacing any active one.
    pub fn start_tracking(&self) -> Tracker {
        self.inner.tracker.start()
    }

    /// Clear the active tracker and return it.
    pub fn stop_tracking(&self) -> Option<Tracker> {
        self.inner.tracker.stop()
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.tracker.is_tracking()
    }

    /// Record a read of `path`. No-op unless a tracker is active.
    pub fn record_access(&self, path: &Path) {
        self.inner.tracker.record(path);
    }

    /// Run `f` under a fresh tracker and return its result with the paths
    /// it read. The previously active tracker, if any, is restored.
    pub fn track<T>(&self, f: impl FnOnce() -> T) -> (T, Tracker) {
        let tracker = Tracker::new();
        let result = self.inner.tracker.with(Some(tracker.clone()), f);
        (result, tracker)
    }

    /// Run `f` with tracking suspended.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        self.inner.tracker.with(None, f)
    }

    // ------------------------------------------------------------------
    // Notification

    pub fn register_path(&self, path: Path, callback: impl Fn(&Path) + 'static) -> Registration {
        self.inner.listeners.register_path(path, Rc::new(callback))
    }

    /// Register one callback on several paths; it runs at most once per
    /// notification.
    pub fn register_paths(
        &self,
        paths: Vec<Path>,
        callback: impl Fn(&Path) + 'static,
    ) -> Registration {
        self.inner.listeners.register_paths(paths, Rc::new(callback))
    }

    pub fn register_global(&self, callback: impl Fn(&Path) + 'static) -> Registration {
        self.inner.listeners.register_global(Rc::new(callback))
    }

    /// Notify listeners of a mutation at `path`.
    pub fn notify(&self, path: &Path, options: NotifyOptions) {
        self.notify_many(std::slice::from_ref(path), options);
    }

    /// Notify listeners of a batch of mutations as one coherent change.
    pub fn notify_many(&self, paths: &[Path], options: NotifyOptions) {
        if paths.is_empty() {
            return;
        }
        self.inner.listeners.notify(paths, options);
    }

    /// Number of distinct paths with at least one listener.
    pub fn registered_path_count(&self) -> usize {
        self.inner.listeners.path_count()
    }

    /// Number of path and global listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.listener_count()
    }

    // ------------------------------------------------------------------
    // Subscriptions and initialization

    /// Subscribe to the part of `store` that `selector` reads.
    pub fn subscribe(&self, store: &View, selector: impl Fn(&View) -> Value + 'static) -> Subscription {
        Subscription::new(store, selector)
    }

    /// Run an initializer against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateInitializer`] when a default-key
    /// initializer is already active on `store`, and propagates write errors
    /// from merging a plain value initializer.
    pub fn run(
        &self,
        store: &View,
        initializer: Initializer,
        options: RunOptions,
    ) -> Result<Initialization> {
        Orchestrator::run(&self.inner.orchestrator, store, initializer, options)
    }

    /// Handle of a pending suspense-enabled computation for `store`.
    pub fn pending_for(&self, store: &View) -> Option<PendingHandle> {
        self.inner.orchestrator.pending_for(store)
    }

    /// Error recorded for `store` by an initializer run with an error
    /// boundary.
    pub fn boundary_error(&self, store: &View) -> Option<InitError> {
        self.inner.orchestrator.boundary_error(store)
    }

    /// Register a callback run whenever an initializer for `store` starts or
    /// settles.
    pub fn on_status_change(&self, store: &View, callback: impl Fn() + 'static) -> Registration {
        Orchestrator::register_status(&self.inner.orchestrator, store, Rc::new(callback))
    }

    /// Replace the spawner used to drive pending computations.
    ///
    /// By default drivers are queued on a `tokio::task::LocalSet` owned by
    /// the engine, which runs inside [`Engine::run_until`]. Awaiting a
    /// [`PendingHandle`] drives its computation regardless.
    pub fn set_spawner(&self, spawner: impl Fn(LocalBoxFuture<'static, ()>) + 'static) {
        self.inner.orchestrator.set_spawner(Rc::new(spawner));
    }

    /// Spawn a future with the configured spawner.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.inner.orchestrator.spawn(Box::pin(future));
    }

    /// Run `future` to completion while driving the engine's queued
    /// computations. Must be called from within a tokio runtime.
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        let orchestrator = self.inner.orchestrator.clone();
        orchestrator.tasks().run_until(future).await
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("views", &self.cached_view_count())
            .field("registered_paths", &self.registered_path_count())
            .finish()
    }
}
