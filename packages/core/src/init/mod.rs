//! Asynchronous initialization of store state.
//!
//! [`Engine::run`](crate::Engine::run) runs an [`Initializer`] against a store
//! view under a cache key. Per (store, key) the orchestrator guarantees:
//!
//! - at most one active `"default"` key initializer per store
//! - at most one in-flight computation, which concurrent callers join
//! - a settled result is cached and reused until refetched
//! - loading, error and boundary-error state readable while it runs
//!
//! Pending computations are shared futures. They are driven by the engine's
//! spawner (by default a `tokio::task::LocalSet` owned by the engine and run
//! through [`Engine::run_until`](crate::Engine::run_until)) and may also be
//! awaited directly through their [`PendingHandle`]. Starting one never needs
//! an ambient runtime.

mod options;
mod orchestrator;
mod pending;

pub use options::{ErrorHook, RunOptions, SuccessHook, DEFAULT_KEY};
pub use pending::{PendingHandle, Snapshot};

pub(crate) use orchestrator::Orchestrator;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;

use crate::{InitError, Result, Value, View};
use orchestrator::{CacheKey, Settlement};

pub type SyncInit = Rc<dyn Fn(&View) -> std::result::Result<Value, InitError>>;
pub type AsyncInit = Rc<dyn Fn(View) -> LocalBoxFuture<'static, std::result::Result<Value, InitError>>>;

/// How a store gets its initial state.
#[derive(Clone)]
pub enum Initializer {
    /// Partial state merged into the store immediately. Never pending.
    Value(Value),
    /// Called synchronously; the result is cached as data.
    Sync(SyncInit),
    /// Produces a computation that settles later.
    Async(AsyncInit),
}

impl Initializer {
    pub fn value(value: impl Into<Value>) -> Self {
        Initializer::Value(value.into())
    }

    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&View) -> std::result::Result<Value, InitError> + 'static,
    {
        Initializer::Sync(Rc::new(f))
    }

    /// Wrap an async function.
    ///
    /// The function receives an owned store view it may write through while
    /// it runs. Writes made before a failure are kept.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(View) -> Fut + 'static,
        Fut: Future<Output = std::result::Result<Value, InitError>> + 'static,
    {
        Initializer::Async(Rc::new(move |store| f(store).boxed_local()))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Initializer::Async(_))
    }
}

impl fmt::Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Initializer::Sync(_) => f.write_str("Sync(..)"),
            Initializer::Async(_) => f.write_str("Async(..)"),
        }
    }
}

struct InitializationInner {
    orchestrator: Rc<Orchestrator>,
    store: View,
    key: CacheKey,
    initializer: Initializer,
    options: RunOptions,
    deps: RefCell<Vec<Value>>,
    disposed: Cell<bool>,
}

impl InitializationInner {
    fn dispose(&self) {
        if !self.disposed.replace(true) {
            self.orchestrator.release_usage(&self.key);
        }
    }
}

impl Drop for InitializationInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// One consumer's registration of an initializer on a store.
///
/// Holds the store's usage record for its key until [`dispose`] is called
/// or the last clone is dropped. The cached result outlives it.
///
/// [`dispose`]: Initialization::dispose
#[derive(Clone)]
pub struct Initialization {
    inner: Rc<InitializationInner>,
}

fn ready(result: std::result::Result<Value, InitError>) -> PendingHandle {
    PendingHandle::new(future::ready(result).boxed_local(), 0)
}

impl Initialization {
    pub(crate) fn new(
        orchestrator: Rc<Orchestrator>,
        store: View,
        key: CacheKey,
        initializer: Initializer,
        options: RunOptions,
    ) -> Self {
        let deps = options.deps.clone();
        Self {
            inner: Rc::new(InitializationInner {
                orchestrator,
                store,
                key,
                initializer,
                options,
                deps: RefCell::new(deps),
                disposed: Cell::new(false),
            }),
        }
    }

    pub(crate) fn execute(&self, force: bool) -> Result<PendingHandle> {
        let inner = &self.inner;
        let orchestrator = &inner.orchestrator;
        let settlement = Settlement::from_options(&inner.options);
        if force {
            orchestrator.clear_result(&inner.key);
        }

        match &inner.initializer {
            Initializer::Value(value) => {
                inner.store.merge(value.clone())?;
                if value.is_map() {
                    orchestrator.complete(&inner.key, &Ok(value.clone()), &settlement);
                }
                Ok(ready(Ok(value.clone())))
            }
            Initializer::Sync(f) => {
                if let Some(data) = orchestrator.data(&inner.key) {
                    return Ok(ready(Ok(data)));
                }
                let result = inner.store.engine().untracked(|| f(&inner.store));
                orchestrator.complete(&inner.key, &result, &settlement);
                Ok(ready(result))
            }
            Initializer::Async(f) => {
                let f = f.clone();
                let store = inner.store.clone();
                let started = Orchestrator::start(
                    orchestrator,
                    &inner.key,
                    move || {
                        let engine = store.engine().clone();
                        engine.untracked(move || f(store))
                    },
                    inner.options.suspense,
                    settlement,
                    force,
                );
                Ok(started.into_handle())
            }
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key.key
    }

    pub fn store(&self) -> &View {
        &self.inner.store
    }

    /// Inline error of the last settled computation.
    pub fn error(&self) -> Option<InitError> {
        self.inner.orchestrator.error(&self.inner.key)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.orchestrator.is_loading(&self.inner.key)
    }

    /// Cached result for this key.
    pub fn data(&self) -> Option<Value> {
        self.inner.orchestrator.data(&self.inner.key)
    }

    /// The in-flight computation for this key, suspense or not.
    pub fn pending(&self) -> Option<PendingHandle> {
        self.inner
            .orchestrator
            .pending(&self.inner.key)
            .map(|(handle, _)| handle)
    }

    /// Read the key's state through the suspension contract.
    pub fn snapshot(&self) -> Snapshot<Option<Value>> {
        let orchestrator = &self.inner.orchestrator;
        if let Some(error) = orchestrator.key_boundary_error(&self.inner.key) {
            return Snapshot::Failed(error);
        }
        if let Some((handle, true)) = orchestrator.pending(&self.inner.key) {
            return Snapshot::Pending(handle);
        }
        Snapshot::Ready(self.data())
    }

    /// Resolve once the current computation settles.
    ///
    /// Resolves immediately with the cached data or inline error when
    /// nothing is pending, and with `Value::Null` when nothing ran yet.
    pub fn settled(&self) -> LocalBoxFuture<'static, std::result::Result<Value, InitError>> {
        if let Some(handle) = self.pending() {
            return handle.boxed_local();
        }
        let result = match (self.error(), self.data()) {
            (Some(error), _) => Err(error),
            (None, data) => Ok(data.unwrap_or_default()),
        };
        future::ready(result).boxed_local()
    }

    /// Discard the cached result and run the initializer again.
    ///
    /// Never joins an in-flight computation. A computation this replaces
    /// keeps running, but its result is discarded when it settles.
    pub fn refetch(&self) -> Result<PendingHandle> {
        tracing::debug!(key = %self.inner.key.key, "refetch");
        self.execute(true)
    }

    /// Compare `deps` with the previous dependency list and refetch on the
    /// first difference. Returns whether a re-run started.
    pub fn update_deps(&self, deps: Vec<Value>) -> Result<bool> {
        let changed = {
            let previous = self.inner.deps.borrow();
            previous.len() != deps.len() || previous.iter().zip(&deps).any(|(a, b)| a != b)
        };
        *self.inner.deps.borrow_mut() = deps;
        if !changed {
            return Ok(false);
        }
        self.refetch()?;
        Ok(true)
    }

    /// Release the usage record and clear loading and error state. The
    /// cached result is kept. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl fmt::Debug for Initialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Initialization")
            .field("store", &self.inner.key.store.to_string())
            .field("key", &self.inner.key.key)
            .field("initializer", &self.inner.initializer)
            .field("loading", &self.is_loading())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
