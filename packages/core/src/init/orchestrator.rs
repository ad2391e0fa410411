//! Per-store, per-key initialization state.
//!
//! The orchestrator owns the usage records, the pending table, the result
//! cache and the loading/error flags for every (store, key) pair. A store is
//! identified by the target and base path of the view an initializer runs
//! against.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use super::options::{ErrorHook, SuccessHook};
use super::pending::PendingHandle;
use super::{Initialization, Initializer, RunOptions};
use crate::registry::{ListenerId, ListenerSet, Registration};
use crate::target::TargetId;
use crate::{Error, InitError, Path, Result, Value, View};

pub(crate) type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;
type StatusCallback = Rc<dyn Fn()>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StoreId {
    target: TargetId,
    path: Path,
}

impl StoreId {
    pub(crate) fn of(view: &View) -> Self {
        Self {
            target: view.target().id(),
            path: view.path().clone(),
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.target)
        } else {
            write!(f, "{}:{}", self.target, self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) store: StoreId,
    pub(crate) key: String,
}

struct InFlight {
    handle: PendingHandle,
    suspense: bool,
}

#[derive(Default)]
struct KeyState {
    loading: bool,
    error: Option<InitError>,
    boundary_error: Option<InitError>,
    data: Option<Value>,
    pending: Option<InFlight>,
    generation: u64,
}

/// Hooks of the run that started a computation.
#[derive(Clone, Default)]
pub(crate) struct Settlement {
    pub(crate) error_boundary: bool,
    pub(crate) on_success: Option<SuccessHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl Settlement {
    pub(crate) fn from_options(options: &RunOptions) -> Self {
        Self {
            error_boundary: options.error_boundary,
            on_success: options.on_success.clone(),
            on_error: options.on_error.clone(),
        }
    }

    fn fire(&self, result: &std::result::Result<Value, InitError>) {
        match result {
            Ok(value) => {
                if let Some(hook) = &self.on_success {
                    hook(value);
                }
            }
            Err(error) => {
                if let Some(hook) = &self.on_error {
                    hook(error);
                }
            }
        }
    }
}

/// Outcome of asking for a computation on one key.
pub(crate) enum Started {
    Cached(Value),
    Attached(PendingHandle),
    Spawned(PendingHandle),
}

impl Started {
    pub(crate) fn into_handle(self) -> PendingHandle {
        match self {
            Started::Cached(value) => PendingHandle::new(async move { Ok(value) }.boxed_local(), 0),
            Started::Attached(handle) | Started::Spawned(handle) => handle,
        }
    }
}

#[derive(Default)]
struct State {
    usage: HashMap<CacheKey, usize>,
    keys: HashMap<CacheKey, KeyState>,
}

#[derive(Default)]
struct StatusListeners {
    by_store: HashMap<StoreId, Vec<(ListenerId, StatusCallback)>>,
    next_id: u64,
}

pub(crate) struct Orchestrator {
    state: RefCell<State>,
    status: RefCell<StatusListeners>,
    spawner: RefCell<Option<Spawner>>,
    tasks: tokio::task::LocalSet,
}

impl Orchestrator {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(State::default()),
            status: RefCell::new(StatusListeners::default()),
            spawner: RefCell::new(None),
            tasks: tokio::task::LocalSet::new(),
        })
    }

    pub(crate) fn set_spawner(&self, spawner: Spawner) {
        *self.spawner.borrow_mut() = Some(spawner);
    }

    /// Hand `future` to the custom spawner, or queue it on the engine's own
    /// task set. Queueing never needs an ambient runtime.
    pub(crate) fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        let spawner = self.spawner.borrow().clone();
        match spawner {
            Some(spawner) => spawner(future),
            None => {
                self.tasks.spawn_local(future);
            }
        }
    }

    /// The task set holding queued drivers.
    pub(crate) fn tasks(&self) -> &tokio::task::LocalSet {
        &self.tasks
    }

    pub(crate) fn run(
        this: &Rc<Self>,
        store: &View,
        initializer: Initializer,
        options: RunOptions,
    ) -> Result<Initialization> {
        let store_id = StoreId::of(store);
        let key = CacheKey {
            store: store_id.clone(),
            key: options.key.clone(),
        };

        {
            let mut state = this.state.borrow_mut();
            let active = state.usage.get(&key).copied().unwrap_or(0);
            if active > 0 && options.is_default_key() {
                return Err(Error::DuplicateInitializer {
                    store: store_id.to_string(),
                    key: options.key.clone(),
                });
            }
            *state.usage.entry(key.clone()).or_insert(0) += 1;
        }

        let init = Initialization::new(this.clone(), store.clone(), key, initializer, options);
        if let Err(e) = init.execute(false) {
            init.dispose();
            return Err(e);
        }
        Ok(init)
    }

    /// Drop one usage record for `key`. Loading and error state is cleared
    /// only when the last user of the key lets go.
    pub(crate) fn release_usage(&self, key: &CacheKey) {
        let mut state = self.state.borrow_mut();
        let remaining = match state.usage.get_mut(key) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        };
        if remaining > 0 {
            return;
        }
        state.usage.remove(key);
        if let Some(entry) = state.keys.get_mut(key) {
            entry.loading = false;
            entry.error = None;
            entry.boundary_error = None;
        }
    }

    /// Store the outcome of a synchronous initializer.
    pub(crate) fn complete(
        &self,
        key: &CacheKey,
        result: &std::result::Result<Value, InitError>,
        settlement: &Settlement,
    ) {
        {
            let mut state = self.state.borrow_mut();
            let entry = state.keys.entry(key.clone()).or_default();
            Self::record(entry, result, settlement.error_boundary);
        }
        settlement.fire(result);
        self.notify_status(&key.store);
    }

    /// Cached data for `key`.
    pub(crate) fn data(&self, key: &CacheKey) -> Option<Value> {
        self.state
            .borrow()
            .keys
            .get(key)
            .and_then(|entry| entry.data.clone())
    }

    pub(crate) fn clear_result(&self, key: &CacheKey) {
        if let Some(entry) = self.state.borrow_mut().keys.get_mut(key) {
            entry.data = None;
            entry.error = None;
            entry.boundary_error = None;
        }
    }

    /// Start, join, or reuse the computation for `key`.
    ///
    /// Without `force`, cached data wins, then an in-flight computation is
    /// joined. With `force` a new computation replaces any in-flight one; the
    /// replaced computation still runs to completion but its result is
    /// discarded.
    pub(crate) fn start(
        this: &Rc<Self>,
        key: &CacheKey,
        make: impl FnOnce() -> LocalBoxFuture<'static, std::result::Result<Value, InitError>>,
        suspense: bool,
        settlement: Settlement,
        force: bool,
    ) -> Started {
        let generation = {
            let mut state = this.state.borrow_mut();
            let entry = state.keys.entry(key.clone()).or_default();
            if !force {
                if let Some(data) = &entry.data {
                    return Started::Cached(data.clone());
                }
                if let Some(in_flight) = &mut entry.pending {
                    in_flight.suspense |= suspense;
                    tracing::debug!(
                        store = %key.store,
                        key = %key.key,
                        "joining in-flight initializer"
                    );
                    return Started::Attached(in_flight.handle.clone());
                }
            }
            entry.generation += 1;
            entry.loading = true;
            entry.generation
        };

        let weak: Weak<Self> = Rc::downgrade(this);
        let settle_key = key.clone();
        let computation = make();
        let future = async move {
            let result = computation.await;
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.settle(&settle_key, generation, &result, &settlement);
            }
            result
        }
        .boxed_local();
        let handle = PendingHandle::new(future, generation);

        {
            let mut state = this.state.borrow_mut();
            let entry = state.keys.entry(key.clone()).or_default();
            entry.pending = Some(InFlight {
                handle: handle.clone(),
                suspense,
            });
        }
        tracing::debug!(
            store = %key.store,
            key = %key.key,
            generation,
            "initializer pending"
        );

        let driver = handle.clone();
        this.spawn(
            async move {
                let _ = driver.await;
            }
            .boxed_local(),
        );
        this.notify_status(&key.store);
        Started::Spawned(handle)
    }

    fn settle(
        &self,
        key: &CacheKey,
        generation: u64,
        result: &std::result::Result<Value, InitError>,
        settlement: &Settlement,
    ) {
        {
            let mut state = self.state.borrow_mut();
            let Some(entry) = state.keys.get_mut(key) else {
                return;
            };
            let current = entry
                .pending
                .as_ref()
                .map(|in_flight| in_flight.handle.generation());
            if current != Some(generation) {
                tracing::debug!(
                    store = %key.store,
                    key = %key.key,
                    generation,
                    "discarding stale initializer result"
                );
                return;
            }
            entry.pending = None;
            entry.loading = false;
            Self::record(entry, result, settlement.error_boundary);
        }
        tracing::debug!(
            store = %key.store,
            key = %key.key,
            generation,
            ok = result.is_ok(),
            "initializer settled"
        );
        settlement.fire(result);
        self.notify_status(&key.store);
    }

    fn record(
        entry: &mut KeyState,
        result: &std::result::Result<Value, InitError>,
        error_boundary: bool,
    ) {
        match result {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.error = None;
                entry.boundary_error = None;
            }
            Err(error) => {
                entry.error = Some(error.clone());
                if error_boundary {
                    entry.boundary_error = Some(error.clone());
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries

    fn with_key<T>(&self, key: &CacheKey, f: impl FnOnce(&KeyState) -> T) -> Option<T> {
        self.state.borrow().keys.get(key).map(f)
    }

    pub(crate) fn error(&self, key: &CacheKey) -> Option<InitError> {
        self.with_key(key, |entry| entry.error.clone()).flatten()
    }

    pub(crate) fn key_boundary_error(&self, key: &CacheKey) -> Option<InitError> {
        self.with_key(key, |entry| entry.boundary_error.clone())
            .flatten()
    }

    pub(crate) fn is_loading(&self, key: &CacheKey) -> bool {
        self.with_key(key, |entry| entry.loading).unwrap_or(false)
    }

    pub(crate) fn pending(&self, key: &CacheKey) -> Option<(PendingHandle, bool)> {
        self.with_key(key, |entry| {
            entry
                .pending
                .as_ref()
                .map(|in_flight| (in_flight.handle.clone(), in_flight.suspense))
        })
        .flatten()
    }

    /// Handle of a suspense-enabled computation pending for `store`.
    pub(crate) fn pending_for(&self, store: &View) -> Option<PendingHandle> {
        let store = StoreId::of(store);
        let state = self.state.borrow();
        let mut pending: Vec<(&String, &PendingHandle)> = state
            .keys
            .iter()
            .filter(|(key, _)| key.store == store)
            .filter_map(|(key, entry)| {
                entry
                    .pending
                    .as_ref()
                    .filter(|in_flight| in_flight.suspense)
                    .map(|in_flight| (&key.key, &in_flight.handle))
            })
            .collect();
        pending.sort_by(|a, b| a.0.cmp(b.0));
        pending.first().map(|(_, handle)| (*handle).clone())
    }

    pub(crate) fn boundary_error(&self, store: &View) -> Option<InitError> {
        let store = StoreId::of(store);
        let state = self.state.borrow();
        let mut errors: Vec<(&String, &InitError)> = state
            .keys
            .iter()
            .filter(|(key, _)| key.store == store)
            .filter_map(|(key, entry)| entry.boundary_error.as_ref().map(|e| (&key.key, e)))
            .collect();
        errors.sort_by(|a, b| a.0.cmp(b.0));
        errors.first().map(|(_, error)| (*error).clone())
    }

    // ------------------------------------------------------------------
    // Status listeners

    pub(crate) fn register_status(
        this: &Rc<Self>,
        store: &View,
        callback: StatusCallback,
    ) -> Registration {
        let id = {
            let mut status = this.status.borrow_mut();
            status.next_id += 1;
            let id = ListenerId(status.next_id);
            status
                .by_store
                .entry(StoreId::of(store))
                .or_default()
                .push((id, callback));
            id
        };
        let weak: Weak<Orchestrator> = Rc::downgrade(this);
        Registration::new(weak, id)
    }

    fn notify_status(&self, store: &StoreId) {
        let callbacks: Vec<StatusCallback> = self
            .status
            .borrow()
            .by_store
            .get(store)
            .map(|listeners| listeners.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback();
        }
    }
}

impl ListenerSet for Orchestrator {
    fn remove_listener(&self, id: ListenerId) {
        let mut status = self.status.borrow_mut();
        status.by_store.retain(|_, listeners| {
            listeners.retain(|(lid, _)| *lid != id);
            !listeners.is_empty()
        });
    }
}
