//! Pending-operation handles and the read contract built on them.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;

use crate::{InitError, Value};

pub(crate) type InitFuture = LocalBoxFuture<'static, Result<Value, InitError>>;

/// Shared handle to one in-flight initializer computation.
///
/// Every caller attached to the same cache key holds a clone of the same
/// handle. Awaiting it yields the settled result; any number of clones may
/// await concurrently and each receives a copy.
#[derive(Clone)]
pub struct PendingHandle {
    future: Shared<InitFuture>,
    generation: u64,
}

impl PendingHandle {
    pub(crate) fn new(future: InitFuture, generation: u64) -> Self {
        Self {
            future: future.shared(),
            generation,
        }
    }

    /// Whether both handles refer to the same computation.
    pub fn ptr_eq(&self, other: &PendingHandle) -> bool {
        self.future.ptr_eq(&other.future)
    }

    /// Whether the computation has produced its result.
    pub fn is_settled(&self) -> bool {
        self.future.peek().is_some()
    }

    /// The settled result, if available.
    pub fn result(&self) -> Option<Result<Value, InitError>> {
        self.future.peek().cloned()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Future for PendingHandle {
    type Output = Result<Value, InitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().future.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingHandle")
            .field("generation", &self.generation)
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// What a consumer sees when it reads reactive state.
///
/// Hosts that suspend rendering await the handle in `Pending` and retry the
/// read; hosts with an error-recovery boundary route `Failed` there.
#[derive(Debug, Clone)]
pub enum Snapshot<T> {
    Ready(T),
    Pending(PendingHandle),
    Failed(InitError),
}

impl<T> Snapshot<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Snapshot::Ready(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Snapshot::Pending(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Snapshot::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        match self {
            Snapshot::Ready(value) => Snapshot::Ready(f(value)),
            Snapshot::Pending(handle) => Snapshot::Pending(handle),
            Snapshot::Failed(error) => Snapshot::Failed(error),
        }
    }

    /// Convert into a `Result`, treating a pending read as ready-less.
    pub fn into_result(self) -> Result<Option<T>, InitError> {
        match self {
            Snapshot::Ready(value) => Ok(Some(value)),
            Snapshot::Pending(_) => Ok(None),
            Snapshot::Failed(error) => Err(error),
        }
    }
}
