//! Listener values and fault reporting.

use anyhow::anyhow;
use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Future returned by a deferred listener.
pub type ListenerFuture = BoxFuture<'static, anyhow::Result<()>>;

type SyncFn<T> = dyn Fn(&T) -> anyhow::Result<()> + Send + Sync;
type DeferredFn<T> = dyn Fn(&T) -> ListenerFuture + Send + Sync;

/// A subscriber callback.
///
/// Identity is the shared allocation: clones of one `Listener` are the same
/// listener, while two `Listener`s built from equal closures are distinct.
pub struct Listener<T> {
    kind: ListenerKind<T>,
}

enum ListenerKind<T> {
    Sync(Arc<SyncFn<T>>),
    Deferred(Arc<DeferredFn<T>>),
}

/// What happened when a listener was invoked.
pub(crate) enum Delivery {
    Done,
    Failed(anyhow::Error),
    Pending(ListenerFuture),
}

impl<T: 'static> Listener<T> {
    /// Listener that completes before `publish` moves on.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: ListenerKind::Sync(Arc::new(f)),
        }
    }

    /// Listener whose returned future is driven out-of-band on the tokio
    /// runtime; `publish` never waits for it.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&T) -> ListenerFuture + Send + Sync + 'static,
    {
        Self {
            kind: ListenerKind::Deferred(Arc::new(f)),
        }
    }
}

impl<T> Listener<T> {
    /// Whether `other` is the same listener (a clone of this one).
    pub fn same(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        match &self.kind {
            ListenerKind::Sync(f) => Arc::as_ptr(f) as *const (),
            ListenerKind::Deferred(f) => Arc::as_ptr(f) as *const (),
        }
    }

    pub(crate) fn invoke(&self, event: &T) -> Delivery {
        let result = panic::catch_unwind(AssertUnwindSafe(|| match &self.kind {
            ListenerKind::Sync(f) => f(event).map(|()| None),
            ListenerKind::Deferred(f) => Ok(Some(f(event))),
        }));

        match result {
            Ok(Ok(None)) => Delivery::Done,
            Ok(Ok(Some(future))) => Delivery::Pending(future),
            Ok(Err(error)) => Delivery::Failed(error),
            Err(payload) => Delivery::Failed(panic_error(payload)),
        }
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            ListenerKind::Sync(f) => ListenerKind::Sync(Arc::clone(f)),
            ListenerKind::Deferred(f) => ListenerKind::Deferred(Arc::clone(f)),
        };
        Self { kind }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ListenerKind::Sync(_) => "sync",
            ListenerKind::Deferred(_) => "deferred",
        };
        f.debug_struct("Listener")
            .field("kind", &kind)
            .field("addr", &self.addr())
            .finish()
    }
}

/// A failure raised by a listener, as seen by a bus's error handler.
#[derive(Debug)]
pub struct ListenerFault {
    pub event_name: String,
    pub error: anyhow::Error,
}

/// Policy invoked for every listener failure on a bus.
pub type ErrorHandler = Arc<dyn Fn(ListenerFault) + Send + Sync>;

/// Default policy: log the fault and move on.
pub fn log_listener_fault() -> ErrorHandler {
    Arc::new(|fault: ListenerFault| {
        tracing::error!(
            target: "vds::bus",
            event = %fault.event_name,
            error = %fault.error,
            "Unhandled error in listener"
        );
    })
}

/// Convert a caught panic payload into an error carrying its message.
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow!("panicked: {message}")
}
