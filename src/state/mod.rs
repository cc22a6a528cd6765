//! Single source of truth for [`CoreState`].
//!
//! The [`StateManager`] owns the current snapshot, hands it out by value
//! (`Arc<CoreState>`) and notifies subscribers when a different snapshot is
//! installed. Installing the snapshot that is already current is a no-op:
//! identity, not deep equality, decides whether anything changed.
//!
//! Notifications are delivered one at a time, in the order snapshots were
//! installed, even when several threads install concurrently. A snapshot
//! installed while another caller is delivering is handed to that caller's
//! delivery loop, so a subscriber may install state itself without
//! deadlocking.

use crate::blueprint::Blueprint;
use crate::bus::{log_listener_fault, ErrorHandler, EventBus, Listener, Unsubscribe};
use crate::core::{BusEvent, CoreState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Event name under which state changes are delivered to subscribers.
pub const STATE_CHANGED: &str = "STATE_CHANGED";

/// Notification carrying the newly installed snapshot.
#[derive(Clone, Debug)]
pub struct StateChanged {
    pub state: Arc<CoreState>,
}

impl BusEvent for StateChanged {
    fn name(&self) -> &str {
        STATE_CHANGED
    }
}

/// Holds the current snapshot and mediates change notification.
pub struct StateManager {
    current: RwLock<Arc<CoreState>>,
    outbox: Mutex<Outbox>,
    changes: EventBus<StateChanged>,
}

/// Installed snapshots not yet delivered to subscribers.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Arc<CoreState>>,
    delivering: bool,
}

impl StateManager {
    /// Manager seeded from the blueprint's initial values; subscriber
    /// faults are logged.
    pub fn new(blueprint: &Blueprint) -> Self {
        Self::with_error_handler(blueprint, log_listener_fault())
    }

    /// Manager whose subscriber faults are passed to `on_error`.
    pub fn with_error_handler(blueprint: &Blueprint, on_error: ErrorHandler) -> Self {
        Self {
            current: RwLock::new(Arc::new(CoreState::initial(blueprint))),
            outbox: Mutex::new(Outbox::default()),
            changes: EventBus::with_error_handler(on_error),
        }
    }

    /// Current snapshot. Never blocks on subscribers, never fails.
    pub fn get_state(&self) -> Arc<CoreState> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Register a state-change listener. Listeners run in registration order.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Arc<CoreState>) + Send + Sync + 'static,
    {
        self.subscribe_listener(Listener::sync(move |change: &StateChanged| {
            listener(&change.state);
            Ok(())
        }))
    }

    /// Register a prepared listener, keeping its identity.
    pub fn subscribe_listener(&self, listener: Listener<StateChanged>) -> Unsubscribe {
        self.changes.subscribe(STATE_CHANGED, listener)
    }

    /// Install `next` and notify subscribers, unless it is already current.
    ///
    /// Returns whether a new snapshot was installed.
    pub fn set_state(&self, next: Arc<CoreState>) -> bool {
        self.apply(|_| next)
    }

    /// Derive the next snapshot from the current one while holding the
    /// write lock, so no other mutation interleaves between read and write.
    pub(crate) fn apply<F>(&self, derive: F) -> bool
    where
        F: FnOnce(&Arc<CoreState>) -> Arc<CoreState>,
    {
        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let next = derive(&current);
            if Arc::ptr_eq(&current, &next) {
                return false;
            }
            *current = Arc::clone(&next);
            // Queued under the write lock: delivery order is install order.
            self.outbox().queue.push_back(next);
        }

        self.deliver();
        true
    }

    /// Drain the outbox unless another caller already is.
    fn deliver(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }

        loop {
            let next = {
                let mut outbox = self.outbox();
                match outbox.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        outbox.delivering = false;
                        return;
                    }
                }
            };
            self.changes.publish(&StateChanged { state: next });
        }
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Live accessor to the current state, handed to command handlers.
///
/// Every call to [`get`](Self::get) reads the snapshot current at that
/// moment, so a handler that awaits an external effect sees changes made by
/// other dispatches in the meantime.
#[derive(Clone)]
pub struct GetState {
    manager: Arc<StateManager>,
}

impl GetState {
    pub(crate) fn new(manager: Arc<StateManager>) -> Self {
        Self { manager }
    }

    pub fn get(&self) -> Arc<CoreState> {
        self.manager.get_state()
    }
}
