//! Publish/subscribe over named events.
//!
//! An [`EventBus`] decouples producers of named events from their
//! subscribers. Every listener runs in isolation: a listener that returns an
//! error or panics is reported to the bus's [`ErrorHandler`] and delivery
//! continues with the remaining listeners. `publish` never fails and never
//! waits for deferred listeners.
//!
//! # Example
//!
//! ```rust
//! use vds::bus::{EventBus, Listener, WILDCARD};
//! use vds::core::DomainEvent;
//! use std::sync::{Arc, Mutex};
//!
//! let bus: EventBus<DomainEvent> = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&seen);
//! let subscription = bus.subscribe(WILDCARD, Listener::sync(move |event: &DomainEvent| {
//!     sink.lock().unwrap().push(event.name.clone());
//!     Ok(())
//! }));
//!
//! bus.publish(&DomainEvent::new("PLAYBACK_STARTED"));
//! subscription.unsubscribe();
//! bus.publish(&DomainEvent::new("PLAYBACK_PAUSED"));
//!
//! assert_eq!(*seen.lock().unwrap(), vec!["PLAYBACK_STARTED".to_string()]);
//! ```

mod listener;
mod subscription;

pub use listener::{log_listener_fault, ErrorHandler, Listener, ListenerFault, ListenerFuture};
pub use subscription::Unsubscribe;

pub(crate) use listener::panic_error;

use crate::core::BusEvent;
use anyhow::anyhow;
use futures::FutureExt;
use listener::Delivery;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Event name that subscribes a listener to every event on a bus.
pub const WILDCARD: &str = "*";

struct Entry<T> {
    id: u64,
    listener: Listener<T>,
}

struct Registry<T> {
    next_id: u64,
    named: HashMap<String, Vec<Entry<T>>>,
    wildcard: Vec<Entry<T>>,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            named: HashMap::new(),
            wildcard: Vec::new(),
        }
    }

    fn insert(&mut self, event_name: &str, listener: Listener<T>) -> u64 {
        let id = self.next_id;
        let entries = if event_name == WILDCARD {
            &mut self.wildcard
        } else {
            self.named.entry(event_name.to_string()).or_default()
        };

        if let Some(existing) = entries.iter().find(|e| e.listener.same(&listener)) {
            return existing.id;
        }

        entries.push(Entry { id, listener });
        self.next_id += 1;
        id
    }

    fn remove(&mut self, event_name: &str, id: u64) {
        if event_name == WILDCARD {
            self.wildcard.retain(|e| e.id != id);
            return;
        }

        if let Some(entries) = self.named.get_mut(event_name) {
            entries.retain(|e| e.id != id);
            if entries.is_empty() {
                self.named.remove(event_name);
            }
        }
    }

    /// Listeners for `event_name` followed by wildcard listeners, each
    /// distinct listener once.
    fn snapshot(&self, event_name: &str) -> Vec<Listener<T>> {
        let named = self.named.get(event_name).into_iter().flatten();
        let mut listeners: Vec<Listener<T>> = Vec::new();
        for entry in named.chain(self.wildcard.iter()) {
            if !listeners.iter().any(|l| l.same(&entry.listener)) {
                listeners.push(entry.listener.clone());
            }
        }
        listeners
    }
}

/// Generic publish/subscribe bus with per-listener failure isolation.
pub struct EventBus<T> {
    registry: Arc<Mutex<Registry<T>>>,
    on_error: ErrorHandler,
}

impl<T: BusEvent> EventBus<T> {
    /// Bus whose listener faults are logged.
    pub fn new() -> Self {
        Self::with_error_handler(log_listener_fault())
    }

    /// Bus whose listener faults are passed to `on_error`.
    pub fn with_error_handler(on_error: ErrorHandler) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
            on_error,
        }
    }

    /// Register `listener` for `event_name`, or for every event when
    /// `event_name` is [`WILDCARD`].
    ///
    /// Registering the same listener twice under one name is idempotent.
    pub fn subscribe(&self, event_name: &str, listener: Listener<T>) -> Unsubscribe {
        let id = lock(&self.registry).insert(event_name, listener);

        let registry = Arc::downgrade(&self.registry);
        let event_name = event_name.to_string();
        Unsubscribe::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock(&registry).remove(&event_name, id);
            }
        })
    }

    /// Deliver `event` to every matching listener.
    pub fn publish(&self, event: &T) {
        let listeners = lock(&self.registry).snapshot(event.name());
        if listeners.is_empty() {
            return;
        }

        for listener in listeners {
            match listener.invoke(event) {
                Delivery::Done => {}
                Delivery::Failed(error) => self.report(ListenerFault {
                    event_name: event.name().to_string(),
                    error,
                }),
                Delivery::Pending(future) => self.drive(event.name(), future),
            }
        }
    }

    /// Number of listeners registered exactly under `event_name`.
    pub fn listener_count(&self, event_name: &str) -> usize {
        let registry = lock(&self.registry);
        if event_name == WILDCARD {
            registry.wildcard.len()
        } else {
            registry.named.get(event_name).map_or(0, Vec::len)
        }
    }

    fn drive(&self, event_name: &str, future: ListenerFuture) {
        let event_name = event_name.to_string();
        let on_error = Arc::clone(&self.on_error);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let error = match AssertUnwindSafe(future).catch_unwind().await {
                        Ok(Ok(())) => return,
                        Ok(Err(error)) => error,
                        Err(payload) => panic_error(payload),
                    };
                    report_with(&on_error, ListenerFault { event_name, error });
                });
            }
            Err(_) => self.report(ListenerFault {
                event_name,
                error: anyhow!("no async runtime available to drive deferred listener"),
            }),
        }
    }

    fn report(&self, fault: ListenerFault) {
        report_with(&self.on_error, fault);
    }
}

impl<T: BusEvent> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn report_with(on_error: &ErrorHandler, fault: ListenerFault) {
    let event_name = fault.event_name.clone();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_error(fault))) {
        tracing::error!(
            target: "vds::bus",
            event = %event_name,
            error = %panic_error(payload),
            "Error handler panicked while reporting a listener fault"
        );
    }
}

fn lock<T>(registry: &Mutex<Registry<T>>) -> MutexGuard<'_, Registry<T>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
