// src/events.rs

//! In-process notification bus.
//!
//! UI surfaces subscribe to a `ProgressEventKind` and get a `Subscription`
//! back. Dropping the subscription (or calling `unsubscribe`) removes the
//! handler. Delivery is synchronous, in subscription order, on the emitting
//! task. Nothing crosses process boundaries.
//!
//! Handlers are plain closures and must not block. A surface that needs the
//! full progress after an event (rather than the payload) should forward the
//! event to a task, for example over a `tokio::sync::mpsc` channel, and call
//! `ProgressManager::snapshot` there. Events are emitted after the state lock
//! is released, so that snapshot already includes the change.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use crate::models::event::{ProgressEvent, ProgressEventKind};

/// Callback type for event handlers
pub type EventHandler = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<ProgressEventKind, Vec<(u64, EventHandler)>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking handler runs outside the lock, so the registry itself is never left half-updated.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcasts `event` to every handler registered for its kind.
    ///
    /// Handlers are snapshotted before dispatch, so a handler may subscribe
    /// or unsubscribe without deadlocking the bus.
    pub fn emit(&self, event: &ProgressEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = lock(&self.registry)
            .handlers
            .get(&kind)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        tracing::debug!(event = kind.as_str(), listeners = handlers.len(), "Emitting progress event");

        for handler in handlers {
            handler(event);
        }
    }

    /// Registers `handler` for events of `kind`.
    #[must_use = "dropping the Subscription unsubscribes the handler immediately"]
    pub fn subscribe<F>(&self, kind: ProgressEventKind, handler: F) -> Subscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .handlers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn listener_count(&self, kind: ProgressEventKind) -> usize {
        lock(&self.registry)
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

/// Disposer returned by `EventBus::subscribe`.
pub struct Subscription {
    id: u64,
    kind: ProgressEventKind,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Removes the handler. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}

    fn detach(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = lock(&registry);
        if let Some(list) = registry.handlers.get_mut(&self.kind) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                registry.handlers.remove(&self.kind);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
