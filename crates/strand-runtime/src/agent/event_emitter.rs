//! Listener registry for [`AgentEvent`] dispatch.
//!
//! Listeners are plain synchronous callbacks, invoked in subscription order
//! on the task that generates the event. `emit` snapshots the listener list
//! first, so a listener may subscribe or unsubscribe (itself included)
//! without deadlocking; changes take effect from the next event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use strand_core::events::AgentEvent;

/// A subscribed event callback.
pub type Listener = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    emit_count: AtomicU64,
}

/// Synchronous fan-out of agent events.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Arc<Inner>,
}

impl EventEmitter {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every listener.
    ///
    /// Returns the number of listeners called.
    pub fn emit(&self, event: &AgentEvent) -> usize {
        let _ = self.inner.emit_count.fetch_add(1, Ordering::Relaxed);
        let snapshot: Vec<Listener> = self.inner.listeners.read().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }

    /// Register `listener` for all events emitted after this call.
    pub fn subscribe(&self, listener: impl Fn(&AgentEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            emitter: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Total number of events emitted.
    pub fn emit_count(&self) -> u64 {
        self.inner.emit_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .field("emit_count", &self.emit_count())
            .finish()
    }
}

/// Handle returned by [`EventEmitter::subscribe`].
///
/// Dropping the handle leaves the listener registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    emitter: Weak<Inner>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.emitter.upgrade() else {
            return false;
        };
        let mut listeners = inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != self.id);
        listeners.len() != before
    }

    /// Opaque subscription id.
    pub fn id(&self) -> u64 {
        self.id
    }
}
