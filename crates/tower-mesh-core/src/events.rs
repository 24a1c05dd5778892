//! Event system shared by the mesh components.
//!
//! The registry, circuit breakers, rate limiter and gateway all report what
//! they do through [`EventListeners`]. Emission sits on the request path, so
//! components hand [`EventListeners::emit_with`] a builder instead of a
//! finished event: with no listeners attached nothing is allocated.
//!
//! Any `Fn(&E) + Send + Sync` closure is a listener; implement
//! [`EventListener`] directly when the listener carries its own state.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a mesh component.
pub trait MeshEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When this event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the component that emitted the event: a breaker name, a
    /// registry name, a gateway name.
    fn source(&self) -> &str;

    /// The service instance the event concerns, when there is one.
    fn instance_id(&self) -> Option<&str> {
        None
    }
}

/// Receives events of type `E`.
///
/// Listeners run synchronously on the emitting thread, sometimes while the
/// component holds an internal lock. They must not call back into the
/// component that emitted the event.
pub trait EventListener<E: MeshEvent>: Send + Sync {
    /// Called for every emitted event.
    fn on_event(&self, event: &E);
}

impl<E, F> EventListener<E> for F
where
    E: MeshEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

/// An ordered set of listeners for one event type.
///
/// Cloning is cheap and the clone shares the listeners.
pub struct EventListeners<E: MeshEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: MeshEvent> EventListeners<E> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Appends a closure listener. Equivalent to [`add`](Self::add), but
    /// pins the closure's argument type so it can be left unannotated.
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.add(f);
    }

    /// Delivers `event` to every listener in registration order.
    ///
    /// A panicking listener is isolated: the panic is caught and the
    /// remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
        }
    }

    /// Builds the event only if someone is listening, then emits it.
    pub fn emit_with<B>(&self, build: B)
    where
        B: FnOnce() -> E,
    {
        if !self.listeners.is_empty() {
            self.emit(&build());
        }
    }

    /// Returns true if no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: MeshEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: MeshEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MeshEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}
