//! Component trait and routing distributors

use crate::event::Event;
use crate::reactor::Reactor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Identity of a registered component.
///
/// Components are identified by id, never by value equality; a reactor's
/// component list keeps insertion order and performs no deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId(Uuid);

impl ComponentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Polymorphic event handler.
///
/// `on_event` is called on the emitting task, in registration order, for
/// every event the reactor broadcasts. A component may ignore the event, or
/// submit asynchronous work with `Reactor::run_async` and record the handle
/// as a reply on the event. It must not block on another component's reply
/// from within the same broadcast pass, or the emission deadlocks.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// The component's identity, stable for its whole lifetime.
    fn component_id(&self) -> ComponentId;

    /// Handle one broadcast event.
    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>);
}

/// Membership predicate of a [`Distributor`].
pub type DistributorPredicate = Arc<dyn Fn(&Reactor, &Arc<dyn Event>) -> bool + Send + Sync>;

/// A component that conditionally re-broadcasts events to a private,
/// ordered sub-list of components.
pub struct Distributor {
    id: ComponentId,
    components: RwLock<Vec<Arc<dyn Component>>>,
    predicate: DistributorPredicate,
}

impl Distributor {
    /// Create a distributor with an arbitrary membership predicate.
    pub fn new<P>(predicate: P) -> Self
    where
        P: Fn(&Reactor, &Arc<dyn Event>) -> bool + Send + Sync + 'static,
    {
        Self {
            id: ComponentId::new(),
            components: RwLock::new(Vec::new()),
            predicate: Arc::new(predicate),
        }
    }

    /// Create a distributor that forwards events whose
    /// [`routing_key`](Event::routing_key) equals `key`.
    pub fn keyed(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |_, event| event.routing_key() == Some(key.as_str()))
    }

    /// Append a component to the sub-list.
    pub fn add_component(&self, component: Arc<dyn Component>) {
        self.components.write().unwrap().push(component);
    }

    /// Snapshot of the sub-list, in registration order.
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components.read().unwrap().clone()
    }

    /// Number of registered sub-components.
    pub fn component_count(&self) -> usize {
        self.components.read().unwrap().len()
    }
}

#[async_trait]
impl Component for Distributor {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
        if !(self.predicate)(reactor, event) {
            return;
        }
        // Forwarding stays on the broadcast task: the reactor must not mark
        // the event complete before the sub-components have been visited.
        for component in self.components() {
            component.on_event(reactor, event).await;
        }
    }
}
