//! Pre-broadcast event transformation over the sequential reply protocol
//!
//! Before broadcasting, a reactor can route the event through a
//! transformation stage: each registered transformer receives the chain's
//! current transformed-event-so-far (the original if it runs first) and
//! replies with a possibly new event. The final chain tail is what actually
//! gets broadcast. See `TransformationMode` on the reactor for the per-emit
//! selection.

use crate::component::{Component, ComponentId, Distributor};
use crate::error::{ReactorError, TaskError};
use crate::event::{Event, EventId, EventMeta, ReturningEvent};
use crate::injection::Injectable;
use crate::reactor::Reactor;
use crate::sequential::SequentialChain;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tracing::error;

/// Routing key carried by every transform event.
pub const TRANSFORMATION_ROUTING_KEY: &str = "reflex.transformation";

/// "Rewrite event `E` before it is broadcast."
pub struct TransformEvent {
    meta: EventMeta,
    original: Arc<dyn Event>,
    chain: SequentialChain<Arc<dyn Event>>,
}

impl TransformEvent {
    pub fn new(source: Option<ComponentId>, original: Arc<dyn Event>) -> Self {
        let meta = EventMeta::new(source);
        let chain = SequentialChain::new(meta.completion().clone());
        Self {
            meta,
            original,
            chain,
        }
    }

    /// The event as it was emitted.
    pub fn original(&self) -> &Arc<dyn Event> {
        &self.original
    }

    pub fn chain(&self) -> &SequentialChain<Arc<dyn Event>> {
        &self.chain
    }

    /// The chain tail: the fully transformed event, or the original if no
    /// transformer replied.
    pub async fn transformed(&self) -> Result<Arc<dyn Event>, TaskError> {
        self.chain.previous_reply(None, self.original.clone()).await
    }
}

impl Event for TransformEvent {
    fn event_id(&self) -> EventId {
        self.meta.id()
    }

    fn source(&self) -> Option<ComponentId> {
        self.meta.source()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn on_emit_completed(&self) {
        self.meta.complete();
    }

    fn routing_key(&self) -> Option<&str> {
        Some(TRANSFORMATION_ROUTING_KEY)
    }
}

#[async_trait]
impl ReturningEvent for TransformEvent {
    async fn wait_for_reply(&self) {
        self.chain.wait_for_reply().await;
    }

    fn is_replied(&self) -> Result<bool, ReactorError> {
        self.chain.is_replied()
    }
}

/// One transformation stage: maps the event-so-far to a possibly new event.
#[async_trait]
pub trait Transformer: Send + Sync + 'static {
    async fn transform(
        &self,
        reactor: &Reactor,
        current: Arc<dyn Event>,
    ) -> Result<Arc<dyn Event>, TaskError>;
}

/// Component adapter running a [`Transformer`] against transform events.
pub struct TransformerComponent<X> {
    id: ComponentId,
    transformer: Arc<X>,
}

impl<X> TransformerComponent<X>
where
    X: Transformer,
{
    pub fn new(transformer: X) -> Self {
        Self {
            id: ComponentId::new(),
            transformer: Arc::new(transformer),
        }
    }
}

#[async_trait]
impl<X> Component for TransformerComponent<X>
where
    X: Transformer,
{
    fn component_id(&self) -> ComponentId {
        self.id
    }

    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
        let Ok(transform) = event.clone().as_any_arc().downcast::<TransformEvent>() else {
            return;
        };

        let id = self.id;
        let transformer = self.transformer.clone();
        let task_reactor = reactor.clone();
        let task_event = transform.clone();
        let handle = reactor.run_async(async move {
            let current = task_event
                .chain()
                .previous_reply(Some(id), task_event.original().clone())
                .await?;
            transformer.transform(&task_reactor, current).await
        });

        if let Err(e) = transform.chain().reply(id, handle) {
            error!(error = %e, "Transformer failed to record its reply");
        }
    }
}

/// Singleton distributor routing transform events to the registered
/// transformers, in registration order. Discoverable as the injectable
/// `"transformation_distributor"`.
pub struct TransformationDistributor {
    inner: Distributor,
}

impl TransformationDistributor {
    pub fn new() -> Self {
        Self {
            inner: Distributor::keyed(TRANSFORMATION_ROUTING_KEY),
        }
    }

    /// Register a transformer component.
    pub fn add_transformer(&self, transformer: Arc<dyn Component>) {
        self.inner.add_component(transformer);
    }

    pub fn transformer_count(&self) -> usize {
        self.inner.component_count()
    }
}

impl Default for TransformationDistributor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for TransformationDistributor {
    fn component_id(&self) -> ComponentId {
        self.inner.component_id()
    }

    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
        self.inner.on_event(reactor, event).await;
    }
}

impl Injectable for TransformationDistributor {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn injectable_name(&self) -> Option<&str> {
        Some("transformation_distributor")
    }
}
