//! Staged object fabrication over the sequential reply protocol
//!
//! A fabrication event asks the bus to build an instance of some type `T`.
//! Factory components each contribute a stage: the first stage creates the
//! instance, every later stage derives a new or mutated instance from the
//! previous stage's result. The instance under construction is never a
//! field of the event — it travels as the sequential chain's most recent
//! reply value, so "the object so far" is always the previous reply as seen
//! by the currently executing stage.

use crate::component::{Component, ComponentId, Distributor};
use crate::error::{ReactorError, TaskError};
use crate::event::{Event, EventId, EventMeta, ReturningEvent};
use crate::injection::Injectable;
use crate::reactor::Reactor;
use crate::sequential::SequentialChain;
use async_trait::async_trait;
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{error, warn};

/// Routing key carried by every fabrication event.
pub const FABRICATION_ROUTING_KEY: &str = "reflex.fabrication";

/// "Build an instance of `T`."
pub struct FabricationEvent<T> {
    meta: EventMeta,
    chain: SequentialChain<Option<T>>,
    instance_type: &'static str,
}

impl<T> FabricationEvent<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(source: Option<ComponentId>) -> Self {
        let meta = EventMeta::new(source);
        let chain = SequentialChain::new(meta.completion().clone());
        Self {
            meta,
            chain,
            instance_type: std::any::type_name::<T>(),
        }
    }

    /// The reply chain carrying the instance under construction.
    pub fn chain(&self) -> &SequentialChain<Option<T>> {
        &self.chain
    }

    /// Name of the type being fabricated, for diagnostics.
    pub fn instance_type(&self) -> &'static str {
        self.instance_type
    }

    /// The fully assembled instance: the chain tail's result. Meaningful
    /// after [`wait_for_reply`](ReturningEvent::wait_for_reply); `None` if
    /// no factory produced anything.
    pub async fn instance(&self) -> Result<Option<T>, TaskError> {
        self.chain.previous_reply(None, None).await
    }
}

impl<T> Event for FabricationEvent<T>
where
    T: Clone + Send + Sync + 'static,
{
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
        Some(FABRICATION_ROUTING_KEY)
    }
}

#[async_trait]
impl<T> ReturningEvent for FabricationEvent<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn wait_for_reply(&self) {
        self.chain.wait_for_reply().await;
    }

    fn is_replied(&self) -> Result<bool, ReactorError> {
        self.chain.is_replied()
    }
}

/// One fabrication stage.
///
/// `previous` is the instance handed down the chain, or `None` when this
/// stage runs first (the fabricator decides the fresh-instance policy —
/// [`AttributeAppender`] default-constructs). Returning an error does not
/// abort the chain: the stage is downgraded to "no instance produced" so
/// downstream stages still run.
#[async_trait]
pub trait Fabricator<T>: Send + Sync + 'static {
    async fn fabricate(
        &self,
        reactor: &Reactor,
        previous: Option<T>,
        event: &FabricationEvent<T>,
    ) -> Result<Option<T>, TaskError>;
}

/// Component adapter running a [`Fabricator`] against fabrication events
/// for its instance type. Events for other types are ignored.
pub struct FactoryComponent<T, F> {
    id: ComponentId,
    fabricator: Arc<F>,
    _instance: PhantomData<fn() -> T>,
}

impl<T, F> FactoryComponent<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fabricator<T>,
{
    pub fn new(fabricator: F) -> Self {
        Self {
            id: ComponentId::new(),
            fabricator: Arc::new(fabricator),
            _instance: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> Component for FactoryComponent<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fabricator<T>,
{
    fn component_id(&self) -> ComponentId {
        self.id
    }

    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
        let Ok(fabrication) = event.clone().as_any_arc().downcast::<FabricationEvent<T>>()
        else {
            return;
        };

        let id = self.id;
        let fabricator = self.fabricator.clone();
        let task_reactor = reactor.clone();
        let task_event = fabrication.clone();
        let handle = reactor.run_async(async move {
            let previous = match task_event.chain().previous_reply(Some(id), None).await {
                Ok(previous) => previous,
                Err(e) => {
                    warn!(
                        error = %e,
                        instance_type = task_event.instance_type(),
                        "Predecessor stage unavailable, fabricating from scratch"
                    );
                    None
                }
            };

            match fabricator.fabricate(&task_reactor, previous, &task_event).await {
                Ok(instance) => Ok(instance),
                // Best effort: a misbehaving stage must not block the ones
                // after it.
                Err(e) => {
                    warn!(
                        error = %e,
                        instance_type = task_event.instance_type(),
                        "Fabrication stage failed, producing no instance"
                    );
                    Ok(None)
                }
            }
        });

        if let Err(e) = fabrication.chain().reply(id, handle) {
            error!(error = %e, "Factory failed to record its reply");
        }
    }
}

/// Open attribute payload applied by [`AttributeAppender`].
pub type AttributeValue = serde_json::Value;

/// Value producer of one appended attribute, fed the instance so far and
/// the fabrication event.
pub type AttributeProducer<T> =
    Arc<dyn Fn(&T, &FabricationEvent<T>) -> AttributeValue + Send + Sync>;

/// A type whose fabrication stages can set attributes by name.
pub trait AttributeTarget: Default + Clone + Send + Sync + 'static {
    fn set_attribute(&mut self, name: &str, value: AttributeValue);
}

/// Fabricator that applies an ordered name-to-producer mapping to whichever
/// instance it received — the previous stage's result, or a
/// default-constructed one when it runs first.
pub struct AttributeAppender<T> {
    attributes: Vec<(String, AttributeProducer<T>)>,
}

impl<T> AttributeAppender<T>
where
    T: AttributeTarget,
{
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    /// Append an attribute to the mapping. Entries apply in insertion
    /// order.
    pub fn attribute<P>(mut self, name: impl Into<String>, producer: P) -> Self
    where
        P: Fn(&T, &FabricationEvent<T>) -> AttributeValue + Send + Sync + 'static,
    {
        self.attributes.push((name.into(), Arc::new(producer)));
        self
    }

    /// Wrap this appender as a registrable factory component.
    pub fn into_component(self) -> FactoryComponent<T, Self> {
        FactoryComponent::new(self)
    }
}

impl<T> Default for AttributeAppender<T>
where
    T: AttributeTarget,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> Fabricator<T> for AttributeAppender<T>
where
    T: AttributeTarget,
{
    async fn fabricate(
        &self,
        _reactor: &Reactor,
        previous: Option<T>,
        event: &FabricationEvent<T>,
    ) -> Result<Option<T>, TaskError> {
        let mut instance = previous.unwrap_or_default();
        for (name, producer) in &self.attributes {
            let value = producer(&instance, event);
            instance.set_attribute(name, value);
        }
        Ok(Some(instance))
    }
}

/// Singleton distributor routing fabrication events to the registered
/// factories, in registration order. Discoverable as the injectable
/// `"factory_distributor"`.
pub struct FactoryDistributor {
    inner: Distributor,
}

impl FactoryDistributor {
    pub fn new() -> Self {
        Self {
            inner: Distributor::keyed(FABRICATION_ROUTING_KEY),
        }
    }

    /// Register a factory component.
    pub fn add_factory(&self, factory: Arc<dyn Component>) {
        self.inner.add_component(factory);
    }

    pub fn factory_count(&self) -> usize {
        self.inner.component_count()
    }
}

impl Default for FactoryDistributor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for FactoryDistributor {
    fn component_id(&self) -> ComponentId {
        self.inner.component_id()
    }

    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
        self.inner.on_event(reactor, event).await;
    }
}

impl Injectable for FactoryDistributor {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn injectable_name(&self) -> Option<&str> {
        Some("factory_distributor")
    }
}
