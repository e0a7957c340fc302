//! The reactor: a synchronous broadcast dispatcher

use crate::component::Component;
use crate::error::{ReactorError, TaskError};
use crate::event::{Event, ReturningEvent};
use crate::fabrication::{FabricationEvent, FactoryDistributor};
use crate::injection::{Injectable, InjectionDispatcher, InjectionEvent, InjectionQuery};
use crate::task::TaskHandle;
use crate::transformation::{TransformEvent, TransformationDistributor};
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// Per-emit selection of the pre-broadcast transformation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformationMode {
    /// Broadcast the event exactly as emitted.
    None,
    /// Route the transform request through the reactor's transformation
    /// distributor singleton only.
    Distributor,
    /// Broadcast the transform request to every registered component, in
    /// order, before broadcasting the result.
    All,
}

/// Synchronous broadcast dispatcher owning an ordered component list.
///
/// `emit` visits every registered component once, in registration order, on
/// the calling task; replies are asynchronous tasks recorded during the
/// pass, and `emit` returns as soon as the loop — not the replies —
/// completes. Cloning yields another handle to the same reactor; distinct
/// reactors share nothing.
#[derive(Clone)]
pub struct Reactor {
    components: Arc<RwLock<Vec<Arc<dyn Component>>>>,
    injection_dispatcher: Arc<InjectionDispatcher>,
    factory_distributor: Arc<FactoryDistributor>,
    transformation_distributor: Arc<TransformationDistributor>,
}

impl Reactor {
    /// Create a reactor with its well-known singletons (injection
    /// dispatcher, factory distributor, transformation distributor)
    /// registered as the first three components and as injectables.
    pub fn new() -> Self {
        let injection_dispatcher = Arc::new(InjectionDispatcher::new());
        let factory_distributor = Arc::new(FactoryDistributor::new());
        let transformation_distributor = Arc::new(TransformationDistributor::new());

        injection_dispatcher.add_injectable(injection_dispatcher.clone());
        injection_dispatcher.add_injectable(factory_distributor.clone());
        injection_dispatcher.add_injectable(transformation_distributor.clone());

        let components: Vec<Arc<dyn Component>> = vec![
            injection_dispatcher.clone(),
            factory_distributor.clone(),
            transformation_distributor.clone(),
        ];

        debug!("Creating new reactor");
        Self {
            components: Arc::new(RwLock::new(components)),
            injection_dispatcher,
            factory_distributor,
            transformation_distributor,
        }
    }

    /// Append a component to the ordered list.
    pub fn add_component(&self, component: Arc<dyn Component>) {
        debug!(component = %component.component_id(), "Component registered");
        self.components.write().unwrap().push(component);
    }

    /// Snapshot of the component list, in registration order.
    pub fn components(&self) -> Vec<Arc<dyn Component>> {
        self.components.read().unwrap().clone()
    }

    pub fn component_count(&self) -> usize {
        self.components.read().unwrap().len()
    }

    /// The reactor's injection dispatcher singleton.
    pub fn injection_dispatcher(&self) -> &Arc<InjectionDispatcher> {
        &self.injection_dispatcher
    }

    /// The reactor's fabrication routing singleton.
    pub fn factory_distributor(&self) -> &Arc<FactoryDistributor> {
        &self.factory_distributor
    }

    /// The reactor's transformation routing singleton.
    pub fn transformation_distributor(&self) -> &Arc<TransformationDistributor> {
        &self.transformation_distributor
    }

    /// Submit a unit of work to the shared scheduler.
    pub fn run_async<R, F>(&self, work: F) -> TaskHandle<R>
    where
        R: Clone + Send + Sync + 'static,
        F: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        TaskHandle::spawn(work)
    }

    /// Broadcast an event to every registered component, in registration
    /// order, then set its completion signal.
    ///
    /// Depending on `transformation`, the event is first rewritten by the
    /// transformation stage and the *transformed* event is broadcast
    /// instead. `emit` awaits each component's `on_event` but never a reply
    /// task.
    pub async fn emit(
        &self,
        event: Arc<dyn Event>,
        transformation: TransformationMode,
    ) -> Result<(), ReactorError> {
        let event = match transformation {
            TransformationMode::None => event,
            TransformationMode::Distributor => {
                let transform = Arc::new(TransformEvent::new(None, event));
                let as_event: Arc<dyn Event> = transform.clone();
                self.transformation_distributor.on_event(self, &as_event).await;
                transform.on_emit_completed();
                transform.wait_for_reply().await;
                transform.transformed().await?
            }
            TransformationMode::All => {
                let transform = Arc::new(TransformEvent::new(None, event));
                let as_event: Arc<dyn Event> = transform.clone();
                for component in self.components() {
                    component.on_event(self, &as_event).await;
                }
                transform.on_emit_completed();
                transform.wait_for_reply().await;
                transform.transformed().await?
            }
        };

        let components = self.components();
        trace!(
            event = %event.event_id(),
            components = components.len(),
            "Broadcasting event"
        );
        for component in &components {
            component.on_event(self, &event).await;
        }
        event.on_emit_completed();
        debug!(event = %event.event_id(), "Broadcast complete");
        Ok(())
    }

    /// Look up one injectable, blocking until the query resolves and
    /// choosing the first match.
    pub async fn get_injectable(
        &self,
        query: InjectionQuery,
    ) -> Result<Arc<dyn Injectable>, ReactorError> {
        self.get_injectable_with(query, |matches| matches.into_iter().next())
            .await
    }

    /// Look up one injectable with a custom chooser over the aggregated
    /// matches. A chooser returning `None` fails with
    /// [`ReactorError::InjectableNotFound`].
    pub async fn get_injectable_with<C>(
        &self,
        query: InjectionQuery,
        chooser: C,
    ) -> Result<Arc<dyn Injectable>, ReactorError>
    where
        C: FnOnce(Vec<Arc<dyn Injectable>>) -> Option<Arc<dyn Injectable>>,
    {
        let event = Arc::new(InjectionEvent::new(None, query.clone()));
        self.emit(event.clone(), TransformationMode::None).await?;
        let matches = event.await_injections().await?;
        chooser(matches).ok_or_else(|| ReactorError::InjectableNotFound(query.to_string()))
    }

    /// Look up one injectable without waiting: the query runs as a task and
    /// the pending handle is returned. Consumers that want a lazy view over
    /// the eventual value wrap this handle.
    pub fn get_injectable_handle(&self, query: InjectionQuery) -> TaskHandle<Arc<dyn Injectable>> {
        self.get_injectable_handle_with(query, |matches| matches.into_iter().next())
    }

    /// As [`Reactor::get_injectable_handle`], with a custom chooser.
    pub fn get_injectable_handle_with<C>(
        &self,
        query: InjectionQuery,
        chooser: C,
    ) -> TaskHandle<Arc<dyn Injectable>>
    where
        C: FnOnce(Vec<Arc<dyn Injectable>>) -> Option<Arc<dyn Injectable>> + Send + 'static,
    {
        let reactor = self.clone();
        self.run_async(async move {
            reactor
                .get_injectable_with(query, chooser)
                .await
                .map_err(|e| TaskError::failed(e.to_string()))
        })
    }

    /// Fabricate an instance of `T` through the registered factories and
    /// wait for the fully assembled result. `None` if no factory produced
    /// an instance.
    pub async fn fabricate<T>(&self) -> Result<Option<T>, ReactorError>
    where
        T: Clone + Send + Sync + 'static,
    {
        let event = Arc::new(FabricationEvent::<T>::new(None));
        self.emit(event.clone(), TransformationMode::None).await?;
        event.wait_for_reply().await;
        Ok(event.instance().await?)
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder wiring components and injectables onto a fresh reactor.
pub struct ReactorBuilder {
    components: Vec<Arc<dyn Component>>,
    injectables: Vec<Arc<dyn Injectable>>,
}

impl ReactorBuilder {
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            injectables: Vec::new(),
        }
    }

    /// Register a component, after the reactor's singletons.
    pub fn component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    /// Register an injectable on the reactor's injection dispatcher.
    pub fn injectable(mut self, injectable: Arc<dyn Injectable>) -> Self {
        self.injectables.push(injectable);
        self
    }

    /// Build the reactor.
    pub fn build(self) -> Reactor {
        let reactor = Reactor::new();
        for component in self.components {
            reactor.add_component(component);
        }
        for injectable in self.injectables {
            reactor.injection_dispatcher().add_injectable(injectable);
        }
        reactor
    }
}

impl Default for ReactorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
