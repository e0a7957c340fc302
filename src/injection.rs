//! Dependency injection over the parallel reply protocol

use crate::component::{Component, ComponentId};
use crate::error::ReactorError;
use crate::event::{Event, EventId, EventMeta, ReturningEvent};
use crate::parallel::ParallelReplies;
use crate::reactor::Reactor;
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, trace};

/// An object registered for discovery by concrete type or by name.
pub trait Injectable: Send + Sync + 'static {
    /// Cast to `Any` for type-based matching and downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The name this injectable is discoverable under, if any.
    fn injectable_name(&self) -> Option<&str> {
        None
    }
}

/// What an injection lookup matches on.
#[derive(Debug, Clone)]
pub enum InjectionQuery {
    /// Match injectables of exactly this concrete type.
    ByType {
        type_id: TypeId,
        type_name: &'static str,
    },
    /// Match injectables exposing this name.
    ByName(String),
}

impl InjectionQuery {
    pub fn by_type<T: Injectable>() -> Self {
        Self::ByType {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::ByName(name.into())
    }

    /// Whether `injectable` satisfies this query.
    pub fn matches(&self, injectable: &Arc<dyn Injectable>) -> bool {
        match self {
            Self::ByType { type_id, .. } => injectable.as_any().type_id() == *type_id,
            Self::ByName(name) => injectable.injectable_name() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for InjectionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByType { type_name, .. } => write!(f, "type {type_name}"),
            Self::ByName(name) => write!(f, "name {name:?}"),
        }
    }
}

/// "Give me all registered objects matching this query."
///
/// Every injection dispatcher on the reactor replies, via the parallel
/// protocol, with the subset of its registry that matches; the emitter
/// aggregates across dispatchers and flattens the result lists.
pub struct InjectionEvent {
    meta: EventMeta,
    query: InjectionQuery,
    replies: ParallelReplies<Vec<Arc<dyn Injectable>>>,
}

impl InjectionEvent {
    pub fn new(source: Option<ComponentId>, query: InjectionQuery) -> Self {
        let meta = EventMeta::new(source);
        let replies = ParallelReplies::new(meta.completion().clone());
        Self {
            meta,
            query,
            replies,
        }
    }

    pub fn query(&self) -> &InjectionQuery {
        &self.query
    }

    pub fn replies(&self) -> &ParallelReplies<Vec<Arc<dyn Injectable>>> {
        &self.replies
    }

    /// Wait for every dispatcher's reply and flatten the match lists.
    pub async fn await_injections(&self) -> Result<Vec<Arc<dyn Injectable>>, ReactorError> {
        self.replies.wait_for_reply().await;
        let mut matches = Vec::new();
        for (_, subset) in self.replies.get_reply()? {
            matches.extend(subset);
        }
        Ok(matches)
    }
}

impl Event for InjectionEvent {
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
}

#[async_trait]
impl ReturningEvent for InjectionEvent {
    async fn wait_for_reply(&self) {
        self.replies.wait_for_reply().await;
    }

    fn is_replied(&self) -> Result<bool, ReactorError> {
        self.replies.is_replied()
    }
}

/// Singleton component holding the injectable registry.
///
/// Registration is explicit — nothing becomes injectable without
/// [`add_injectable`](InjectionDispatcher::add_injectable). Each reactor
/// owns one dispatcher, pre-registered both as a component and as an
/// injectable under the name `"injection_dispatcher"`.
pub struct InjectionDispatcher {
    id: ComponentId,
    injectables: RwLock<Vec<Arc<dyn Injectable>>>,
}

impl InjectionDispatcher {
    pub fn new() -> Self {
        Self {
            id: ComponentId::new(),
            injectables: RwLock::new(Vec::new()),
        }
    }

    /// Register an object for discovery. Registering the same `Arc` twice
    /// is a no-op (set semantics over object identity).
    pub fn add_injectable(&self, injectable: Arc<dyn Injectable>) {
        let mut injectables = self.injectables.write().unwrap();
        if injectables.iter().any(|existing| Arc::ptr_eq(existing, &injectable)) {
            return;
        }
        debug!(
            name = injectable.injectable_name().unwrap_or("<unnamed>"),
            "Injectable registered"
        );
        injectables.push(injectable);
    }

    /// Snapshot of the registry.
    pub fn injectables(&self) -> Vec<Arc<dyn Injectable>> {
        self.injectables.read().unwrap().clone()
    }

    pub fn injectable_count(&self) -> usize {
        self.injectables.read().unwrap().len()
    }
}

impl Default for InjectionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Component for InjectionDispatcher {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
        let Ok(injection) = event.clone().as_any_arc().downcast::<InjectionEvent>() else {
            return;
        };

        let registry = self.injectables();
        let query = injection.query().clone();
        let handle = reactor.run_async(async move {
            let matches: Vec<Arc<dyn Injectable>> = registry
                .into_iter()
                .filter(|injectable| query.matches(injectable))
                .collect();
            trace!(matches = matches.len(), query = %query, "Injection query resolved");
            Ok(matches)
        });

        if let Err(e) = injection.replies().reply(self.id, handle) {
            error!(error = %e, "Injection dispatcher failed to record its reply");
        }
    }
}

impl Injectable for InjectionDispatcher {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn injectable_name(&self) -> Option<&str> {
        Some("injection_dispatcher")
    }
}
