//! Reactive in-process event bus for Rust
//!
//! `reflex` is a synchronous broadcast dispatcher whose subscribers
//! ("components") respond to events asynchronously, and whose emitter can
//! collect, order, and synchronize those asynchronous responses.
//!
//! ## Features
//!
//! - **Reactor** - Ordered, synchronous broadcast to registered components
//! - **Reply aggregation** - Parallel (independent) and sequential
//!   (dependency-chained) reply protocols over a shared task model
//! - **Dependency injection** - Discover registered objects by type or name
//!   through the bus itself
//! - **Fabrication** - Staged object construction across a chain of factory
//!   components
//! - **Transformation** - Let components rewrite an event before it is
//!   broadcast
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reflex::*;
//! use async_trait::async_trait;
//! use std::any::Any;
//! use std::sync::Arc;
//!
//! // An event that any number of components answer independently.
//! struct IngredientsEvent {
//!     meta: EventMeta,
//!     replies: ParallelReplies<String>,
//! }
//!
//! impl IngredientsEvent {
//!     fn new() -> Self {
//!         let meta = EventMeta::new(None);
//!         let replies = ParallelReplies::new(meta.completion().clone());
//!         Self { meta, replies }
//!     }
//! }
//!
//! impl Event for IngredientsEvent {
//!     fn event_id(&self) -> EventId { self.meta.id() }
//!     fn source(&self) -> Option<ComponentId> { self.meta.source() }
//!     fn as_any(&self) -> &dyn Any { self }
//!     fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
//!     fn on_emit_completed(&self) { self.meta.complete(); }
//! }
//!
//! // A component that replies with asynchronous work.
//! struct Pantry {
//!     id: ComponentId,
//!     ingredient: String,
//! }
//!
//! #[async_trait]
//! impl Component for Pantry {
//!     fn component_id(&self) -> ComponentId { self.id }
//!
//!     async fn on_event(&self, reactor: &Reactor, event: &Arc<dyn Event>) {
//!         if let Some(event) = event.as_any().downcast_ref::<IngredientsEvent>() {
//!             let ingredient = self.ingredient.clone();
//!             let task = reactor.run_async(async move { Ok(ingredient) });
//!             event.replies.reply(self.id, task).ok();
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ReactorError> {
//!     let reactor = Reactor::new();
//!     reactor.add_component(Arc::new(Pantry {
//!         id: ComponentId::new(),
//!         ingredient: "flour".into(),
//!     }));
//!
//!     let event = Arc::new(IngredientsEvent::new());
//!     reactor.emit(event.clone(), TransformationMode::None).await?;
//!
//!     event.replies.wait_for_reply().await;
//!     let replies = event.replies.get_reply()?;
//!     println!("{} replies", replies.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//!
//! The broadcast loop runs sequentially on the emitting task and never
//! waits on a reply; reply callbacks run as independent tasks on the shared
//! tokio scheduler. Suspension happens only at explicit wait points
//! (`wait_for_reply`, `previous_reply`, `TaskHandle::result`). A component
//! must not block on another component's reply from within the same
//! broadcast pass.

pub mod component;
pub mod error;
pub mod event;
pub mod fabrication;
pub mod injection;
pub mod parallel;
pub mod reactor;
pub mod sequential;
pub mod signal;
pub mod task;
pub mod transformation;

pub use component::{Component, ComponentId, Distributor, DistributorPredicate};
pub use error::{ReactorError, TaskError};
pub use event::{Event, EventId, EventMeta, ReturningEvent};
pub use fabrication::{
    AttributeAppender, AttributeProducer, AttributeTarget, AttributeValue, FABRICATION_ROUTING_KEY,
    FabricationEvent, Fabricator, FactoryComponent, FactoryDistributor,
};
pub use injection::{Injectable, InjectionDispatcher, InjectionEvent, InjectionQuery};
pub use parallel::ParallelReplies;
pub use reactor::{Reactor, ReactorBuilder, TransformationMode};
pub use sequential::SequentialChain;
pub use signal::CompletionSignal;
pub use task::{TaskHandle, TaskOutcome};
pub use transformation::{
    TRANSFORMATION_ROUTING_KEY, TransformEvent, TransformationDistributor, Transformer,
    TransformerComponent,
};
